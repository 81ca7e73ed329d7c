//! Frame-sequence playback for animated media.
//!
//! Video sources are animated GIF/APNG images or container video (see
//! [`crate::container`]). The whole clip is decoded up front on the
//! acquisition worker; playback then only picks the frame that should be on
//! screen for a given wall-clock instant.

use std::io::Cursor;
use std::time::{Duration, Instant};

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::{AnimationDecoder, Frame, ImageFormat, RgbaImage};

use crate::container::{self, ContainerKind};
use crate::media::MediaError;

/// Frames with a shorter delay than this are shown for [`DEFAULT_FRAME_DELAY`] instead.
const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: RgbaImage,
    pub delay: Duration,
}

/// Decoded frames of an animated source.
#[derive(Debug, Clone)]
pub struct VideoClip {
    frames: Vec<VideoFrame>,
}

impl VideoClip {
    pub fn from_frames(frames: Vec<VideoFrame>) -> Self {
        Self { frames }
    }

    /// Decodes an animated GIF, APNG or container video payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, MediaError> {
        Self::decode_while(bytes, &|| true)
    }

    /// Like [`decode`](Self::decode), but container decoding stops once `live` returns false.
    pub fn decode_while(bytes: &[u8], live: &dyn Fn() -> bool) -> Result<Self, MediaError> {
        if let Some(kind) = ContainerKind::sniff(bytes) {
            return Ok(Self::from_frames(container::decode(kind, bytes, live)?));
        }
        let format = image::guess_format(bytes).map_err(|_| {
            MediaError::Unsupported(
                "video is neither an animated image nor a known container (mp4, webm, mkv, ogg, avi)"
                    .into(),
            )
        })?;
        let frames = match format {
            ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))?
                .into_frames()
                .collect_frames()?,
            ImageFormat::Png => {
                let decoder = PngDecoder::new(Cursor::new(bytes))?;
                if !decoder.is_apng()? {
                    return Err(MediaError::Unsupported(
                        "png without animation chunks is not a video".into(),
                    ));
                }
                decoder.apng()?.into_frames().collect_frames()?
            }
            other => {
                return Err(MediaError::Unsupported(format!(
                    "{other:?} is not an animated container"
                )))
            }
        };

        if frames.is_empty() {
            return Err(MediaError::NoFrames);
        }
        Ok(Self::from_frames(frames.into_iter().map(convert_frame).collect()))
    }

    pub fn frames(&self) -> &[VideoFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.frames.iter().map(|frame| frame.delay).sum()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|frame| frame.image.dimensions())
    }
}

fn convert_frame(frame: Frame) -> VideoFrame {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let millis = if denom == 0 {
        0.0
    } else {
        numer as f64 / denom as f64
    };
    let mut delay = Duration::from_secs_f64(millis / 1000.0);
    if delay < MIN_FRAME_DELAY {
        delay = DEFAULT_FRAME_DELAY;
    }
    VideoFrame {
        image: frame.into_buffer(),
        delay,
    }
}

/// Flags applied when playback starts.
///
/// Clips carry no audio track, so `muted` only documents intent for hosts
/// that mirror these flags elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackOptions {
    pub muted: bool,
    pub looping: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            muted: true,
            looping: true,
        }
    }
}

/// A playing clip.
#[derive(Debug)]
pub struct VideoPlayback {
    clip: VideoClip,
    options: PlaybackOptions,
    started: Instant,
    paused_at: Option<Duration>,
    shown: Option<usize>,
}

impl VideoPlayback {
    /// Starts playback at `now`. Fails when the clip cannot be played at all.
    pub fn play(clip: VideoClip, options: PlaybackOptions, now: Instant) -> Result<Self, MediaError> {
        if clip.is_empty() {
            return Err(MediaError::NoFrames);
        }
        if clip.duration().is_zero() {
            return Err(MediaError::Playback("clip has zero duration".into()));
        }
        tracing::debug!(
            frames = clip.len(),
            duration_ms = clip.duration().as_millis() as u64,
            looping = options.looping,
            muted = options.muted,
            "video playback started"
        );
        Ok(Self {
            clip,
            options,
            started: now,
            paused_at: None,
            shown: None,
        })
    }

    pub fn clip(&self) -> &VideoClip {
        &self.clip
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Frame on screen at `elapsed` since playback started.
    pub fn frame_index_at(&self, elapsed: Duration) -> usize {
        let total = self.clip.duration();
        let last = self.clip.len().saturating_sub(1);
        if total.is_zero() {
            return 0;
        }
        let position = if self.options.looping {
            Duration::from_nanos((elapsed.as_nanos() % total.as_nanos()) as u64)
        } else if elapsed >= total {
            return last;
        } else {
            elapsed
        };

        let mut cursor = Duration::ZERO;
        for (index, frame) in self.clip.frames.iter().enumerate() {
            cursor += frame.delay;
            if position < cursor {
                return index;
            }
        }
        last
    }

    /// Returns the frame to upload when the displayed frame changed since the last call.
    pub fn next_upload(&mut self, now: Instant) -> Option<&RgbaImage> {
        if self.paused_at.is_some() {
            return None;
        }
        let index = self.frame_index_at(now.saturating_duration_since(self.started));
        if self.shown == Some(index) {
            return None;
        }
        self.shown = Some(index);
        self.clip.frames.get(index).map(|frame| &frame.image)
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now.saturating_duration_since(self.started));
        }
    }

    /// Drops decoded frames so the memory is returned immediately.
    pub fn unload(&mut self) {
        self.paused_at.get_or_insert(Duration::ZERO);
        self.clip.frames = Vec::new();
        self.shown = None;
    }
}
