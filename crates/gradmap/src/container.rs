//! Container video (mp4, webm, mkv, ogg, avi) decoded through an ffmpeg process.
//!
//! The payload is written to a temporary file and ffmpeg streams raw RGB
//! frames back over stdout. Decoding stops early once the caller reports the
//! acquisition is no longer wanted.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use image::{DynamicImage, RgbImage};

use crate::media::MediaError;
use crate::video::VideoFrame;

/// Upper bound on decoded frames; longer clips loop over their first part.
pub const MAX_CONTAINER_FRAMES: u32 = 900;

const FALLBACK_FRAME_DELAY: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// ISO base media: mp4, m4v, mov.
    Mp4,
    /// Matroska, including webm.
    Matroska,
    Ogg,
    Avi,
}

impl ContainerKind {
    /// Recognises a container from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
            return Some(ContainerKind::Mp4);
        }
        if bytes.starts_with(&[0x1a, 0x45, 0xdf, 0xa3]) {
            return Some(ContainerKind::Matroska);
        }
        if bytes.starts_with(b"OggS") {
            return Some(ContainerKind::Ogg);
        }
        if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"AVI " {
            return Some(ContainerKind::Avi);
        }
        None
    }

    fn extension(self) -> &'static str {
        match self {
            ContainerKind::Mp4 => ".mp4",
            ContainerKind::Matroska => ".mkv",
            ContainerKind::Ogg => ".ogg",
            ContainerKind::Avi => ".avi",
        }
    }
}

/// Decodes with the ffmpeg binary ffmpeg-sidecar resolves (its download cache, then `PATH`).
pub fn decode(
    kind: ContainerKind,
    bytes: &[u8],
    live: &dyn Fn() -> bool,
) -> Result<Vec<VideoFrame>, MediaError> {
    decode_with(&ffmpeg_sidecar::paths::ffmpeg_path(), kind, bytes, live)
}

pub fn decode_with(
    ffmpeg: &Path,
    kind: ContainerKind,
    bytes: &[u8],
    live: &dyn Fn() -> bool,
) -> Result<Vec<VideoFrame>, MediaError> {
    let staging_err = |source| MediaError::Io {
        location: "video staging file".into(),
        source,
    };
    let mut staged = tempfile::Builder::new()
        .prefix("gradmap-")
        .suffix(kind.extension())
        .tempfile()
        .map_err(staging_err)?;
    staged.write_all(bytes).map_err(staging_err)?;
    staged.flush().map_err(staging_err)?;

    let input = staged.path().to_string_lossy().into_owned();
    let frame_limit = MAX_CONTAINER_FRAMES.to_string();
    let mut child = FfmpegCommand::new_with_path(ffmpeg)
        .hide_banner()
        .input(&input)
        .args(["-an", "-frames:v", frame_limit.as_str()])
        .rawvideo()
        .spawn()
        .map_err(|err| {
            MediaError::VideoDecoder(format!(
                "could not start {} to decode {kind:?} video ({err}); install ffmpeg to play container video",
                ffmpeg.display()
            ))
        })?;
    let events = child
        .iter()
        .map_err(|err| MediaError::VideoDecoder(format!("ffmpeg output unreadable: {err:#}")))?;

    let mut images = Vec::new();
    let mut timestamps = Vec::new();
    let mut failure = None;
    for event in events {
        match event {
            FfmpegEvent::OutputFrame(frame) => {
                if !live() {
                    let _ = child.kill();
                    return Err(MediaError::Playback("acquisition cancelled".into()));
                }
                let Some(rgb) = RgbImage::from_raw(frame.width, frame.height, frame.data) else {
                    failure = Some(format!("frame {} has an unexpected size", frame.frame_num));
                    break;
                };
                images.push(DynamicImage::ImageRgb8(rgb).to_rgba8());
                timestamps.push(frame.timestamp);
            }
            FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                tracing::debug!(message = %message, "ffmpeg error output");
                failure.get_or_insert(message);
            }
            FfmpegEvent::Error(message) => {
                failure.get_or_insert(message);
            }
            _ => {}
        }
    }
    let _ = child.wait();

    if images.is_empty() {
        return Err(match failure {
            Some(message) => MediaError::VideoDecoder(message),
            None => MediaError::NoFrames,
        });
    }
    tracing::debug!(frames = images.len(), ?kind, "container video decoded");
    let delays = frame_delays(&timestamps);
    Ok(images
        .into_iter()
        .zip(delays)
        .map(|(image, delay)| VideoFrame { image, delay })
        .collect())
}

/// Display time of each frame from its presentation timestamp in seconds.
/// The last frame repeats the previous interval.
fn frame_delays(timestamps: &[f32]) -> Vec<Duration> {
    let mut delays: Vec<Duration> = timestamps
        .windows(2)
        .map(|pair| {
            let seconds = pair[1] - pair[0];
            if seconds.is_finite() && seconds > 0.0 {
                Duration::from_secs_f32(seconds)
            } else {
                FALLBACK_FRAME_DELAY
            }
        })
        .collect();
    if !timestamps.is_empty() {
        delays.push(delays.last().copied().unwrap_or(FALLBACK_FRAME_DELAY));
    }
    delays
}
