//! Asynchronous acquisition of the single pixel source.
//!
//! ```text
//! acquire(descriptor) ──► worker thread ──(fetch + decode)──► channel
//!        │                                                      │
//!        └── AcquisitionTicket { generation, live } ◄── poll() ──┘
//! ```
//!
//! Only the latest acquisition is ever reported. Cancellation is cooperative:
//! a worker that is already decoding keeps going, but checks its liveness
//! flag before and after the expensive steps and drops its result once the
//! flag is cleared.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};
use image::RgbaImage;
use thiserror::Error;

use crate::video::VideoClip;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to read {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode media: {0}")]
    Decode(#[from] image::ImageError),
    #[error("media contains no frames")]
    NoFrames,
    #[error("unsupported media: {0}")]
    Unsupported(String),
    #[error("playback failed: {0}")]
    Playback(String),
    #[error("video decoder failed: {0}")]
    VideoDecoder(String),
    #[error("acquisition worker exited without reporting a result")]
    WorkerLost,
}

/// The one pixel source a renderer displays.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum MediaDescriptor {
    /// Path or http(s) URL of a still image.
    Image(String),
    /// Path or http(s) URL of a clip: animated GIF/APNG, or mp4/webm/mkv/ogg/avi via ffmpeg.
    Video(String),
    /// Encoded image bytes already held in memory, e.g. a user upload.
    RawImage(Arc<[u8]>),
    #[default]
    None,
}

impl MediaDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            MediaDescriptor::Image(_) => "image",
            MediaDescriptor::Video(_) => "video",
            MediaDescriptor::RawImage(_) => "raw",
            MediaDescriptor::None => "none",
        }
    }
}

impl fmt::Debug for MediaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaDescriptor::Image(url) => f.debug_tuple("Image").field(url).finish(),
            MediaDescriptor::Video(url) => f.debug_tuple("Video").field(url).finish(),
            MediaDescriptor::RawImage(bytes) => write!(f, "RawImage({} bytes)", bytes.len()),
            MediaDescriptor::None => f.write_str("None"),
        }
    }
}

/// Fetches encoded bytes for a media location.
pub trait MediaLoader: Send + Sync {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, MediaError>;
}

/// Reads local paths from disk and http(s) URLs over the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoader;

impl MediaLoader for DefaultLoader {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, MediaError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let http_err = |source| MediaError::Http {
                url: location.to_string(),
                source,
            };
            let response = reqwest::blocking::get(location)
                .and_then(|response| response.error_for_status())
                .map_err(http_err)?;
            return response.bytes().map(|bytes| bytes.to_vec()).map_err(http_err);
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        std::fs::read(Path::new(path)).map_err(|source| MediaError::Io {
            location: location.to_string(),
            source,
        })
    }
}

/// Pixels produced by a finished acquisition.
#[derive(Debug)]
pub enum DecodedMedia {
    Still(RgbaImage),
    Video(VideoClip),
}

/// Identity of one acquisition plus the flag used to cancel it.
#[derive(Debug, Clone)]
pub struct AcquisitionTicket {
    generation: u64,
    live: Arc<AtomicBool>,
}

impl AcquisitionTicket {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn revoke(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// Result of polling the media source.
#[derive(Debug)]
pub enum MediaPoll {
    /// Nothing requested, or the last result was already handed out.
    Idle,
    Pending,
    Ready(DecodedMedia),
    Failed(MediaError),
}

type Outcome = Result<DecodedMedia, MediaError>;

struct Pending {
    ticket: AcquisitionTicket,
    rx: Receiver<Outcome>,
}

/// Holds at most one in-flight acquisition.
pub struct MediaSource {
    loader: Arc<dyn MediaLoader>,
    generation: u64,
    pending: Option<Pending>,
}

impl MediaSource {
    pub fn new(loader: Arc<dyn MediaLoader>) -> Self {
        Self {
            loader,
            generation: 0,
            pending: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts acquiring `descriptor`, superseding anything still in flight.
    ///
    /// Returns `None` for [`MediaDescriptor::None`], which leaves the source idle.
    pub fn acquire(&mut self, descriptor: &MediaDescriptor) -> Option<AcquisitionTicket> {
        self.cancel();
        self.generation += 1;

        let (tx, rx) = crossbeam_channel::bounded::<Outcome>(1);
        let ticket = AcquisitionTicket::new(self.generation);

        match descriptor {
            MediaDescriptor::None => {
                tracing::warn!("no media source configured; renderer stays idle");
                return None;
            }
            MediaDescriptor::RawImage(bytes) => {
                tracing::debug!(generation = ticket.generation, bytes = bytes.len(), "decoding raw image");
                let outcome = decode_still(bytes);
                let _ = tx.send(outcome);
            }
            MediaDescriptor::Image(location) | MediaDescriptor::Video(location) => {
                let video = matches!(descriptor, MediaDescriptor::Video(_));
                let loader = Arc::clone(&self.loader);
                let location = location.clone();
                let worker_ticket = ticket.clone();
                tracing::debug!(
                    generation = ticket.generation,
                    location = %location,
                    kind = descriptor.kind(),
                    "spawning media acquisition"
                );
                let spawned = thread::Builder::new()
                    .name("gradmap-media".into())
                    .spawn(move || {
                        let outcome = run_acquisition(&*loader, &location, video, &worker_ticket);
                        if let Some(outcome) = outcome {
                            let _ = tx.send(outcome);
                        }
                    });
                if let Err(source) = spawned {
                    let (fail_tx, fail_rx) = crossbeam_channel::bounded(1);
                    let _ = fail_tx.send(Err(MediaError::Io {
                        location: "media worker".into(),
                        source,
                    }));
                    self.pending = Some(Pending {
                        ticket: ticket.clone(),
                        rx: fail_rx,
                    });
                    return Some(ticket);
                }
            }
        }

        self.pending = Some(Pending {
            ticket: ticket.clone(),
            rx,
        });
        Some(ticket)
    }

    /// Non-blocking check for the outcome of the current acquisition.
    pub fn poll(&mut self) -> MediaPoll {
        let Some(pending) = self.pending.as_ref() else {
            return MediaPoll::Idle;
        };
        let received = match pending.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => return MediaPoll::Pending,
            Err(TryRecvError::Disconnected) => None,
        };

        let Some(pending) = self.pending.take() else {
            return MediaPoll::Idle;
        };
        if !pending.ticket.is_live() || pending.ticket.generation != self.generation {
            tracing::debug!(
                generation = pending.ticket.generation,
                "discarding superseded media result"
            );
            return MediaPoll::Idle;
        }
        match received {
            Some(Ok(media)) => MediaPoll::Ready(media),
            Some(Err(err)) => MediaPoll::Failed(err),
            None => MediaPoll::Failed(MediaError::WorkerLost),
        }
    }

    /// Revokes the in-flight acquisition, if any. Late results are dropped.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.ticket.revoke();
            tracing::debug!(generation = pending.ticket.generation, "media acquisition cancelled");
        }
    }
}

impl Drop for MediaSource {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_acquisition(
    loader: &dyn MediaLoader,
    location: &str,
    video: bool,
    ticket: &AcquisitionTicket,
) -> Option<Outcome> {
    let bytes = match loader.fetch(location) {
        Ok(bytes) => bytes,
        Err(err) => return ticket.is_live().then_some(Err(err)),
    };
    if !ticket.is_live() {
        return None;
    }
    let outcome = if video {
        VideoClip::decode_while(&bytes, &|| ticket.is_live()).map(DecodedMedia::Video)
    } else {
        decode_still(&bytes)
    };
    ticket.is_live().then_some(outcome)
}

fn decode_still(bytes: &[u8]) -> Outcome {
    let image = image::load_from_memory(bytes)?;
    Ok(DecodedMedia::Still(image.to_rgba8()))
}
