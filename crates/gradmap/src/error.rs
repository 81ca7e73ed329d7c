use thiserror::Error;

use crate::media::MediaError;

/// Outcomes the renderer reports to its host instead of crashing.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Image decode or video playback failed; the pipeline stays without a texture.
    #[error("media failed to load: {0}")]
    MediaLoadFailed(#[from] MediaError),
    /// No graphics surface has been initialised yet.
    #[error("renderer is not ready")]
    NotReady,
    /// The host had no measurable content box when initialisation ran.
    #[error("render host is unavailable")]
    HostUnavailable,
    #[error("failed to read back the rendered frame: {0}")]
    Readback(String),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] image::ImageError),
    /// Adapter, device or surface creation failed.
    #[error("graphics device error: {0:#}")]
    Device(#[from] anyhow::Error),
}
