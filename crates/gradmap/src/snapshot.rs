//! Still-image export of the rendered frame.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};

use crate::error::RenderError;
use crate::gpu::GradientPipeline;
use crate::host::HeadlessHost;
use crate::lifecycle::{LifecycleController, TickOutcome};
use crate::style::StyleEnvironment;
use crate::types::{RendererConfig, ViewportSize};

/// Renders the pipeline's current state once and encodes it as PNG.
pub struct SnapshotExporter<'a> {
    pipeline: &'a mut GradientPipeline,
}

impl<'a> SnapshotExporter<'a> {
    pub fn new(pipeline: &'a mut GradientPipeline) -> Self {
        Self { pipeline }
    }

    /// Fails with [`RenderError::NotReady`] when no graphics context exists.
    pub fn capture(self) -> Result<Vec<u8>, RenderError> {
        let frame = self.pipeline.capture_frame()?;
        encode_png(DynamicImage::ImageRgba8(frame))
    }
}

pub fn encode_png(image: DynamicImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}

/// Renders `config` offscreen at `size` and returns the first frame drawn
/// after the media settled, or whatever is on screen once `timeout` expires.
pub fn render_still(
    mut config: RendererConfig,
    style: Option<Arc<dyn StyleEnvironment>>,
    size: ViewportSize,
    timeout: Duration,
) -> Result<Vec<u8>, RenderError> {
    config.surface_size = size;
    let mut controller = LifecycleController::new(HeadlessHost::new(size), config, style);
    let started = Instant::now();
    let give_up = started + timeout;
    controller.mount(started);

    loop {
        let now = Instant::now();
        match controller.tick(now)? {
            TickOutcome::HostUnavailable => return Err(RenderError::HostUnavailable),
            TickOutcome::Disposed | TickOutcome::Idle => return Err(RenderError::NotReady),
            TickOutcome::Rendered if controller.media_status().is_settled() => break,
            TickOutcome::Rendered | TickOutcome::Waiting => {}
        }
        if now >= give_up {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                status = ?controller.media_status(),
                "media did not settle before the snapshot timeout"
            );
            break;
        }
        let wake = controller
            .next_deadline()
            .unwrap_or(now)
            .min(give_up)
            .max(now + Duration::from_millis(1));
        thread::sleep(wake.saturating_duration_since(Instant::now()));
    }

    let bytes = controller.capture_snapshot();
    controller.dispose();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_without_context_is_not_ready() {
        let mut pipeline = GradientPipeline::new();
        let result = SnapshotExporter::new(&mut pipeline).capture();
        assert!(matches!(result, Err(RenderError::NotReady)));
    }

    #[test]
    fn encodes_png_signature() {
        let image = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([10, 20, 30, 255]),
        ));
        let bytes = encode_png(image).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
