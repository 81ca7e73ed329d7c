//! GPU side of the renderer.
//!
//! - `context` owns the wgpu instance/device and either a window surface or
//!   an offscreen texture, and knows how to resize either.
//! - `geometry` holds the shared quad buffers and the fixed orthographic
//!   camera.
//! - `texture` wraps decoded stills and streamed video frames.
//! - `material` pairs a render pipeline with its bind group and, for the
//!   gradient mode, the std140 ramp block.
//! - `pipeline` creates bind group layouts and render pipelines.
//! - `readback` copies a rendered texture back into host memory.
//! - `state` glues everything together behind the `GradientPipeline` API.

mod context;
mod geometry;
mod material;
mod pipeline;
mod readback;
mod state;
mod texture;

pub use geometry::OrthographicCamera;
pub use material::MaterialMode;
pub use state::{GradientPipeline, PipelineStats};
pub use texture::TextureKind;
