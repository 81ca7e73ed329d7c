//! Luminance-driven gradient-map renderer.
//!
//! A single pixel source (a still image, an animated clip or a raw encoded
//! upload) is drawn onto a full-viewport quad, and every texel's brightness
//! is remapped through an N-stop colour ramp that follows the active theme.
//! The overall flow is:
//!
//! ```text
//!   host (window / headless) ──▶ LifecycleController::tick
//!                                   │ init(host)
//!                                   ▼
//!   MediaSource::acquire ──poll──▶ GradientPipeline ◀── set_material(mode, ramp)
//!                                   ▲                          ▲
//!                                   │ update_ramp              │ ColorResolver
//!                           UniformSynchronizer ◀── theme / tokens / style edits
//!                                   │
//!                                   ▼
//!                           SnapshotExporter::capture ──▶ PNG bytes
//! ```
//!
//! [`LifecycleController`] owns one pipeline instance end to end and never
//! blocks; [`WindowRuntime`] runs it inside a winit event loop and
//! [`render_still`] drives it offscreen for one-off exports.

pub mod color;
mod compile;
pub mod container;
pub mod error;
pub mod gpu;
pub mod gradient;
pub mod host;
pub mod lifecycle;
pub mod media;
pub mod snapshot;
pub mod style;
pub mod sync;
pub mod theme;
pub mod types;
pub mod video;
pub mod window;

pub use color::{
    parse_color, ColorRamp, ColorResolver, ColorToken, ParseColorError, Rgb, MAX_RAMP,
};
pub use container::ContainerKind;
pub use error::RenderError;
pub use gpu::{GradientPipeline, MaterialMode, PipelineStats, TextureKind};
pub use host::{HeadlessHost, RenderHost, WindowHost};
pub use lifecycle::{LifecycleController, LifecyclePhase, MediaStatus, TickOutcome};
pub use media::{DefaultLoader, MediaDescriptor, MediaError, MediaLoader, MediaSource};
pub use snapshot::{render_still, SnapshotExporter};
pub use style::{StyleEnvironment, StyleSheet, StyleSubscription};
pub use sync::{SyncOutcome, UniformSynchronizer};
pub use theme::{ThemeInputs, ThemeMode};
pub use types::{GpuPowerPreference, RendererConfig, VariableWait, ViewportSize};
pub use video::{PlaybackOptions, VideoClip, VideoPlayback};
pub use window::WindowRuntime;
