//! Mount, resize, update and teardown of one renderer instance.
//!
//! ```text
//!  Unmounted ──mount──► Initializing ──(delay, variable wait, init)──► Ready
//!                           │                                          │ ▲
//!                           │ dispose                     resize/update│ │
//!                           ▼                                          ▼ │
//!                       Unmounted ◄──────── Disposing ◄──── Resizing | Updating
//! ```
//!
//! Nothing here sleeps. Callers ask [`LifecycleController::next_deadline`] when
//! to call [`LifecycleController::tick`] next, which keeps the controller
//! usable from an event loop and from a plain headless driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::color::ColorToken;
use crate::error::RenderError;
use crate::gpu::{GradientPipeline, MaterialMode, TextureKind};
use crate::host::RenderHost;
use crate::media::{DecodedMedia, DefaultLoader, MediaDescriptor, MediaLoader, MediaPoll, MediaSource};
use crate::snapshot::SnapshotExporter;
use crate::style::StyleEnvironment;
use crate::sync::UniformSynchronizer;
use crate::theme::{ThemeInputs, ThemeMode};
use crate::types::{RendererConfig, ViewportSize};
use crate::video::VideoPlayback;

/// Pacing of the continuous frame loop.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Variable probed by the availability wait.
const PROBE_VARIABLE: &str = "--background";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Unmounted,
    Initializing,
    Ready,
    Resizing,
    Updating,
    Disposing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not mounted, or already torn down.
    Idle,
    /// Still inside the init delay or the variable wait.
    Waiting,
    /// The host had no content box; initialisation was skipped.
    HostUnavailable,
    Rendered,
    /// The controller disposed itself after an unrecoverable surface error.
    Disposed,
}

/// What the media pipeline is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStatus {
    None,
    Loading,
    Still,
    Playing,
    Failed(String),
}

impl MediaStatus {
    /// Loading has finished one way or another.
    pub fn is_settled(&self) -> bool {
        !matches!(self, MediaStatus::Loading)
    }
}

#[derive(Debug, Clone, Copy)]
struct VariableWaitState {
    attempts_used: u32,
    next_check: Instant,
    /// Every attempt failed; the final backoff runs out before proceeding.
    exhausted: bool,
}

/// How to bring a `Lost`/`Outdated` surface back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceRecovery {
    Resize(ViewportSize),
    Reconfigure,
}

/// A surface that reports `Outdated` at an unchanged size still needs `configure`.
fn surface_recovery(current: Option<ViewportSize>, content_box: Option<ViewportSize>) -> SurfaceRecovery {
    match content_box {
        Some(size) if !size.is_empty() && Some(size) != current => SurfaceRecovery::Resize(size),
        _ => SurfaceRecovery::Reconfigure,
    }
}

pub struct LifecycleController<H: RenderHost> {
    config: RendererConfig,
    host: H,
    style: Option<Arc<dyn StyleEnvironment>>,
    phase: LifecyclePhase,
    init_deadline: Option<Instant>,
    variable_wait: Option<VariableWaitState>,
    pipeline: GradientPipeline,
    media: MediaSource,
    video: Option<VideoPlayback>,
    media_status: MediaStatus,
    sync: UniformSynchronizer,
    theme_inputs: ThemeInputs,
    material_mode: MaterialMode,
    material_stale: bool,
    resize_requested: bool,
    last_frame: Option<Instant>,
    disposed: bool,
}

impl<H: RenderHost> LifecycleController<H> {
    pub fn new(host: H, config: RendererConfig, style: Option<Arc<dyn StyleEnvironment>>) -> Self {
        Self::with_loader(host, config, style, Arc::new(DefaultLoader))
    }

    pub fn with_loader(
        host: H,
        config: RendererConfig,
        style: Option<Arc<dyn StyleEnvironment>>,
        loader: Arc<dyn MediaLoader>,
    ) -> Self {
        let theme_inputs = ThemeInputs {
            signal: None,
            override_: config.theme_override,
        };
        let theme = theme_inputs.resolve(style.as_deref());
        let sync = UniformSynchronizer::new(
            config.light_colors.clone(),
            config.dark_colors.clone(),
            theme,
        )
        .verbose(config.debug_enabled());
        let material_mode = MaterialMode::from_pass_through(config.pass_through);

        Self {
            config,
            host,
            style,
            phase: LifecyclePhase::Unmounted,
            init_deadline: None,
            variable_wait: None,
            pipeline: GradientPipeline::new(),
            media: MediaSource::new(loader),
            video: None,
            media_status: MediaStatus::None,
            sync,
            theme_inputs,
            material_mode,
            material_stale: true,
            resize_requested: false,
            last_frame: None,
            disposed: false,
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn pipeline(&self) -> &GradientPipeline {
        &self.pipeline
    }

    pub fn media_status(&self) -> &MediaStatus {
        &self.media_status
    }

    pub fn theme(&self) -> ThemeMode {
        self.sync.theme()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Schedules initialisation after the configured settle delay.
    pub fn mount(&mut self, now: Instant) {
        if self.phase != LifecyclePhase::Unmounted {
            tracing::warn!(phase = ?self.phase, "renderer already mounted");
            return;
        }
        self.disposed = false;
        self.phase = LifecyclePhase::Initializing;
        self.init_deadline = Some(now + self.config.init_delay);
        self.variable_wait = None;
        tracing::debug!(delay_ms = self.config.init_delay.as_millis() as u64, "renderer mounted");
    }

    /// When the controller next wants [`tick`](Self::tick) to run.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            LifecyclePhase::Initializing => self
                .variable_wait
                .map(|wait| wait.next_check)
                .or(self.init_deadline),
            LifecyclePhase::Ready | LifecyclePhase::Resizing | LifecyclePhase::Updating => {
                Some(self.last_frame.map_or_else(Instant::now, |last| last + FRAME_INTERVAL))
            }
            LifecyclePhase::Unmounted | LifecyclePhase::Disposing => None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Advances initialisation or renders one frame.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, RenderError> {
        match self.phase {
            LifecyclePhase::Unmounted | LifecyclePhase::Disposing => Ok(if self.disposed {
                TickOutcome::Disposed
            } else {
                TickOutcome::Idle
            }),
            LifecyclePhase::Initializing => {
                if !self.settled(now) {
                    return Ok(TickOutcome::Waiting);
                }
                match self.initialize() {
                    Ok(()) => self.frame(now),
                    Err(RenderError::HostUnavailable) => {
                        tracing::debug!("render host unavailable; skipping initialisation");
                        self.phase = LifecyclePhase::Unmounted;
                        Ok(TickOutcome::HostUnavailable)
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "renderer initialisation failed");
                        self.phase = LifecyclePhase::Unmounted;
                        Err(err)
                    }
                }
            }
            LifecyclePhase::Ready | LifecyclePhase::Resizing | LifecyclePhase::Updating => {
                self.frame(now)
            }
        }
    }

    /// Init delay plus the bounded wait for theme variables.
    fn settled(&mut self, now: Instant) -> bool {
        if self.init_deadline.is_some_and(|deadline| now < deadline) {
            return false;
        }
        let Some(env) = self.style.as_deref() else {
            return true;
        };
        if !self.sync.uses_variables() {
            return true;
        }
        if let Some(wait) = self.variable_wait {
            if now < wait.next_check {
                return false;
            }
            if wait.exhausted {
                tracing::warn!(
                    attempts = wait.attempts_used,
                    "theme variables not available; continuing with fallbacks"
                );
                return true;
            }
        }

        let ready = env
            .variable(PROBE_VARIABLE)
            .is_some_and(|value| !value.trim().is_empty());
        if ready {
            return true;
        }
        let budget = self.config.variable_wait;
        let attempts_used = self.variable_wait.map_or(0, |wait| wait.attempts_used) + 1;
        self.variable_wait = Some(VariableWaitState {
            attempts_used,
            next_check: now + budget.backoff,
            exhausted: attempts_used >= budget.attempts,
        });
        false
    }

    fn initialize(&mut self) -> Result<(), RenderError> {
        self.pipeline.init(&self.host, self.config.gpu_power)?;
        if let Some(env) = self.style.as_deref() {
            self.sync.observe(env);
        }
        self.init_deadline = None;
        self.variable_wait = None;
        self.material_stale = true;
        self.phase = LifecyclePhase::Ready;
        self.start_acquisition();
        Ok(())
    }

    fn start_acquisition(&mut self) {
        self.stop_video();
        self.pipeline.clear_texture();
        let ticket = self.media.acquire(&self.config.media);
        self.media_status = if ticket.is_some() {
            MediaStatus::Loading
        } else {
            MediaStatus::None
        };
    }

    /// Applies every pending change, then draws.
    fn frame(&mut self, now: Instant) -> Result<TickOutcome, RenderError> {
        self.prepare(now);

        let outcome = match self.pipeline.render_frame() {
            Ok(()) => TickOutcome::Rendered,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                match surface_recovery(self.pipeline.size(), self.host.content_box()) {
                    SurfaceRecovery::Resize(size) => {
                        tracing::debug!(width = size.width, height = size.height, "surface outdated; resizing");
                        self.pipeline.resize(size);
                    }
                    SurfaceRecovery::Reconfigure => {
                        tracing::debug!("surface lost or outdated; reconfiguring");
                        self.pipeline.reconfigure();
                    }
                }
                TickOutcome::Rendered
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("surface out of memory; disposing renderer");
                self.dispose();
                return Ok(TickOutcome::Disposed);
            }
            Err(err) => {
                tracing::warn!(error = %err, "surface error; retrying next frame");
                TickOutcome::Rendered
            }
        };
        self.last_frame = Some(now);
        self.phase = LifecyclePhase::Ready;
        Ok(outcome)
    }

    /// Resize, media, theme and uniform work that precedes a draw.
    fn prepare(&mut self, now: Instant) {
        if std::mem::take(&mut self.resize_requested) {
            self.phase = LifecyclePhase::Resizing;
            if let Some(size) = self.host.content_box() {
                self.pipeline.resize(size);
            }
        }

        self.poll_media(now);

        if let Some(video) = self.video.as_mut() {
            if let Some(frame) = video.next_upload(now) {
                if let Err(err) = self.pipeline.upload_frame(frame) {
                    tracing::warn!(error = %err, "failed to upload video frame");
                }
            }
        }

        let env = self.style.as_deref();
        self.sync.set_theme(self.theme_inputs.resolve(env));

        if self.material_stale {
            self.phase = LifecyclePhase::Updating;
            let ramp = self.sync.resolve(env);
            match self.pipeline.set_material(self.material_mode, &ramp) {
                Ok(()) => self.material_stale = false,
                Err(err) => tracing::warn!(error = %err, "failed to build material"),
            }
        }
        self.sync.sync(env, &mut self.pipeline);
    }

    fn poll_media(&mut self, now: Instant) {
        match self.media.poll() {
            MediaPoll::Idle | MediaPoll::Pending => {}
            MediaPoll::Ready(DecodedMedia::Still(image)) => {
                self.phase = LifecyclePhase::Updating;
                match self.pipeline.set_texture(&image, TextureKind::Static) {
                    Ok(()) => self.media_status = MediaStatus::Still,
                    Err(err) => self.media_failed(err),
                }
            }
            MediaPoll::Ready(DecodedMedia::Video(clip)) => {
                self.phase = LifecyclePhase::Updating;
                match VideoPlayback::play(clip, self.config.playback, now) {
                    Ok(mut playback) => {
                        let uploaded = playback
                            .next_upload(now)
                            .map(|frame| self.pipeline.set_texture(frame, TextureKind::Streaming))
                            .unwrap_or(Ok(()));
                        match uploaded {
                            Ok(()) => {
                                self.video = Some(playback);
                                self.media_status = MediaStatus::Playing;
                            }
                            Err(err) => self.media_failed(err),
                        }
                    }
                    Err(err) => self.media_failed(RenderError::MediaLoadFailed(err)),
                }
            }
            MediaPoll::Failed(err) => self.media_failed(RenderError::MediaLoadFailed(err)),
        }
    }

    fn media_failed(&mut self, err: RenderError) {
        tracing::error!(
            error = %err,
            kind = self.config.media.kind(),
            "media failed to load; continuing without a texture"
        );
        self.stop_video();
        self.pipeline.clear_texture();
        self.media_status = MediaStatus::Failed(err.to_string());
    }

    fn stop_video(&mut self) {
        if let Some(mut video) = self.video.take() {
            video.pause(Instant::now());
            video.unload();
        }
    }

    /// The host's box changed; the new size is measured on the next frame.
    pub fn handle_resize(&mut self) {
        self.resize_requested = true;
    }

    /// Replaces the media source, discarding the current texture and any in-flight load.
    pub fn set_media(&mut self, media: MediaDescriptor) {
        self.config.media = media;
        if self.pipeline.is_initialized() {
            self.phase = LifecyclePhase::Updating;
            self.start_acquisition();
        }
    }

    pub fn set_pass_through(&mut self, pass_through: bool) {
        let mode = MaterialMode::from_pass_through(pass_through);
        if mode != self.material_mode {
            self.config.pass_through = pass_through;
            self.material_mode = mode;
            self.material_stale = true;
        }
    }

    pub fn set_colors(&mut self, light: Vec<ColorToken>, dark: Vec<ColorToken>) {
        self.config.light_colors = light.clone();
        self.config.dark_colors = dark.clone();
        self.sync.set_tokens(light, dark);
    }

    /// Platform theme preference, e.g. from the window system.
    pub fn set_theme_signal(&mut self, theme: Option<ThemeMode>) {
        self.theme_inputs.signal = theme;
    }

    pub fn set_theme_override(&mut self, theme: Option<ThemeMode>) {
        self.config.theme_override = theme;
        self.theme_inputs.override_ = theme;
    }

    /// Forces the latest state onto the GPU and encodes the frame as PNG.
    pub fn capture_snapshot(&mut self) -> Result<Vec<u8>, RenderError> {
        if self.pipeline.is_initialized() {
            self.prepare(Instant::now());
            self.phase = LifecyclePhase::Ready;
        }
        SnapshotExporter::new(&mut self.pipeline).capture()
    }

    /// Tears everything down. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed || self.phase == LifecyclePhase::Disposing {
            return;
        }
        let was_mounted = self.phase != LifecyclePhase::Unmounted;
        self.phase = LifecyclePhase::Disposing;
        self.init_deadline = None;
        self.variable_wait = None;
        self.last_frame = None;

        self.media.cancel();
        self.stop_video();
        self.pipeline.dispose();
        if let Err(err) = self.host.detach() {
            tracing::debug!(error = %err, "ignoring host detach failure during teardown");
        }

        self.phase = LifecyclePhase::Unmounted;
        self.disposed = true;
        tracing::debug!(was_mounted, "renderer disposed");
    }
}

impl<H: RenderHost> Drop for LifecycleController<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use crate::media::MediaError;
    use crate::style::{StyleSheet, DARK_CLASS};
    use crate::types::{GpuPowerPreference, VariableWait};
    use crossbeam_channel::{Receiver, Sender};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::thread;

    fn config() -> RendererConfig {
        RendererConfig {
            light_colors: vec![ColorToken::parse("--primary").unwrap()],
            ..RendererConfig::default()
        }
    }

    fn detached(config: RendererConfig, style: Option<Arc<dyn StyleEnvironment>>) -> LifecycleController<HeadlessHost> {
        LifecycleController::new(HeadlessHost::detached(), config, style)
    }

    #[test]
    fn waits_for_the_init_delay() {
        let mut controller = detached(config(), None);
        let start = Instant::now();
        controller.mount(start);
        assert_eq!(controller.phase(), LifecyclePhase::Initializing);
        assert_eq!(controller.next_deadline(), Some(start + Duration::from_millis(100)));
        assert_eq!(controller.tick(start).unwrap(), TickOutcome::Waiting);
    }

    #[test]
    fn dispose_during_delay_skips_initialisation() {
        let mut controller = LifecycleController::new(
            HeadlessHost::new(ViewportSize::new(8, 8)),
            config(),
            None,
        );
        let start = Instant::now();
        controller.mount(start);
        controller.dispose();
        assert_eq!(
            controller.tick(start + Duration::from_secs(1)).unwrap(),
            TickOutcome::Disposed
        );
        assert!(!controller.pipeline().is_initialized());
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn missing_host_skips_initialisation_quietly() {
        let mut controller = detached(config(), None);
        let start = Instant::now();
        controller.mount(start);
        let outcome = controller.tick(start + Duration::from_millis(100)).unwrap();
        assert_eq!(outcome, TickOutcome::HostUnavailable);
        assert_eq!(controller.phase(), LifecyclePhase::Unmounted);
        assert!(!controller.pipeline().holds_resources());
    }

    #[test]
    fn variable_wait_is_bounded() {
        let style: Arc<dyn StyleEnvironment> = Arc::new(StyleSheet::new());
        let mut config = config();
        config.variable_wait = VariableWait {
            attempts: 3,
            backoff: Duration::from_millis(50),
        };
        let mut controller = detached(config, Some(style));
        let start = Instant::now();
        controller.mount(start);

        let t = start + Duration::from_millis(100);
        assert_eq!(controller.tick(t).unwrap(), TickOutcome::Waiting);
        assert_eq!(controller.next_deadline(), Some(t + Duration::from_millis(50)));
        assert_eq!(
            controller.tick(t + Duration::from_millis(20)).unwrap(),
            TickOutcome::Waiting
        );
        let t = t + Duration::from_millis(50);
        assert_eq!(controller.tick(t).unwrap(), TickOutcome::Waiting);
        let t = t + Duration::from_millis(50);
        assert_eq!(controller.tick(t).unwrap(), TickOutcome::Waiting);
        assert_eq!(controller.next_deadline(), Some(t + Duration::from_millis(50)));
        assert_eq!(
            controller.tick(t + Duration::from_millis(49)).unwrap(),
            TickOutcome::Waiting
        );
        let t = t + Duration::from_millis(50);
        assert_eq!(controller.tick(t).unwrap(), TickOutcome::HostUnavailable);
    }

    #[test]
    fn variable_wait_backs_off_after_every_failed_attempt() {
        let style: Arc<dyn StyleEnvironment> = Arc::new(StyleSheet::new());
        let mut config = config();
        config.init_delay = Duration::ZERO;
        config.variable_wait = VariableWait {
            attempts: 1,
            backoff: Duration::from_millis(50),
        };
        let mut controller = detached(config, Some(style));
        let start = Instant::now();
        controller.mount(start);

        assert_eq!(controller.tick(start).unwrap(), TickOutcome::Waiting);
        assert_eq!(controller.next_deadline(), Some(start + Duration::from_millis(50)));
        assert_eq!(
            controller.tick(start + Duration::from_millis(50)).unwrap(),
            TickOutcome::HostUnavailable
        );
    }

    #[test]
    fn available_variables_end_the_wait_immediately() {
        let sheet = StyleSheet::new();
        sheet.set_root_variable("--background", "0 0% 100%");
        let style: Arc<dyn StyleEnvironment> = Arc::new(sheet);
        let mut controller = detached(config(), Some(style));
        let start = Instant::now();
        controller.mount(start);
        assert_eq!(
            controller.tick(start + Duration::from_millis(100)).unwrap(),
            TickOutcome::HostUnavailable
        );
    }

    #[test]
    fn literal_colors_skip_the_variable_wait() {
        let style: Arc<dyn StyleEnvironment> = Arc::new(StyleSheet::new());
        let literal = vec![ColorToken::parse("#ffffff").unwrap()];
        let config = RendererConfig {
            light_colors: literal.clone(),
            dark_colors: literal,
            ..RendererConfig::default()
        };
        let mut controller = detached(config, Some(style));
        let start = Instant::now();
        controller.mount(start);
        assert_eq!(
            controller.tick(start + Duration::from_millis(100)).unwrap(),
            TickOutcome::HostUnavailable
        );
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut controller = LifecycleController::new(
            HeadlessHost::new(ViewportSize::new(8, 8)),
            config(),
            None,
        );
        controller.mount(Instant::now());
        controller.dispose();
        assert!(controller.is_disposed());
        assert!(!controller.pipeline().holds_resources());
        assert!(!controller.host().is_attached());
        controller.dispose();
        assert!(!controller.pipeline().holds_resources());
        assert_eq!(controller.phase(), LifecyclePhase::Unmounted);
    }

    #[test]
    fn snapshot_before_init_is_not_ready() {
        let mut controller = detached(config(), None);
        assert!(matches!(controller.capture_snapshot(), Err(RenderError::NotReady)));
    }

    #[test]
    fn theme_override_and_class_marker_drive_theme() {
        let sheet = Arc::new(StyleSheet::new());
        let style: Arc<dyn StyleEnvironment> = sheet.clone();
        let config = RendererConfig {
            theme_override: Some(ThemeMode::Dark),
            ..config()
        };
        let controller = detached(config, Some(style));
        assert_eq!(controller.theme(), ThemeMode::Dark);
    }

    #[test]
    fn outdated_surface_at_same_size_is_reconfigured() {
        let size = ViewportSize::new(1280, 720);
        assert_eq!(surface_recovery(Some(size), Some(size)), SurfaceRecovery::Reconfigure);
        assert_eq!(surface_recovery(Some(size), None), SurfaceRecovery::Reconfigure);
        assert_eq!(
            surface_recovery(Some(size), Some(ViewportSize::new(0, 720))),
            SurfaceRecovery::Reconfigure
        );
        let larger = ViewportSize::new(1920, 1080);
        assert_eq!(surface_recovery(Some(size), Some(larger)), SurfaceRecovery::Resize(larger));
    }

    const GPU_SIZE: ViewportSize = ViewportSize::new(4, 4);

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            GPU_SIZE.width,
            GPU_SIZE.height,
            Rgba(color),
        ))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
        bytes
    }

    fn literals(raw: &[&str]) -> Vec<ColorToken> {
        raw.iter().map(|raw| ColorToken::parse(raw).unwrap()).collect()
    }

    /// Loader whose fetches block until the test hands over the bytes.
    #[derive(Default)]
    struct GatedLoader {
        gates: Mutex<HashMap<String, Receiver<Vec<u8>>>>,
    }

    impl GatedLoader {
        fn gate(&self, location: &str) -> Sender<Vec<u8>> {
            let (tx, rx) = crossbeam_channel::bounded(1);
            self.gates.lock().unwrap().insert(location.to_string(), rx);
            tx
        }
    }

    impl MediaLoader for GatedLoader {
        fn fetch(&self, location: &str) -> Result<Vec<u8>, MediaError> {
            let rx = self.gates.lock().unwrap().get(location).cloned();
            rx.and_then(|rx| rx.recv().ok())
                .ok_or_else(|| MediaError::Unsupported(location.to_string()))
        }
    }

    /// Mounts on a 4x4 offscreen target and runs the first frame.
    /// Returns `None` when the machine has no usable adapter.
    fn running(
        config: RendererConfig,
        style: Option<Arc<dyn StyleEnvironment>>,
        loader: Arc<dyn MediaLoader>,
    ) -> Option<LifecycleController<HeadlessHost>> {
        let config = RendererConfig {
            init_delay: Duration::ZERO,
            gpu_power: GpuPowerPreference::Low,
            ..config
        };
        let mut controller =
            LifecycleController::with_loader(HeadlessHost::new(GPU_SIZE), config, style, loader);
        let now = Instant::now();
        controller.mount(now);
        match controller.tick(now) {
            Ok(TickOutcome::Rendered) => Some(controller),
            Err(RenderError::Device(err)) => {
                eprintln!("skipping GPU test: {err:#}");
                None
            }
            other => panic!("unexpected first tick: {other:?}"),
        }
    }

    fn tick_until_settled(controller: &mut LifecycleController<HeadlessHost>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !controller.media_status().is_settled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
            controller.tick(Instant::now()).unwrap();
        }
        assert!(controller.media_status().is_settled(), "media never settled");
    }

    fn center_pixel(controller: &mut LifecycleController<HeadlessHost>) -> [u8; 4] {
        let bytes = controller.capture_snapshot().expect("capture");
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        image.get_pixel(1, 1).0
    }

    fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!(
                (*a as i32 - *e as i32).abs() <= 2,
                "pixel {actual:?} differs from {expected:?}"
            );
        }
    }

    #[test]
    fn theme_flip_swaps_the_ramp_on_the_same_mesh() {
        let sheet = Arc::new(StyleSheet::new());
        let style: Arc<dyn StyleEnvironment> = sheet.clone();
        let config = RendererConfig {
            media: MediaDescriptor::RawImage(Arc::from(png([255, 255, 255, 255]))),
            light_colors: literals(&["#ffffff", "#000000"]),
            dark_colors: literals(&["#000000", "#ff0000"]),
            ..RendererConfig::default()
        };
        let Some(mut controller) = running(config, Some(style), Arc::new(DefaultLoader)) else {
            return;
        };
        tick_until_settled(&mut controller);
        assert_eq!(controller.media_status(), &MediaStatus::Still);
        assert_close(center_pixel(&mut controller), [0, 0, 0, 255]);
        let before = controller.pipeline().stats();

        sheet.set_class(DARK_CLASS, true);
        controller.tick(Instant::now()).unwrap();
        assert_eq!(controller.theme(), ThemeMode::Dark);
        assert_close(center_pixel(&mut controller), [255, 0, 0, 255]);

        sheet.set_class(DARK_CLASS, false);
        controller.set_theme_override(Some(ThemeMode::Dark));
        controller.tick(Instant::now()).unwrap();
        assert_eq!(controller.theme(), ThemeMode::Dark);
        controller.set_theme_override(Some(ThemeMode::Light));
        assert_close(center_pixel(&mut controller), [0, 0, 0, 255]);

        let after = controller.pipeline().stats();
        assert_eq!(after.meshes_created, 1);
        assert_eq!(after.materials_built, before.materials_built);
        assert_eq!(after.textures_created, before.textures_created);
        assert!(after.ramp_uploads > before.ramp_uploads);
    }

    #[test]
    fn superseded_media_is_dropped_by_the_controller() {
        let loader = Arc::new(GatedLoader::default());
        let release_first = loader.gate("first.png");
        let release_second = loader.gate("second.png");
        let config = RendererConfig {
            media: MediaDescriptor::Image("first.png".into()),
            pass_through: true,
            ..RendererConfig::default()
        };
        let Some(mut controller) = running(config, None, loader.clone()) else {
            return;
        };
        assert_eq!(controller.media_status(), &MediaStatus::Loading);

        controller.set_media(MediaDescriptor::Image("second.png".into()));
        release_second.send(png([0, 0, 255, 255])).unwrap();
        tick_until_settled(&mut controller);
        assert_eq!(controller.media_status(), &MediaStatus::Still);
        assert_close(center_pixel(&mut controller), [0, 0, 255, 255]);

        release_first.send(png([255, 0, 0, 255])).unwrap();
        thread::sleep(Duration::from_millis(20));
        controller.tick(Instant::now()).unwrap();
        assert_close(center_pixel(&mut controller), [0, 0, 255, 255]);
        assert_eq!(controller.pipeline().stats().textures_created, 1);
    }
}
