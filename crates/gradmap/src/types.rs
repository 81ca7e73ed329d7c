use std::time::Duration;

use crate::color::ColorToken;
use crate::media::MediaDescriptor;
use crate::theme::ThemeMode;
use crate::video::PlaybackOptions;

/// Width and height of the render target in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-area boxes cannot back a surface; callers treat them as "no host".
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamps both dimensions to at least one pixel.
    pub fn clamped(self) -> Self {
        Self::new(self.width.max(1), self.height.max(1))
    }
}

impl From<(u32, u32)> for ViewportSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for ViewportSize {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

/// Adapter preference forwarded to wgpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

impl From<GpuPowerPreference> for wgpu::PowerPreference {
    fn from(value: GpuPowerPreference) -> Self {
        match value {
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Bounded wait for theme variables to become readable before first paint.
///
/// Once the attempt budget is spent initialisation proceeds regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableWait {
    pub attempts: u32,
    pub backoff: Duration,
}

impl VariableWait {
    /// Budget used when the renderer is hosted directly.
    pub const STANDALONE: VariableWait = VariableWait {
        attempts: 3,
        backoff: Duration::from_millis(50),
    };

    /// Embedded hosts tend to apply their stylesheet late, so they wait longer.
    pub const EMBEDDED: VariableWait = VariableWait {
        attempts: 10,
        backoff: Duration::from_millis(100),
    };

    pub fn for_host(embedded: bool) -> Self {
        if embedded {
            Self::EMBEDDED
        } else {
            Self::STANDALONE
        }
    }
}

impl Default for VariableWait {
    fn default() -> Self {
        Self::STANDALONE
    }
}

/// Delay between mount and the first content-box measurement.
pub const DEFAULT_INIT_DELAY: Duration = Duration::from_millis(100);

/// Immutable configuration handed to the renderer when it is mounted.
///
/// `RendererConfig` mirrors what the host view supplies: which media to
/// show, which colour tokens make up the light and dark ramps, and a few
/// knobs for start-up timing.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial surface size when the host has not been measured yet.
    pub surface_size: ViewportSize,
    /// The single pixel source to display.
    pub media: MediaDescriptor,
    /// Colour tokens used while the light theme is active.
    pub light_colors: Vec<ColorToken>,
    /// Colour tokens used while the dark theme is active.
    pub dark_colors: Vec<ColorToken>,
    /// Show the media unmodified instead of gradient mapping it.
    pub pass_through: bool,
    /// Verbose colour resolution traces.
    pub debug: bool,
    /// The renderer lives inside an embedding host (longer variable wait, debug on).
    pub embedded: bool,
    /// Per-call theme override, consulted after the platform signal and class marker.
    pub theme_override: Option<ThemeMode>,
    /// Delay before the first measurement of the host.
    pub init_delay: Duration,
    /// Budget for waiting on theme variables during initialisation.
    pub variable_wait: VariableWait,
    /// Adapter preference.
    pub gpu_power: GpuPowerPreference,
    /// Playback flags for video sources.
    pub playback: PlaybackOptions,
}

impl RendererConfig {
    /// Debug traces are forced on inside embedding hosts.
    pub fn debug_enabled(&self) -> bool {
        self.debug || self.embedded
    }

    pub fn tokens_for(&self, theme: ThemeMode) -> &[ColorToken] {
        match theme {
            ThemeMode::Light => &self.light_colors,
            ThemeMode::Dark => &self.dark_colors,
        }
    }
}

impl Default for RendererConfig {
    /// A 1280x720 gradient renderer with no media and default theme ramps.
    fn default() -> Self {
        Self {
            surface_size: ViewportSize::new(1280, 720),
            media: MediaDescriptor::None,
            light_colors: Vec::new(),
            dark_colors: Vec::new(),
            pass_through: false,
            debug: false,
            embedded: false,
            theme_override: None,
            init_delay: DEFAULT_INIT_DELAY,
            variable_wait: VariableWait::default(),
            gpu_power: GpuPowerPreference::default(),
            playback: PlaybackOptions::default(),
        }
    }
}
