use anyhow::{anyhow, Context as AnyhowContext, Result};

use crate::host::WindowTarget;
use crate::types::{GpuPowerPreference, ViewportSize};

/// Format used when rendering without a window.
pub(crate) const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where frames end up.
pub(crate) enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// A frame ready to be drawn into.
pub(crate) struct AcquiredFrame {
    surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
}

impl AcquiredFrame {
    pub(crate) fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub target: RenderTarget,
    pub size: ViewportSize,
    pub format: wgpu::TextureFormat,
}

impl GpuContext {
    /// Creates a device presenting into the given window.
    pub(crate) fn windowed(
        window: &dyn WindowTarget,
        initial_size: ViewportSize,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self> {
        let instance = create_instance();

        let window_handle = window
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = window
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // The host keeps the window alive until after the context is dropped.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = request_adapter(&instance, Some(&surface), gpu_power)?;
        let size = check_size(&adapter, initial_size)?;
        let (device, queue) = request_device(&adapter)?;

        let caps = surface.get_capabilities(&adapter);
        // Colours are mixed in the same gamma-encoded space the source media uses.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        if format.is_srgb() {
            tracing::warn!(?format, "no non-sRGB surface format available; ramp colours will be re-encoded");
        }

        let alpha_mode = if caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        let present_mode = if caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            caps.present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::AutoVsync)
        };
        tracing::debug!(?format, ?alpha_mode, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            target: RenderTarget::Surface { surface, config },
            size,
            format,
        })
    }

    /// Creates a device rendering into an offscreen texture.
    pub(crate) fn headless(initial_size: ViewportSize, gpu_power: GpuPowerPreference) -> Result<Self> {
        let instance = create_instance();
        let adapter = request_adapter(&instance, None, gpu_power)?;
        let size = check_size(&adapter, initial_size)?;
        let (device, queue) = request_device(&adapter)?;
        let (texture, view) = offscreen_texture(&device, size);

        Ok(Self {
            _instance: instance,
            device,
            queue,
            target: RenderTarget::Offscreen { texture, view },
            size,
            format: OFFSCREEN_FORMAT,
        })
    }

    /// Resizes the target. An unchanged size still reconfigures a window surface.
    pub(crate) fn resize(&mut self, new_size: ViewportSize) {
        if new_size.is_empty() {
            return;
        }
        if new_size == self.size {
            self.reconfigure();
            return;
        }
        self.size = new_size;
        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                config.width = new_size.width;
                config.height = new_size.height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture, view } => {
                texture.destroy();
                let (new_texture, new_view) = offscreen_texture(&self.device, new_size);
                *texture = new_texture;
                *view = new_view;
            }
        }
        tracing::debug!(width = new_size.width, height = new_size.height, "render target resized");
    }

    /// Re-applies the current configuration after the surface was lost.
    pub(crate) fn reconfigure(&self) {
        if let RenderTarget::Surface { surface, config } = &self.target {
            surface.configure(&self.device, config);
        }
    }

    pub(crate) fn acquire_frame(&self) -> Result<AcquiredFrame, wgpu::SurfaceError> {
        match &self.target {
            RenderTarget::Surface { surface, .. } => {
                let texture = surface.get_current_texture()?;
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(AcquiredFrame {
                    surface_texture: Some(texture),
                    view,
                })
            }
            RenderTarget::Offscreen { view, .. } => Ok(AcquiredFrame {
                surface_texture: None,
                view: view.clone(),
            }),
        }
    }

    pub(crate) fn is_windowed(&self) -> bool {
        matches!(self.target, RenderTarget::Surface { .. })
    }
}

fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

fn request_adapter(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    gpu_power: GpuPowerPreference,
) -> Result<wgpu::Adapter> {
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: gpu_power.into(),
        compatible_surface: surface,
        force_fallback_adapter: false,
    }))
    .context("failed to find a suitable GPU adapter")?;

    let info = adapter.get_info();
    tracing::debug!(
        name = %info.name,
        backend = ?info.backend,
        device_type = ?info.device_type,
        "selected GPU adapter"
    );
    Ok(adapter)
}

fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("gradmap device"),
        required_features: wgpu::Features::empty(),
        required_limits: adapter.limits(),
        memory_hints: wgpu::MemoryHints::MemoryUsage,
        trace: wgpu::Trace::default(),
    }))
    .context("failed to create GPU device")
}

fn check_size(adapter: &wgpu::Adapter, requested: ViewportSize) -> Result<ViewportSize> {
    let size = requested.clamped();
    let max_dimension = adapter.limits().max_texture_dimension_2d;
    if size.width > max_dimension || size.height > max_dimension {
        anyhow::bail!(
            "GPU max texture dimension is {max_dimension}, requested target is {}x{}",
            size.width,
            size.height
        );
    }
    Ok(size)
}

fn offscreen_texture(device: &wgpu::Device, size: ViewportSize) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("gradmap offscreen target"),
        size: wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
