use image::{Rgba, RgbaImage};

use crate::color::ColorRamp;
use crate::error::RenderError;
use crate::host::RenderHost;
use crate::media::MediaError;
use crate::types::{GpuPowerPreference, ViewportSize};

use super::context::GpuContext;
use super::geometry::{CameraBinding, OrthographicCamera, QuadGeometry};
use super::material::{Material, MaterialMode};
use super::pipeline::PipelineLayouts;
use super::readback::read_texture;
use super::texture::{SourceTexture, TextureKind};

/// Counters describing how often GPU objects were (re)built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub meshes_created: u32,
    pub materials_built: u32,
    pub textures_created: u32,
    pub texture_uploads: u32,
    pub ramp_uploads: u32,
    pub frames_rendered: u64,
}

/// The single drawable: shared quad geometry with one material.
struct Mesh {
    material: Material,
}

/// Owns every GPU object of one renderer instance.
///
/// All handles are optional so that [`GradientPipeline::dispose`] can release
/// them individually and be called any number of times.
#[derive(Default)]
pub struct GradientPipeline {
    context: Option<GpuContext>,
    layouts: Option<PipelineLayouts>,
    geometry: Option<QuadGeometry>,
    camera: Option<CameraBinding>,
    /// 1x1 transparent texture bound while no media is available.
    placeholder: Option<SourceTexture>,
    texture: Option<SourceTexture>,
    mesh: Option<Mesh>,
    stats: PipelineStats,
}

impl GradientPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the context sized to the host's content box, the camera and the quad.
    pub fn init(
        &mut self,
        host: &dyn RenderHost,
        gpu_power: GpuPowerPreference,
    ) -> Result<(), RenderError> {
        if self.context.is_some() {
            tracing::warn!("gradient pipeline already initialised; ignoring init");
            return Ok(());
        }
        let size = host
            .content_box()
            .filter(|size| !size.is_empty())
            .ok_or(RenderError::HostUnavailable)?;

        let context = match host.window_target() {
            Some(window) => GpuContext::windowed(window, size, gpu_power)?,
            None => GpuContext::headless(size, gpu_power)?,
        };
        let layouts = PipelineLayouts::new(&context.device);
        let geometry = QuadGeometry::new(&context.device);
        let camera = CameraBinding::new(
            &context.device,
            &layouts.camera_layout,
            &OrthographicCamera::framing_unit_quad(),
        );
        let placeholder = SourceTexture::from_image(
            &context.device,
            &context.queue,
            &RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])),
            TextureKind::Static,
        );
        tracing::debug!(
            width = context.size.width,
            height = context.size.height,
            format = ?context.format,
            windowed = context.is_windowed(),
            "gradient pipeline initialised"
        );

        self.context = Some(context);
        self.layouts = Some(layouts);
        self.geometry = Some(geometry);
        self.camera = Some(camera);
        self.placeholder = Some(placeholder);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// True while any GPU handle is still held.
    pub fn holds_resources(&self) -> bool {
        self.context.is_some()
            || self.layouts.is_some()
            || self.geometry.is_some()
            || self.camera.is_some()
            || self.placeholder.is_some()
            || self.texture.is_some()
            || self.mesh.is_some()
    }

    pub fn size(&self) -> Option<ViewportSize> {
        self.context.as_ref().map(|context| context.size)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    pub fn texture_kind(&self) -> Option<TextureKind> {
        self.texture.as_ref().map(|texture| texture.kind)
    }

    pub fn material_mode(&self) -> Option<MaterialMode> {
        self.mesh.as_ref().map(|mesh| mesh.material.mode())
    }

    pub fn current_ramp(&self) -> Option<&ColorRamp> {
        self.mesh.as_ref().and_then(|mesh| mesh.material.ramp())
    }

    /// Replaces the source texture and rebinds the current material to it.
    pub fn set_texture(&mut self, image: &RgbaImage, kind: TextureKind) -> Result<(), RenderError> {
        let (Some(context), Some(layouts)) = (self.context.as_ref(), self.layouts.as_ref()) else {
            return Err(RenderError::NotReady);
        };
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::MediaLoadFailed(MediaError::NoFrames));
        }

        let texture = SourceTexture::from_image(&context.device, &context.queue, image, kind);
        if let Some(mesh) = self.mesh.as_mut() {
            mesh.material.rebind(&context.device, layouts, &texture);
        }
        if let Some(previous) = self.texture.replace(texture) {
            previous.destroy();
        }
        self.stats.textures_created += 1;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            ?kind,
            "source texture bound"
        );
        Ok(())
    }

    /// Streams a new video frame, recreating the texture only when its size changes.
    pub fn upload_frame(&mut self, image: &RgbaImage) -> Result<(), RenderError> {
        let Some(context) = self.context.as_ref() else {
            return Err(RenderError::NotReady);
        };
        let uploaded = self
            .texture
            .as_ref()
            .filter(|texture| texture.kind == TextureKind::Streaming)
            .is_some_and(|texture| texture.upload_frame(&context.queue, image));
        if uploaded {
            self.stats.texture_uploads += 1;
            return Ok(());
        }
        self.set_texture(image, TextureKind::Streaming)
    }

    /// Drops the media texture; the mesh falls back to the transparent placeholder.
    pub fn clear_texture(&mut self) {
        let Some(previous) = self.texture.take() else {
            return;
        };
        if let (Some(context), Some(layouts), Some(placeholder), Some(mesh)) = (
            self.context.as_ref(),
            self.layouts.as_ref(),
            self.placeholder.as_ref(),
            self.mesh.as_mut(),
        ) {
            mesh.material.rebind(&context.device, layouts, placeholder);
        }
        previous.destroy();
        tracing::debug!("source texture released");
    }

    /// Builds a material and installs it on the mesh, creating the mesh on first use.
    pub fn set_material(&mut self, mode: MaterialMode, ramp: &ColorRamp) -> Result<(), RenderError> {
        let (Some(context), Some(layouts)) = (self.context.as_ref(), self.layouts.as_ref()) else {
            return Err(RenderError::NotReady);
        };
        let Some(source) = self.texture.as_ref().or(self.placeholder.as_ref()) else {
            return Err(RenderError::NotReady);
        };

        let material = Material::new(&context.device, layouts, context.format, mode, source, ramp);
        self.stats.materials_built += 1;
        match self.mesh.as_mut() {
            Some(mesh) => {
                let previous = std::mem::replace(&mut mesh.material, material);
                previous.destroy();
            }
            None => {
                self.mesh = Some(Mesh { material });
                self.stats.meshes_created += 1;
            }
        }
        tracing::debug!(?mode, stops = ramp.active_count(), "material installed");
        Ok(())
    }

    /// Stages a new ramp on the active material. Returns `false` for pass-through or no mesh.
    pub fn update_ramp(&mut self, ramp: &ColorRamp) -> bool {
        self.mesh
            .as_mut()
            .is_some_and(|mesh| mesh.material.set_ramp(ramp))
    }

    /// Draws one frame. Does nothing until a material exists.
    pub fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (Some(context), Some(geometry), Some(camera), Some(mesh)) = (
            self.context.as_ref(),
            self.geometry.as_ref(),
            self.camera.as_ref(),
            self.mesh.as_mut(),
        ) else {
            return Ok(());
        };

        if mesh.material.is_dirty() {
            self.stats.ramp_uploads += 1;
        }
        mesh.material.flush(&context.queue);

        let frame = context.acquire_frame()?;
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gradmap frame encoder"),
            });
        encode_pass(&mut encoder, &frame.view, geometry, camera, Some(&mesh.material));
        context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.stats.frames_rendered += 1;
        Ok(())
    }

    /// Renders the current state into a capture texture and reads it back.
    pub fn capture_frame(&mut self) -> Result<RgbaImage, RenderError> {
        let (Some(context), Some(geometry), Some(camera)) = (
            self.context.as_ref(),
            self.geometry.as_ref(),
            self.camera.as_ref(),
        ) else {
            return Err(RenderError::NotReady);
        };
        if let Some(mesh) = self.mesh.as_mut() {
            if mesh.material.is_dirty() {
                self.stats.ramp_uploads += 1;
            }
            mesh.material.flush(&context.queue);
        }

        let size = context.size;
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gradmap capture target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: context.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gradmap capture encoder"),
            });
        let material = self.mesh.as_ref().map(|mesh| &mesh.material);
        encode_pass(&mut encoder, &view, geometry, camera, material);
        context.queue.submit(std::iter::once(encoder.finish()));

        let image = read_texture(&context.device, &context.queue, &texture, size, context.format);
        texture.destroy();
        image
    }

    /// Matches the render target to the host's new content box. The camera is left alone.
    pub fn resize(&mut self, size: ViewportSize) {
        if let Some(context) = self.context.as_mut() {
            context.resize(size);
        }
    }

    /// Re-applies the surface configuration after `Lost`/`Outdated`.
    pub fn reconfigure(&mut self) {
        if let Some(context) = self.context.as_ref() {
            context.reconfigure();
        }
    }

    /// Releases texture, material, geometry and finally the context. Idempotent.
    pub fn dispose(&mut self) {
        if !self.holds_resources() {
            return;
        }
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
        if let Some(placeholder) = self.placeholder.take() {
            placeholder.destroy();
        }
        if let Some(mesh) = self.mesh.take() {
            mesh.material.destroy();
        }
        if let Some(geometry) = self.geometry.take() {
            geometry.destroy();
        }
        if let Some(camera) = self.camera.take() {
            camera.destroy();
        }
        self.layouts = None;
        self.context = None;
        tracing::debug!("gradient pipeline disposed");
    }
}

impl Drop for GradientPipeline {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn encode_pass(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    geometry: &QuadGeometry,
    camera: &CameraBinding,
    material: Option<&Material>,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("gradmap pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        occlusion_query_set: None,
        timestamp_writes: None,
    });
    let Some(material) = material else {
        return;
    };
    render_pass.set_pipeline(&material.pipeline);
    render_pass.set_bind_group(0, &camera.bind_group, &[]);
    render_pass.set_bind_group(1, &material.bind_group, &[]);
    render_pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
    render_pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
    render_pass.draw_indexed(0..geometry.index_count, 0, 0..1);
}
