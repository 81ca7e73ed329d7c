use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::color::{ColorRamp, MAX_RAMP};

use super::pipeline::{build_render_pipeline, PipelineLayouts};
use super::texture::SourceTexture;

/// Which fragment program the quad is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialMode {
    /// Shows the source media unmodified.
    PassThrough,
    /// Remaps luminance through the colour ramp.
    GradientMapped,
}

impl MaterialMode {
    pub fn from_pass_through(pass_through: bool) -> Self {
        if pass_through {
            MaterialMode::PassThrough
        } else {
            MaterialMode::GradientMapped
        }
    }
}

/// std140 mirror of the `GradientParams` block.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GradientUniforms {
    pub colors: [[f32; 4]; MAX_RAMP],
    pub count: i32,
    pub _padding: [i32; 3],
}

unsafe impl Zeroable for GradientUniforms {}
unsafe impl Pod for GradientUniforms {}

impl GradientUniforms {
    pub fn from_ramp(ramp: &ColorRamp) -> Self {
        let padded = ramp.padded();
        Self {
            colors: std::array::from_fn(|index| padded[index].to_vec4()),
            count: ramp.active_count() as i32,
            _padding: [0; 3],
        }
    }
}

struct RampBinding {
    buffer: wgpu::Buffer,
    uniforms: GradientUniforms,
    ramp: ColorRamp,
    dirty: bool,
}

/// Pipeline plus the resources bound at set 1.
pub(crate) struct Material {
    mode: MaterialMode,
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group: wgpu::BindGroup,
    ramp: Option<RampBinding>,
}

impl Material {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        target_format: wgpu::TextureFormat,
        mode: MaterialMode,
        texture: &SourceTexture,
        ramp: &ColorRamp,
    ) -> Self {
        let pipeline = build_render_pipeline(device, layouts, mode, target_format);
        let ramp = match mode {
            MaterialMode::PassThrough => None,
            MaterialMode::GradientMapped => {
                let uniforms = GradientUniforms::from_ramp(ramp);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("gradient ramp uniforms"),
                    contents: bytemuck::bytes_of(&uniforms),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                Some(RampBinding {
                    buffer,
                    uniforms,
                    ramp: ramp.clone(),
                    dirty: false,
                })
            }
        };
        let bind_group = create_bind_group(device, layouts, mode, texture, ramp.as_ref());
        Self {
            mode,
            pipeline,
            bind_group,
            ramp,
        }
    }

    pub(crate) fn mode(&self) -> MaterialMode {
        self.mode
    }

    pub(crate) fn ramp(&self) -> Option<&ColorRamp> {
        self.ramp.as_ref().map(|binding| &binding.ramp)
    }

    /// Points the material at a different source texture.
    pub(crate) fn rebind(
        &mut self,
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        texture: &SourceTexture,
    ) {
        self.bind_group = create_bind_group(device, layouts, self.mode, texture, self.ramp.as_ref());
    }

    /// Stages a new ramp. Pass-through materials ignore it and return `false`.
    pub(crate) fn set_ramp(&mut self, ramp: &ColorRamp) -> bool {
        let Some(binding) = self.ramp.as_mut() else {
            return false;
        };
        if binding.ramp == *ramp {
            return false;
        }
        binding.uniforms = GradientUniforms::from_ramp(ramp);
        binding.ramp = ramp.clone();
        binding.dirty = true;
        true
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.ramp.as_ref().is_some_and(|binding| binding.dirty)
    }

    /// Uploads staged uniforms before a draw.
    pub(crate) fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(binding) = self.ramp.as_mut().filter(|binding| binding.dirty) {
            queue.write_buffer(&binding.buffer, 0, bytemuck::bytes_of(&binding.uniforms));
            binding.dirty = false;
        }
    }

    pub(crate) fn destroy(self) {
        if let Some(binding) = self.ramp {
            binding.buffer.destroy();
        }
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    mode: MaterialMode,
    texture: &SourceTexture,
    ramp: Option<&RampBinding>,
) -> wgpu::BindGroup {
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&texture.view),
        },
        wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(&texture.sampler),
        },
    ];
    if let Some(binding) = ramp {
        entries.push(wgpu::BindGroupEntry {
            binding: 2,
            resource: binding.buffer.as_entire_binding(),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("gradmap material bind group"),
        layout: layouts.material_layout(mode),
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use std::mem::{align_of, size_of};

    #[test]
    fn gradient_uniforms_follow_std140_layout() {
        let uniforms = GradientUniforms::from_ramp(&ColorRamp::new(vec![Rgb::WHITE, Rgb::BLACK]));
        let base = &uniforms as *const _ as usize;

        assert_eq!(align_of::<GradientUniforms>(), 16);
        assert_eq!(size_of::<GradientUniforms>(), 176);
        assert_eq!((&uniforms.colors as *const _ as usize) - base, 0);
        assert_eq!((&uniforms.colors[1] as *const _ as usize) - base, 16);
        assert_eq!((&uniforms.count as *const _ as usize) - base, 16 * MAX_RAMP);
    }

    #[test]
    fn unused_slots_are_black_and_count_is_explicit() {
        let uniforms = GradientUniforms::from_ramp(&ColorRamp::new(vec![
            Rgb::WHITE,
            Rgb::new(0.5, 0.25, 0.0),
        ]));
        assert_eq!(uniforms.count, 2);
        assert_eq!(uniforms.colors[0], [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(uniforms.colors[1], [0.5, 0.25, 0.0, 1.0]);
        assert!(uniforms.colors[2..].iter().all(|slot| *slot == [0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn pass_through_flag_selects_mode() {
        assert_eq!(MaterialMode::from_pass_through(true), MaterialMode::PassThrough);
        assert_eq!(MaterialMode::from_pass_through(false), MaterialMode::GradientMapped);
    }
}
