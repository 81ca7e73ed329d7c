use crate::compile::{compile_fragment_shader, compile_vertex_shader};

use super::geometry::QuadVertex;
use super::material::MaterialMode;

/// Bind group layouts and the shared vertex module, created once per context.
pub(crate) struct PipelineLayouts {
    pub camera_layout: wgpu::BindGroupLayout,
    pub pass_through_layout: wgpu::BindGroupLayout,
    pub gradient_layout: wgpu::BindGroupLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: uniform_binding(),
                count: None,
            }],
        });

        let [texture_entry, sampler_entry] = source_entries();
        let pass_through_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass-through material layout"),
            entries: &[texture_entry, sampler_entry],
        });
        let gradient_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gradient material layout"),
            entries: &[
                texture_entry,
                sampler_entry,
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: uniform_binding(),
                    count: None,
                },
            ],
        });

        Self {
            camera_layout,
            pass_through_layout,
            gradient_layout,
            vertex_module: compile_vertex_shader(device),
        }
    }

    pub fn material_layout(&self, mode: MaterialMode) -> &wgpu::BindGroupLayout {
        match mode {
            MaterialMode::PassThrough => &self.pass_through_layout,
            MaterialMode::GradientMapped => &self.gradient_layout,
        }
    }
}

fn uniform_binding() -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

fn source_entries() -> [wgpu::BindGroupLayoutEntry; 2] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

/// Compiles the render pipeline for one material mode.
///
/// The layer is a flat background: alpha blended, no depth test or write.
pub(crate) fn build_render_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    mode: MaterialMode,
    target_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let fragment_module = compile_fragment_shader(device, mode);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("gradmap pipeline layout"),
        bind_group_layouts: &[&layouts.camera_layout, layouts.material_layout(mode)],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match mode {
            MaterialMode::PassThrough => "pass-through pipeline",
            MaterialMode::GradientMapped => "gradient pipeline",
        }),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layouts.vertex_module,
            entry_point: Some("main"),
            buffers: &[QuadVertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}
