use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl QuadVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// The [-1,1]x[-1,1] plane. Texture row zero maps to the top edge.
pub(crate) const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 1.0] },
];

pub(crate) const QUAD_INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

/// Vertex and index buffers for the single full-viewport quad.
pub(crate) struct QuadGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl QuadGeometry {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gradmap quad vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gradmap quad indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: QUAD_INDICES.len() as u32,
        }
    }

    pub(crate) fn destroy(self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
    }
}

/// Orthographic camera framing the quad from `+z`.
///
/// Resizes never touch it: the quad fills the viewport at any aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthographicCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub z: f32,
}

impl OrthographicCamera {
    pub const fn framing_unit_quad() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 0.1,
            far: 10.0,
            z: 1.0,
        }
    }

    /// Column-major projection * view for wgpu's `[0, 1]` depth range.
    pub fn view_proj(&self) -> [[f32; 4]; 4] {
        let width = self.right - self.left;
        let height = self.top - self.bottom;
        let depth = self.far - self.near;
        [
            [2.0 / width, 0.0, 0.0, 0.0],
            [0.0, 2.0 / height, 0.0, 0.0],
            [0.0, 0.0, -1.0 / depth, 0.0],
            [
                -(self.right + self.left) / width,
                -(self.top + self.bottom) / height,
                (self.z - self.near) / depth,
                1.0,
            ],
        ]
    }

    /// Applies the camera to a point, returning clip-space xyz (w is always 1).
    pub fn project(&self, point: [f32; 3]) -> [f32; 3] {
        let m = self.view_proj();
        let mut out = [0.0; 3];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = m[0][row] * point[0] + m[1][row] * point[1] + m[2][row] * point[2] + m[3][row];
        }
        out
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

impl From<&OrthographicCamera> for CameraUniform {
    fn from(camera: &OrthographicCamera) -> Self {
        Self {
            view_proj: camera.view_proj(),
        }
    }
}

/// Camera uniform buffer plus its bind group (set 0).
pub(crate) struct CameraBinding {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        camera: &OrthographicCamera,
    ) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gradmap camera"),
            contents: bytemuck::bytes_of(&CameraUniform::from(camera)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gradmap camera bind group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    pub(crate) fn destroy(self) {
        self.buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_maps_quad_corners_onto_viewport_corners() {
        let camera = OrthographicCamera::framing_unit_quad();
        for vertex in QUAD_VERTICES {
            let clip = camera.project(vertex.position);
            assert!((clip[0] - vertex.position[0]).abs() < 1e-6);
            assert!((clip[1] - vertex.position[1]).abs() < 1e-6);
            assert!((0.0..=1.0).contains(&clip[2]), "depth {clip:?} outside wgpu range");
        }
    }

    #[test]
    fn quad_triangles_cover_all_corners() {
        let mut seen = [false; 4];
        for index in QUAD_INDICES {
            seen[index as usize] = true;
        }
        assert!(seen.iter().all(|hit| *hit));
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64);
    }
}
