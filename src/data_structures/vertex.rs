//! Vertex data as it is laid out in GPU memory.

/// Anything that can describe its own vertex buffer layout to a pipeline.
pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

/// Position, colour and texture coordinate of a single vertex.
///
/// Nine packed `f32`s: `x, y, z, r, g, b, a, s, t`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coords: [f32; 2],
}

impl ModelVertex {
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        x: f32,
        y: f32,
        z: f32,
        r: f32,
        g: f32,
        b: f32,
        a: f32,
        s: f32,
        t: f32,
    ) -> Self {
        Self {
            position: [x, y, z],
            color: [r, g, b, a],
            tex_coords: [s, t],
        }
    }
}

const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4, 2 => Float32x2];

/**
 * offset: zero as every vertex buffer starts with the first vertex.
 * stride: nine floats, position at 0, colour at 12 and texture coordinates at 28 bytes.
 */
impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}
