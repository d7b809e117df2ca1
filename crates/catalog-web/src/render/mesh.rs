//! GPU copies of scene meshes, keyed by `MeshId`.

use catalog_core::model::MeshData;
use glam::Mat4;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct DrawUniforms {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
    base_color: [f32; 4],
    params: [f32; 4],
}

pub(crate) struct GpuMesh {
    vertex_buf: wgpu::Buffer,
    index_buf: wgpu::Buffer,
    index_count: u32,
    uniform_buf: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
    base_color: [f32; 4],
    params: [f32; 4],
}

fn interleave(data: &MeshData) -> Vec<Vertex> {
    data.positions
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex {
            position: *p,
            normal: data.normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: data.uvs.get(i).copied().unwrap_or([0.0, 0.0]),
        })
        .collect()
}

impl GpuMesh {
    /// `texture` is the material's base colour view, or the 1x1 white fallback.
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        data: &MeshData,
        texture: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let vertices = interleave(data);
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vb"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_ib"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh_uniforms"),
            size: std::mem::size_of::<DrawUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_bg"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        let m = &data.material;
        let textured = if m.base_color_texture.is_some() { 1.0 } else { 0.0 };
        Self {
            vertex_buf,
            index_buf,
            index_count: data.indices.len() as u32,
            uniform_buf,
            bind_group,
            base_color: m.base_color,
            params: [m.metallic, m.roughness, textured, 0.0],
        }
    }

    pub(crate) fn write_transform(&self, queue: &wgpu::Queue, world: Mat4) {
        let normal = world.inverse().transpose();
        let normal = if normal.is_finite() { normal } else { Mat4::IDENTITY };
        let u = DrawUniforms {
            model: world.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            base_color: self.base_color,
            params: self.params,
        };
        queue.write_buffer(&self.uniform_buf, 0, bytemuck::bytes_of(&u));
    }

    pub(crate) fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 {
            return;
        }
        rpass.set_bind_group(1, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        rpass.set_index_buffer(self.index_buf.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Free the GPU buffers now rather than whenever the handles drop.
    pub(crate) fn destroy(&self) {
        self.vertex_buf.destroy();
        self.index_buf.destroy();
        self.uniform_buf.destroy();
    }
}
