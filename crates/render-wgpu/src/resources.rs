use crate::GpuError;
use bytemuck::{Pod, Zeroable};
use ggp_assets::{CubeTextureData, MeshData, TextureData};
use ggp_common::{InstanceData, NUM_LIGHTS, SamplerKind};
use ggp_render::{DrawCommand, FrameConstants};
use glam::Mat4;
use wgpu::util::DeviceExt;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const SHADOW_MAP_SIZE: u32 = 2048;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct FrameUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    light_view_projection: [[f32; 4]; 4],
    eye: [f32; 4],
    light_positions: [[f32; 4]; NUM_LIGHTS],
    light_colors: [[f32; 4]; NUM_LIGHTS],
}

impl From<&FrameConstants> for FrameUniforms {
    fn from(c: &FrameConstants) -> Self {
        Self {
            view: c.view.to_cols_array_2d(),
            projection: c.projection.to_cols_array_2d(),
            light_view_projection: c.light_view_projection.to_cols_array_2d(),
            eye: c.eye.extend(1.0).to_array(),
            light_positions: c.light_positions.map(|p| p.to_array()),
            light_colors: c.light_colors.map(|p| p.to_array()),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct ObjectUniforms {
    world: [[f32; 4]; 4],
    output_color: [f32; 4],
    flags: [u32; 4],
}

impl From<&DrawCommand> for ObjectUniforms {
    fn from(cmd: &DrawCommand) -> Self {
        Self {
            world: cmd.world.to_cols_array_2d(),
            output_color: cmd.output_color.to_array(),
            flags: [
                cmd.material.is_some() as u32,
                cmd.has_normal_map as u32,
                0,
                0,
            ],
        }
    }
}

/// Vertex streams and index buffer of one uploaded mesh.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub normal_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub animation_buffer: Option<wgpu::Buffer>,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &MeshData, label: &str) -> Result<Self, GpuError> {
        mesh.validate()?;
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(GpuError::EmptyMesh(label.to_string()));
        }
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let normal_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_normals")),
            contents: bytemuck::cast_slice(&mesh.normals),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let animation_buffer = mesh.animation.as_ref().map(|animation| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label}_skin")),
                contents: bytemuck::cast_slice(animation),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        Ok(Self {
            vertex_buffer,
            normal_buffer,
            index_buffer,
            animation_buffer,
        })
    }

    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.normal_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    }
}

pub fn instance_buffer(
    device: &wgpu::Device,
    instances: &[InstanceData],
    label: &str,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}_instances")),
        contents: bytemuck::cast_slice(instances),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

pub fn bones_buffer(device: &wgpu::Device, palette: &[Mat4], label: &str) -> wgpu::Buffer {
    let data: Vec<[[f32; 4]; 4]> = palette.iter().map(|m| m.to_cols_array_2d()).collect();
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{label}_bones")),
        contents: bytemuck::cast_slice(&data),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

pub fn write_bones(queue: &wgpu::Queue, buffer: &wgpu::Buffer, palette: &[Mat4]) {
    let data: Vec<[[f32; 4]; 4]> = palette.iter().map(|m| m.to_cols_array_2d()).collect();
    queue.write_buffer(buffer, 0, bytemuck::cast_slice(&data));
}

/// Upload an RGBA8 texture with a full CPU-generated mip chain.
pub fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &TextureData,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::TextureView {
    let mip_level_count = data.mip_level_count();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let mut level = data.clone();
    for mip_level in 0..mip_level_count {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width),
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
        if mip_level + 1 < mip_level_count {
            level = level.downsample();
        }
    }
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

pub fn upload_cube(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    data: &CubeTextureData,
    label: &str,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: data.size,
            height: data.size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for (layer, face) in data.faces.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            face,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * data.size),
                rows_per_image: Some(data.size),
            },
            wgpu::Extent3d {
                width: data.size,
                height: data.size,
                depth_or_array_layers: 1,
            },
        );
    }
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    })
}

pub fn depth_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
    sampled: bool,
) -> wgpu::TextureView {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
    if sampled {
        usage |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

/// The fixed sampler set: trilinear wrap, trilinear clamp and shadow comparison.
pub struct Samplers {
    pub trilinear_wrap: wgpu::Sampler,
    pub trilinear_clamp: wgpu::Sampler,
    pub shadow: wgpu::Sampler,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        let trilinear = |label, mode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: mode,
                address_mode_v: mode,
                address_mode_w: mode,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        };
        Self {
            trilinear_wrap: trilinear("trilinear_wrap", wgpu::AddressMode::Repeat),
            trilinear_clamp: trilinear("trilinear_clamp", wgpu::AddressMode::ClampToEdge),
            shadow: device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("shadow_sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                compare: Some(wgpu::CompareFunction::LessEqual),
                ..Default::default()
            }),
        }
    }

    pub fn for_kind(&self, kind: SamplerKind) -> &wgpu::Sampler {
        match kind {
            SamplerKind::TrilinearWrap => &self.trilinear_wrap,
            SamplerKind::TrilinearClamp => &self.trilinear_clamp,
        }
    }
}

/// Round `size` up to the device's uniform offset alignment.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}
