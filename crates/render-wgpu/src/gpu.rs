use crate::GpuError;
use crate::resources::{
    self, DEPTH_FORMAT, FrameUniforms, GpuMesh, ObjectUniforms, SHADOW_MAP_SIZE, Samplers,
};
use crate::shaders;
use ggp_assets::{CubeTextureData, MeshData, TextureData, TextureId, TextureStore};
use ggp_common::{AnimationData, InstanceData, NormalData, SamplerKind, SimpleVertex};
use ggp_render::{DrawCommand, DrawPass, FrameDraws, ObjectKey, Scene};
use std::collections::BTreeMap;
use std::num::NonZeroU64;

/// Largest instance count a single voxel field may upload.
pub const MAX_INSTANCES: u32 = 65_536;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.125,
    b: 0.6,
    a: 1.0,
};

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3];
const NORMAL_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![3 => Float32x3, 4 => Float32x3];
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    5 => Float32x4,
    6 => Float32x4,
    7 => Float32x4,
    8 => Float32x4,
];
const SKIN_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![9 => Uint32x4, 10 => Float32x4];

fn buffer_layout<T>(
    step_mode: wgpu::VertexStepMode,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<T>() as u64,
        step_mode,
        attributes,
    }
}

fn base_streams() -> [wgpu::VertexBufferLayout<'static>; 2] {
    [
        buffer_layout::<SimpleVertex>(wgpu::VertexStepMode::Vertex, &VERTEX_ATTRIBUTES),
        buffer_layout::<NormalData>(wgpu::VertexStepMode::Vertex, &NORMAL_ATTRIBUTES),
    ]
}

fn instance_stream() -> wgpu::VertexBufferLayout<'static> {
    buffer_layout::<InstanceData>(wgpu::VertexStepMode::Instance, &INSTANCE_ATTRIBUTES)
}

fn skin_stream() -> wgpu::VertexBufferLayout<'static> {
    buffer_layout::<AnimationData>(wgpu::VertexStepMode::Vertex, &SKIN_ATTRIBUTES)
}

struct PipelineDesc<'a> {
    label: &'a str,
    source: String,
    layout: &'a wgpu::PipelineLayout,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    color_format: Option<wgpu::TextureFormat>,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    bias: wgpu::DepthBiasState,
}

impl<'a> PipelineDesc<'a> {
    /// Color pass with back-face culling and depth writes.
    fn main(
        label: &'a str,
        source: String,
        layout: &'a wgpu::PipelineLayout,
        buffers: &'a [wgpu::VertexBufferLayout<'a>],
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            label,
            source,
            layout,
            buffers,
            color_format: Some(surface_format),
            cull_mode: Some(wgpu::Face::Back),
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            bias: wgpu::DepthBiasState::default(),
        }
    }

    /// Depth-only pass into the shadow map.
    fn shadow(
        label: &'a str,
        source: String,
        layout: &'a wgpu::PipelineLayout,
        buffers: &'a [wgpu::VertexBufferLayout<'a>],
    ) -> Self {
        Self {
            label,
            source,
            layout,
            buffers,
            color_format: None,
            cull_mode: None,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            bias: wgpu::DepthBiasState {
                constant: 2,
                slope_scale: 2.0,
                clamp: 0.0,
            },
        }
    }
}

fn create_pipeline(device: &wgpu::Device, desc: PipelineDesc<'_>) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(desc.label),
        source: wgpu::ShaderSource::Wgsl(desc.source.into()),
    });
    let targets = desc.color_format.map(|format| {
        [Some(wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })]
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: desc.buffers,
        },
        fragment: targets.as_ref().map(|targets| wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // Meshes are authored clockwise for a left-handed view.
            front_face: wgpu::FrontFace::Cw,
            cull_mode: desc.cull_mode,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: desc.depth_compare,
            stencil: Default::default(),
            bias: desc.bias,
        }),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    dynamic: bool,
    min_binding_size: Option<NonZeroU64>,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size,
        },
        count: None,
    }
}

fn texture_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32, kind: wgpu::SamplerBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(kind),
        count: None,
    }
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    shadow_frame: wgpu::BindGroupLayout,
    object: wgpu::BindGroupLayout,
    material: wgpu::BindGroupLayout,
    sky_material: wgpu::BindGroupLayout,
    bones: wgpu::BindGroupLayout,
}

impl Layouts {
    fn new(device: &wgpu::Device) -> Self {
        let object_size = NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64);
        Self {
            frame: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frame_layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT, false, None),
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    sampler_entry(2, wgpu::SamplerBindingType::Comparison),
                ],
            }),
            shadow_frame: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("shadow_frame_layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, false, None)],
            }),
            object: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("object_layout"),
                entries: &[uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    true,
                    object_size,
                )],
            }),
            material: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("material_layout"),
                entries: &[
                    texture_entry(0, wgpu::TextureViewDimension::D2),
                    texture_entry(1, wgpu::TextureViewDimension::D2),
                    sampler_entry(2, wgpu::SamplerBindingType::Filtering),
                ],
            }),
            sky_material: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sky_material_layout"),
                entries: &[
                    texture_entry(0, wgpu::TextureViewDimension::Cube),
                    sampler_entry(1, wgpu::SamplerBindingType::Filtering),
                ],
            }),
            bones: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("bones_layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, false, None)],
            }),
        }
    }
}

struct Pipelines {
    lit: wgpu::RenderPipeline,
    voxel: wgpu::RenderPipeline,
    skinned: wgpu::RenderPipeline,
    skybox: wgpu::RenderPipeline,
    shadow: wgpu::RenderPipeline,
    shadow_voxel: wgpu::RenderPipeline,
    shadow_skinned: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(device: &wgpu::Device, layouts: &Layouts, surface_format: wgpu::TextureFormat) -> Self {
        let pipeline_layout = |label, groups: &[&wgpu::BindGroupLayout]| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: groups,
                push_constant_ranges: &[],
            })
        };
        let lit_layout = pipeline_layout(
            "lit_layout",
            &[&layouts.frame, &layouts.object, &layouts.material],
        );
        let skinned_layout = pipeline_layout(
            "skinned_layout",
            &[
                &layouts.frame,
                &layouts.object,
                &layouts.material,
                &layouts.bones,
            ],
        );
        let skybox_layout = pipeline_layout(
            "skybox_layout",
            &[&layouts.frame, &layouts.object, &layouts.sky_material],
        );
        let shadow_layout =
            pipeline_layout("shadow_layout", &[&layouts.shadow_frame, &layouts.object]);
        let shadow_skinned_layout = pipeline_layout(
            "shadow_skinned_layout",
            &[&layouts.shadow_frame, &layouts.object, &layouts.bones],
        );

        let [vertices, normals] = base_streams();
        let base = [vertices.clone(), normals.clone()];
        let instanced = [vertices.clone(), normals.clone(), instance_stream()];
        let skinned = [vertices, normals, skin_stream()];

        Self {
            lit: create_pipeline(
                device,
                PipelineDesc::main("lit_pipeline", shaders::lit(), &lit_layout, &base, surface_format),
            ),
            voxel: create_pipeline(
                device,
                PipelineDesc::main(
                    "voxel_pipeline",
                    shaders::voxel(),
                    &lit_layout,
                    &instanced,
                    surface_format,
                ),
            ),
            skinned: create_pipeline(
                device,
                PipelineDesc::main(
                    "skinned_pipeline",
                    shaders::skinned(),
                    &skinned_layout,
                    &skinned,
                    surface_format,
                ),
            ),
            skybox: create_pipeline(
                device,
                PipelineDesc {
                    cull_mode: None,
                    depth_write: false,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    ..PipelineDesc::main(
                        "skybox_pipeline",
                        shaders::skybox(),
                        &skybox_layout,
                        &base,
                        surface_format,
                    )
                },
            ),
            shadow: create_pipeline(
                device,
                PipelineDesc::shadow("shadow_pipeline", shaders::shadow(), &shadow_layout, &base),
            ),
            shadow_voxel: create_pipeline(
                device,
                PipelineDesc::shadow(
                    "shadow_voxel_pipeline",
                    shaders::shadow_voxel(),
                    &shadow_layout,
                    &instanced,
                ),
            ),
            shadow_skinned: create_pipeline(
                device,
                PipelineDesc::shadow(
                    "shadow_skinned_pipeline",
                    shaders::shadow_skinned(),
                    &shadow_skinned_layout,
                    &skinned,
                ),
            ),
        }
    }
}

/// GPU copies of textures, keyed by id and color space.
#[derive(Default)]
struct TextureCache {
    views: BTreeMap<(TextureId, bool), wgpu::TextureView>,
    samplers: BTreeMap<TextureId, SamplerKind>,
}

impl TextureCache {
    /// Upload `id` if needed. Ids missing from the store get the checker texture.
    fn ensure(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        store: &TextureStore,
        id: TextureId,
        srgb: bool,
    ) {
        if self.views.contains_key(&(id, srgb)) {
            return;
        }
        let fallback;
        let data = match store.get(id) {
            Some(data) => data,
            None => {
                tracing::warn!("texture {:016x} missing from store, using checker", id.0);
                fallback = TextureData::invalid();
                &fallback
            }
        };
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let label = store.name(id).unwrap_or("texture");
        let view = resources::upload_texture(device, queue, data, format, label);
        self.views.insert((id, srgb), view);
        self.samplers.insert(id, data.sampler);
    }
}

/// Buffers uploaded for one scene object.
struct GpuObject {
    mesh: usize,
    instances: Option<wgpu::Buffer>,
    bones: Option<(wgpu::Buffer, wgpu::BindGroup)>,
}

type MaterialKey = (TextureId, Option<TextureId>);

/// wgpu backend: owns pipelines and GPU copies of one scene and executes
/// [`FrameDraws`] as a shadow pass followed by the main pass.
pub struct WgpuRenderer {
    surface_format: wgpu::TextureFormat,
    layouts: Layouts,
    pipelines: Pipelines,
    samplers: Samplers,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_frame_bind_group: wgpu::BindGroup,
    object_buffer: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    object_capacity: usize,
    object_stride: u64,
    depth_view: wgpu::TextureView,
    shadow_view: wgpu::TextureView,
    flat_normal: wgpu::TextureView,
    default_material: wgpu::BindGroup,
    textures: TextureCache,
    meshes: Vec<GpuMesh>,
    objects: BTreeMap<ObjectKey, GpuObject>,
    materials: BTreeMap<MaterialKey, wgpu::BindGroup>,
    sky_material: Option<wgpu::BindGroup>,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let layouts = Layouts::new(device);
        let pipelines = Pipelines::new(device, &layouts, surface_format);
        let samplers = Samplers::new(device);

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_view = resources::depth_texture(
            device,
            SHADOW_MAP_SIZE,
            SHADOW_MAP_SIZE,
            "shadow_map",
            true,
        );
        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &layouts.frame,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&samplers.shadow),
                },
            ],
        });
        let shadow_frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shadow_frame_bind_group"),
            layout: &layouts.shadow_frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let object_stride = resources::aligned_stride(
            std::mem::size_of::<ObjectUniforms>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let object_capacity = 64;
        let (object_buffer, object_bind_group) =
            Self::create_object_buffer(device, &layouts, object_capacity, object_stride);

        let white = TextureData::solid([255, 255, 255, 255]);
        let flat = TextureData::flat_normal();
        let white_view = resources::upload_texture(
            device,
            queue,
            &white,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            "white",
        );
        let flat_view = resources::upload_texture(
            device,
            queue,
            &flat,
            wgpu::TextureFormat::Rgba8Unorm,
            "flat_normal",
        );
        let default_material = Self::create_material(
            device,
            &layouts,
            &white_view,
            &flat_view,
            &samplers.trilinear_wrap,
            "default_material",
        );
        let depth_view = resources::depth_texture(device, width, height, "depth_texture", false);

        Self {
            surface_format,
            layouts,
            pipelines,
            samplers,
            frame_buffer,
            frame_bind_group,
            shadow_frame_bind_group,
            object_buffer,
            object_bind_group,
            object_capacity,
            object_stride,
            depth_view,
            shadow_view,
            flat_normal: flat_view,
            default_material,
            textures: TextureCache::default(),
            meshes: Vec::new(),
            objects: BTreeMap::new(),
            materials: BTreeMap::new(),
            sky_material: None,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_view = resources::depth_texture(device, width, height, "depth_texture", false);
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    fn create_object_buffer(
        device: &wgpu::Device,
        layouts: &Layouts,
        capacity: usize,
        stride: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object_uniforms"),
            size: capacity as u64 * stride,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object_bind_group"),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(std::mem::size_of::<ObjectUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_material(
        device: &wgpu::Device,
        layouts: &Layouts,
        diffuse: &wgpu::TextureView,
        normal: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layouts.material,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(diffuse),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(normal),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Replace all GPU resources with those of `scene`.
    pub fn upload_scene(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &Scene,
        textures: &TextureStore,
    ) -> Result<(), GpuError> {
        self.meshes.clear();
        self.objects.clear();
        self.materials.clear();
        self.sky_material = None;
        self.textures = TextureCache::default();

        let mut mesh_slots: BTreeMap<usize, usize> = BTreeMap::new();

        for (name, renderable) in scene.renderables() {
            let mesh = self.mesh_slot(device, queue, textures, &mut mesh_slots, &renderable.mesh, name)?;
            self.objects.insert(
                ObjectKey::Renderable(name.to_string()),
                GpuObject {
                    mesh,
                    instances: None,
                    bones: None,
                },
            );
        }

        for (index, voxel) in scene.voxels().iter().enumerate() {
            let count = voxel.instance_count();
            if count > MAX_INSTANCES {
                return Err(GpuError::TooManyInstances {
                    count,
                    max: MAX_INSTANCES,
                });
            }
            let label = format!("voxel_{index}");
            let mesh = self.mesh_slot(device, queue, textures, &mut mesh_slots, &voxel.mesh, &label)?;
            let instances = (count > 0)
                .then(|| resources::instance_buffer(device, &voxel.instances, &label));
            self.objects.insert(
                ObjectKey::Voxel(index),
                GpuObject {
                    mesh,
                    instances,
                    bones: None,
                },
            );
        }

        for (name, model) in scene.models() {
            let mesh = self.mesh_slot(device, queue, textures, &mut mesh_slots, &model.data.mesh, name)?;
            let bones = model.is_skinned().then(|| {
                let buffer = resources::bones_buffer(device, &model.bone_palette(), name);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(name),
                    layout: &self.layouts.bones,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                (buffer, bind_group)
            });
            self.objects.insert(
                ObjectKey::Model(name.to_string()),
                GpuObject {
                    mesh,
                    instances: None,
                    bones,
                },
            );
        }

        if let Some(skybox) = scene.skybox() {
            let fallback;
            let cube = match textures.get_cube(skybox.texture) {
                Some(cube) => cube,
                None => {
                    tracing::warn!("sky texture missing from store, using gradient");
                    fallback = CubeTextureData::gradient();
                    &fallback
                }
            };
            let view = resources::upload_cube(device, queue, cube, "sky_texture");
            let mesh = self.mesh_slot(device, queue, textures, &mut mesh_slots, &skybox.mesh, "skybox")?;
            self.sky_material = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("sky_material"),
                layout: &self.layouts.sky_material,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.samplers.trilinear_clamp),
                    },
                ],
            }));
            self.objects.insert(
                ObjectKey::Skybox,
                GpuObject {
                    mesh,
                    instances: None,
                    bones: None,
                },
            );
        }

        tracing::info!(
            "uploaded scene: {} objects, {} meshes, {} textures, {} materials",
            self.objects.len(),
            self.meshes.len(),
            self.textures.views.len(),
            self.materials.len()
        );
        Ok(())
    }

    /// Upload `mesh` once per distinct allocation, plus its materials.
    fn mesh_slot(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures: &TextureStore,
        slots: &mut BTreeMap<usize, usize>,
        mesh: &MeshData,
        label: &str,
    ) -> Result<usize, GpuError> {
        let key = std::ptr::from_ref(mesh) as usize;
        if let Some(&slot) = slots.get(&key) {
            return Ok(slot);
        }
        self.meshes.push(GpuMesh::upload(device, mesh, label)?);
        let slot = self.meshes.len() - 1;
        slots.insert(key, slot);

        for material in &mesh.materials {
            let Some(diffuse) = material.diffuse else {
                continue;
            };
            let key = (diffuse, material.normal);
            if self.materials.contains_key(&key) {
                continue;
            }
            self.textures.ensure(device, queue, textures, diffuse, true);
            if let Some(normal) = material.normal {
                self.textures.ensure(device, queue, textures, normal, false);
            }
            let bind_group = self.material_bind_group(device, key)?;
            self.materials.insert(key, bind_group);
        }
        Ok(slot)
    }

    fn material_bind_group(
        &self,
        device: &wgpu::Device,
        (diffuse, normal): MaterialKey,
    ) -> Result<wgpu::BindGroup, GpuError> {
        let diffuse_view = self
            .textures
            .views
            .get(&(diffuse, true))
            .ok_or(GpuError::TextureMissing(diffuse))?;
        let normal_view = match normal {
            Some(id) => self
                .textures
                .views
                .get(&(id, false))
                .ok_or(GpuError::TextureMissing(id))?,
            None => &self.flat_normal,
        };
        let sampler_kind = self
            .textures
            .samplers
            .get(&diffuse)
            .copied()
            .unwrap_or_default();
        Ok(Self::create_material(
            device,
            &self.layouts,
            diffuse_view,
            normal_view,
            self.samplers.for_kind(sampler_kind),
            "material",
        ))
    }

    /// Draw one frame: the shadow pass from light 0, then the main pass.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        frame: &FrameDraws,
    ) -> Result<(), GpuError> {
        queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms::from(&frame.constants)),
        );

        let slots = frame.shadow_casters.len() + frame.commands.len();
        if slots > self.object_capacity {
            let capacity = slots.next_power_of_two();
            let (buffer, bind_group) =
                Self::create_object_buffer(device, &self.layouts, capacity, self.object_stride);
            self.object_buffer = buffer;
            self.object_bind_group = bind_group;
            self.object_capacity = capacity;
            tracing::debug!("object uniform buffer grown to {capacity} slots");
        }
        if slots > 0 {
            let stride = self.object_stride as usize;
            let mut data = vec![0u8; slots * stride];
            for (slot, cmd) in frame
                .shadow_casters
                .iter()
                .chain(&frame.commands)
                .enumerate()
            {
                let uniforms = ObjectUniforms::from(cmd);
                let bytes = bytemuck::bytes_of(&uniforms);
                data[slot * stride..slot * stride + bytes.len()].copy_from_slice(bytes);
            }
            queue.write_buffer(&self.object_buffer, 0, &data);
        }

        for (name, palette) in &frame.bone_palettes {
            if let Some((buffer, _)) = self
                .objects
                .get(&ObjectKey::Model(name.clone()))
                .and_then(|o| o.bones.as_ref())
            {
                resources::write_bones(queue, buffer, palette);
            }
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.shadow_frame_bind_group, &[]);
            for (slot, cmd) in frame.shadow_casters.iter().enumerate() {
                self.draw_shadow(&mut pass, cmd, slot)?;
            }
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            let first = frame.shadow_casters.len();
            for (i, cmd) in frame.commands.iter().enumerate() {
                self.draw_main(&mut pass, cmd, first + i)?;
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn object(&self, key: &ObjectKey) -> Result<(&GpuObject, &GpuMesh), GpuError> {
        let object = self
            .objects
            .get(key)
            .ok_or_else(|| GpuError::UnknownObject(key.to_string()))?;
        Ok((object, &self.meshes[object.mesh]))
    }

    fn object_offset(&self, slot: usize) -> u32 {
        (slot as u64 * self.object_stride) as u32
    }

    fn draw_shadow(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        cmd: &DrawCommand,
        slot: usize,
    ) -> Result<(), GpuError> {
        let (object, mesh) = self.object(&cmd.object)?;
        pass.set_bind_group(1, &self.object_bind_group, &[self.object_offset(slot)]);
        mesh.bind(pass);
        match (cmd.pass, &object.instances, &object.bones, &mesh.animation_buffer) {
            (DrawPass::Voxel, Some(instances), _, _) => {
                pass.set_pipeline(&self.pipelines.shadow_voxel);
                pass.set_vertex_buffer(2, instances.slice(..));
            }
            (DrawPass::Voxel, None, _, _) => return Ok(()),
            (_, _, Some((_, bones)), Some(skin)) => {
                pass.set_pipeline(&self.pipelines.shadow_skinned);
                pass.set_bind_group(2, bones, &[]);
                pass.set_vertex_buffer(2, skin.slice(..));
            }
            _ => pass.set_pipeline(&self.pipelines.shadow),
        }
        draw_indexed(pass, cmd);
        Ok(())
    }

    fn draw_main(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        cmd: &DrawCommand,
        slot: usize,
    ) -> Result<(), GpuError> {
        let (object, mesh) = self.object(&cmd.object)?;
        pass.set_bind_group(1, &self.object_bind_group, &[self.object_offset(slot)]);
        mesh.bind(pass);

        if cmd.pass == DrawPass::Skybox {
            let material = self
                .sky_material
                .as_ref()
                .ok_or_else(|| GpuError::UnknownObject(cmd.object.to_string()))?;
            pass.set_pipeline(&self.pipelines.skybox);
            pass.set_bind_group(2, material, &[]);
            draw_indexed(pass, cmd);
            return Ok(());
        }

        let material = match cmd.material {
            Some(m) => self
                .materials
                .get(&(m.diffuse, m.normal))
                .ok_or(GpuError::TextureMissing(m.diffuse))?,
            None => &self.default_material,
        };
        pass.set_bind_group(2, material, &[]);

        match (cmd.pass, &object.instances, &object.bones, &mesh.animation_buffer) {
            (DrawPass::Voxel, Some(instances), _, _) => {
                pass.set_pipeline(&self.pipelines.voxel);
                pass.set_vertex_buffer(2, instances.slice(..));
            }
            (DrawPass::Voxel, None, _, _) => return Ok(()),
            (_, _, Some((_, bones)), Some(skin)) => {
                pass.set_pipeline(&self.pipelines.skinned);
                pass.set_bind_group(3, bones, &[]);
                pass.set_vertex_buffer(2, skin.slice(..));
            }
            _ => pass.set_pipeline(&self.pipelines.lit),
        }
        draw_indexed(pass, cmd);
        Ok(())
    }
}

fn draw_indexed(pass: &mut wgpu::RenderPass<'_>, cmd: &DrawCommand) {
    let range = cmd.indices;
    pass.draw_indexed(
        range.base_index..range.base_index + range.count,
        range.base_vertex,
        0..cmd.instances,
    );
}
