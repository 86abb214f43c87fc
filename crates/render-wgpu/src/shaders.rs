//! WGSL sources. Each pipeline's module is assembled from the shared pieces
//! below so the uniform structs are declared once.

/// Uniform structs and vertex inputs shared by every pipeline.
const COMMON: &str = r#"
const NUM_LIGHTS: u32 = 2u;
const MAX_NUM_BONES: u32 = 128u;

struct Frame {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_view_projection: mat4x4<f32>,
    eye: vec4<f32>,
    light_positions: array<vec4<f32>, 2>,
    light_colors: array<vec4<f32>, 2>,
};

struct Object {
    world: mat4x4<f32>,
    output_color: vec4<f32>,
    // x: has diffuse texture, y: has normal map
    flags: vec4<u32>,
};

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
};

struct InstanceInput {
    @location(5) model_0: vec4<f32>,
    @location(6) model_1: vec4<f32>,
    @location(7) model_2: vec4<f32>,
    @location(8) model_3: vec4<f32>,
};

struct SkinInput {
    @location(9) bone_indices: vec4<u32>,
    @location(10) bone_weights: vec4<f32>,
};

fn instance_matrix(instance: InstanceInput) -> mat4x4<f32> {
    return mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
}
"#;

const MAIN_BINDINGS: &str = r#"
@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var shadow_map: texture_depth_2d;
@group(0) @binding(2) var shadow_sampler: sampler_comparison;
@group(1) @binding(0) var<uniform> object: Object;
"#;

const SHADOW_BINDINGS: &str = r#"
@group(0) @binding(0) var<uniform> frame: Frame;
@group(1) @binding(0) var<uniform> object: Object;
"#;

const MATERIAL_BINDINGS: &str = r#"
@group(2) @binding(0) var diffuse_texture: texture_2d<f32>;
@group(2) @binding(1) var normal_texture: texture_2d<f32>;
@group(2) @binding(2) var material_sampler: sampler;
"#;

const LIT_VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) tex_coord: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
    @location(5) light_space: vec4<f32>,
};

fn transform_vertex(world: mat4x4<f32>, v: VertexInput) -> VertexOutput {
    let world_position = world * vec4<f32>(v.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.projection * frame.view * world_position;
    out.world_position = world_position.xyz;
    out.tex_coord = v.tex_coord;
    out.normal = normalize((world * vec4<f32>(v.normal, 0.0)).xyz);
    out.tangent = (world * vec4<f32>(v.tangent, 0.0)).xyz;
    out.bitangent = (world * vec4<f32>(v.bitangent, 0.0)).xyz;
    out.light_space = frame.light_view_projection * world_position;
    return out;
}
"#;

const LIGHTING: &str = r#"
fn shadow_factor(light_space: vec4<f32>) -> f32 {
    if (light_space.w <= 0.0) {
        return 1.0;
    }
    let ndc = light_space.xyz / light_space.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }
    return textureSampleCompareLevel(shadow_map, shadow_sampler, uv, ndc.z - 0.002);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let diffuse_sample = textureSample(diffuse_texture, material_sampler, in.tex_coord);
    let normal_sample = textureSample(normal_texture, material_sampler, in.tex_coord).xyz;
    let albedo = select(object.output_color, diffuse_sample, object.flags.x != 0u);

    var n = normalize(in.normal);
    if (object.flags.y != 0u) {
        let tbn = mat3x3<f32>(normalize(in.tangent), normalize(in.bitangent), n);
        n = normalize(tbn * (normal_sample * 2.0 - 1.0));
    }

    let view_dir = normalize(frame.eye.xyz - in.world_position);
    let shadow = shadow_factor(in.light_space);
    var color = albedo.rgb * 0.1;
    for (var i = 0u; i < NUM_LIGHTS; i = i + 1u) {
        let l = normalize(frame.light_positions[i].xyz - in.world_position);
        let diffuse = max(dot(n, l), 0.0);
        let h = normalize(l + view_dir);
        let specular = pow(max(dot(n, h), 0.0), 32.0) * 0.5;
        var visibility = 1.0;
        if (i == 0u) {
            visibility = shadow;
        }
        color = color + (albedo.rgb * diffuse + vec3<f32>(specular)) * frame.light_colors[i].rgb * visibility;
    }
    return vec4<f32>(color, albedo.a);
}
"#;

const LIT_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    return transform_vertex(object.world, v);
}
"#;

const VOXEL_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput, instance: InstanceInput) -> VertexOutput {
    return transform_vertex(object.world * instance_matrix(instance), v);
}
"#;

const SKIN: &str = r#"
fn skin_matrix(skin: SkinInput) -> mat4x4<f32> {
    return bones[skin.bone_indices.x] * skin.bone_weights.x
        + bones[skin.bone_indices.y] * skin.bone_weights.y
        + bones[skin.bone_indices.z] * skin.bone_weights.z
        + bones[skin.bone_indices.w] * skin.bone_weights.w;
}
"#;

const SKINNED_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput, skin: SkinInput) -> VertexOutput {
    return transform_vertex(object.world * skin_matrix(skin), v);
}
"#;

const SKYBOX: &str = r#"
@group(2) @binding(0) var sky_texture: texture_cube<f32>;
@group(2) @binding(1) var sky_sampler: sampler;

struct SkyOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
};

@vertex
fn vs_main(v: VertexInput) -> SkyOutput {
    let clip = frame.projection * frame.view * object.world * vec4<f32>(v.position, 1.0);
    var out: SkyOutput;
    // z = w puts the sky on the far plane.
    out.clip_position = clip.xyww;
    out.direction = v.position;
    return out;
}

@fragment
fn fs_main(in: SkyOutput) -> @location(0) vec4<f32> {
    return textureSample(sky_texture, sky_sampler, normalize(in.direction));
}
"#;

const SHADOW_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput) -> @builtin(position) vec4<f32> {
    return frame.light_view_projection * object.world * vec4<f32>(v.position, 1.0);
}
"#;

const SHADOW_VOXEL_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let world = object.world * instance_matrix(instance);
    return frame.light_view_projection * world * vec4<f32>(v.position, 1.0);
}
"#;

const SHADOW_SKINNED_ENTRY: &str = r#"
@vertex
fn vs_main(v: VertexInput, skin: SkinInput) -> @builtin(position) vec4<f32> {
    let world = object.world * skin_matrix(skin);
    return frame.light_view_projection * world * vec4<f32>(v.position, 1.0);
}
"#;

fn bones_binding(group: u32) -> String {
    format!(
        "\n@group({group}) @binding(0) var<uniform> bones: array<mat4x4<f32>, MAX_NUM_BONES>;\n"
    )
}

pub fn lit() -> String {
    [COMMON, MAIN_BINDINGS, MATERIAL_BINDINGS, LIT_VERTEX, LIGHTING, LIT_ENTRY].concat()
}

pub fn voxel() -> String {
    [COMMON, MAIN_BINDINGS, MATERIAL_BINDINGS, LIT_VERTEX, LIGHTING, VOXEL_ENTRY].concat()
}

/// Bones live in group 3, after the material.
pub fn skinned() -> String {
    [
        COMMON,
        MAIN_BINDINGS,
        MATERIAL_BINDINGS,
        &bones_binding(3),
        SKIN,
        LIT_VERTEX,
        LIGHTING,
        SKINNED_ENTRY,
    ]
    .concat()
}

pub fn skybox() -> String {
    [COMMON, MAIN_BINDINGS, SKYBOX].concat()
}

pub fn shadow() -> String {
    [COMMON, SHADOW_BINDINGS, SHADOW_ENTRY].concat()
}

pub fn shadow_voxel() -> String {
    [COMMON, SHADOW_BINDINGS, SHADOW_VOXEL_ENTRY].concat()
}

/// The shadow pass has no material group, so bones move up to group 2.
pub fn shadow_skinned() -> String {
    [
        COMMON,
        SHADOW_BINDINGS,
        &bones_binding(2),
        SKIN,
        SHADOW_SKINNED_ENTRY,
    ]
    .concat()
}
