//! glTF import: geometry, materials, the first skin and all animations.

use crate::AssetError;
use crate::animation::{
    AnimationClip, Channel, ChannelValues, Interpolation, Joint, JointTransform, Skeleton,
};
use crate::mesh::{Material, MeshData, SubMesh, compute_tangents};
use crate::model::ModelData;
use crate::texture::{TextureData, TextureId, TextureStore};
use ggp_common::{AnimationData, SamplerKind, SimpleVertex};
use glam::{Mat3, Mat4, Quat, Vec2, Vec3};
use std::collections::BTreeMap;
use std::path::Path;

/// Load a glTF/GLB file. Embedded images are registered in `textures`.
pub fn load_gltf(path: impl AsRef<Path>, textures: &mut TextureStore) -> Result<ModelData, AssetError> {
    let path = path.as_ref();
    let (document, buffers, images) = gltf::import(path).map_err(|source| AssetError::Gltf {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        "importing {}: {} nodes, {} meshes, {} skins, {} animations",
        path.display(),
        document.nodes().count(),
        document.meshes().count(),
        document.skins().count(),
        document.animations().count()
    );

    let nodes = NodeTable::new(&document);
    let skin = document.skins().next();
    let joint_order = match &skin {
        Some(skin) => Some(JointOrder::new(skin, &nodes)),
        None => None,
    };

    let mut importer = Importer {
        source: path.to_string_lossy().into_owned(),
        buffers: &buffers,
        images: &images,
        textures,
        image_ids: BTreeMap::new(),
        material_slots: BTreeMap::new(),
        mesh: MeshData::default(),
    };

    for node in document.nodes() {
        let Some(mesh) = node.mesh() else { continue };
        let skinned = node.skin().is_some() && joint_order.is_some();
        let bake = if skinned {
            None
        } else {
            Some(nodes.global(node.index()))
        };
        for primitive in mesh.primitives() {
            importer.add_primitive(&primitive, bake, joint_order.as_ref())?;
        }
    }

    let mut mesh = importer.mesh;
    if mesh.materials.is_empty() {
        mesh.materials.push(Material::default());
    }
    mesh.validate()?;

    let skeleton = match (&skin, &joint_order) {
        (Some(skin), Some(order)) => Some(build_skeleton(skin, order, &nodes, &buffers)?),
        _ => None,
    };
    let clips = match &joint_order {
        Some(order) => document
            .animations()
            .enumerate()
            .map(|(i, anim)| build_clip(i, &anim, order, &buffers))
            .collect(),
        None => Vec::new(),
    };

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".into());
    tracing::info!(
        "model {name}: {} vertices, {} submeshes, {} joints, {} clips",
        mesh.num_vertices(),
        mesh.submeshes.len(),
        skeleton.as_ref().map(Skeleton::len).unwrap_or(0),
        clips.len()
    );

    Ok(ModelData {
        name,
        mesh,
        skeleton,
        clips,
    })
}

/// Parent links and global transforms of every node in the document.
struct NodeTable {
    parents: Vec<Option<usize>>,
    locals: Vec<Mat4>,
}

impl NodeTable {
    fn new(document: &gltf::Document) -> Self {
        let count = document.nodes().count();
        let mut parents = vec![None; count];
        let mut locals = vec![Mat4::IDENTITY; count];
        for node in document.nodes() {
            locals[node.index()] = Mat4::from_cols_array_2d(&node.transform().matrix());
            for child in node.children() {
                parents[child.index()] = Some(node.index());
            }
        }
        Self { parents, locals }
    }

    fn global(&self, index: usize) -> Mat4 {
        let mut m = self.locals[index];
        let mut cursor = self.parents[index];
        while let Some(p) = cursor {
            m = self.locals[p] * m;
            cursor = self.parents[p];
        }
        m
    }

    fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut cursor = self.parents[index];
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.parents[p];
        }
        depth
    }
}

/// Skin joints sorted parents-first, with the mapping from skin joint slots.
struct JointOrder {
    /// Node index of each joint in sorted order.
    nodes: Vec<usize>,
    /// Skin joint slot -> sorted joint index.
    remap: Vec<u32>,
}

impl JointOrder {
    fn new(skin: &gltf::Skin, table: &NodeTable) -> Self {
        let skin_nodes: Vec<usize> = skin.joints().map(|n| n.index()).collect();
        let mut sorted: Vec<usize> = (0..skin_nodes.len()).collect();
        sorted.sort_by_key(|&slot| table.depth(skin_nodes[slot]));
        let mut remap = vec![0u32; skin_nodes.len()];
        for (new, &slot) in sorted.iter().enumerate() {
            remap[slot] = new as u32;
        }
        Self {
            nodes: sorted.iter().map(|&slot| skin_nodes[slot]).collect(),
            remap,
        }
    }

    fn joint_of_node(&self, node: usize) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }
}

struct Importer<'a> {
    source: String,
    buffers: &'a [gltf::buffer::Data],
    images: &'a [gltf::image::Data],
    textures: &'a mut TextureStore,
    image_ids: BTreeMap<(usize, SamplerKind), TextureId>,
    material_slots: BTreeMap<Option<usize>, usize>,
    mesh: MeshData,
}

impl Importer<'_> {
    fn add_primitive(
        &mut self,
        primitive: &gltf::Primitive,
        bake: Option<Mat4>,
        joints: Option<&JointOrder>,
    ) -> Result<(), AssetError> {
        let buffers = self.buffers;
        let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| &d.0[..]));

        let Some(positions) = reader.read_positions() else {
            tracing::warn!("{}: primitive without positions skipped", self.source);
            return Ok(());
        };
        let mut positions: Vec<Vec3> = positions.map(Vec3::from_array).collect();
        let count = positions.len();
        let mut normals: Vec<Vec3> = match reader.read_normals() {
            Some(n) => n.map(Vec3::from_array).collect(),
            None => vec![Vec3::Y; count],
        };
        let tex_coords: Vec<Vec2> = match reader.read_tex_coords(0) {
            Some(t) => t.into_f32().map(Vec2::from_array).collect(),
            None => vec![Vec2::ZERO; count],
        };
        let indices: Vec<u32> = match reader.read_indices() {
            Some(i) => i.into_u32().collect(),
            None => (0..count as u32).collect(),
        };

        if let Some(m) = bake {
            let normal_matrix = Mat3::from_mat4(m).inverse().transpose();
            for p in &mut positions {
                *p = m.transform_point3(*p);
            }
            for n in &mut normals {
                *n = (normal_matrix * *n).normalize_or_zero();
            }
        }

        let vertices: Vec<SimpleVertex> = (0..count)
            .map(|i| {
                SimpleVertex::new(
                    positions[i],
                    tex_coords.get(i).copied().unwrap_or(Vec2::ZERO),
                    normals.get(i).copied().unwrap_or(Vec3::Y),
                )
            })
            .collect();
        let tangents = compute_tangents(&vertices, &indices);

        let animation = match (joints, reader.read_joints(0), reader.read_weights(0)) {
            (Some(order), Some(js), Some(ws)) => js
                .into_u16()
                .zip(ws.into_f32())
                .map(|(j, w)| {
                    AnimationData {
                        bone_indices: j.map(|slot| order.remap.get(slot as usize).copied().unwrap_or(0)),
                        bone_weights: w,
                    }
                    .normalized()
                })
                .collect(),
            _ => vec![
                AnimationData {
                    bone_indices: [0; 4],
                    bone_weights: [1.0, 0.0, 0.0, 0.0],
                };
                count
            ],
        };

        let material_index = self.material(primitive.material())?;
        let submesh = SubMesh {
            num_indices: indices.len() as u32,
            base_index: self.mesh.indices.len() as u32,
            base_vertex: self.mesh.vertices.len() as i32,
            material_index,
        };

        self.mesh.vertices.extend(vertices);
        self.mesh.normals.extend(tangents);
        self.mesh.indices.extend(indices);
        self.mesh.submeshes.push(submesh);
        if joints.is_some() {
            self.mesh
                .animation
                .get_or_insert_with(Vec::new)
                .extend(animation);
        }
        Ok(())
    }

    fn material(&mut self, material: gltf::Material) -> Result<usize, AssetError> {
        if let Some(&slot) = self.material_slots.get(&material.index()) {
            return Ok(slot);
        }
        let diffuse = match material.pbr_metallic_roughness().base_color_texture() {
            Some(info) => Some(self.texture(&info.texture())?),
            None => None,
        };
        let normal = match material.normal_texture() {
            Some(info) => Some(self.texture(&info.texture())?),
            None => None,
        };
        let slot = self.mesh.materials.len();
        self.mesh.materials.push(Material {
            name: material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("material_{slot}")),
            diffuse,
            normal,
        });
        self.material_slots.insert(material.index(), slot);
        Ok(slot)
    }

    fn texture(&mut self, texture: &gltf::Texture) -> Result<TextureId, AssetError> {
        let sampler = match texture.sampler().wrap_s() {
            gltf::texture::WrappingMode::ClampToEdge => SamplerKind::TrilinearClamp,
            _ => SamplerKind::TrilinearWrap,
        };
        let image = texture.source().index();
        if let Some(&id) = self.image_ids.get(&(image, sampler)) {
            return Ok(id);
        }
        let name = format!("{}#image{image}", self.source);
        let data = match self.images.get(image) {
            Some(data) => texture_from_gltf(data, sampler).unwrap_or_else(|e| {
                tracing::warn!("{name}: {e}");
                TextureData {
                    sampler,
                    ..TextureData::invalid()
                }
            }),
            None => {
                tracing::warn!("{name}: image missing from document");
                TextureData::invalid()
            }
        };
        let id = self.textures.insert(&name, data);
        self.image_ids.insert((image, sampler), id);
        Ok(id)
    }
}

fn texture_from_gltf(data: &gltf::image::Data, sampler: SamplerKind) -> Result<TextureData, AssetError> {
    use gltf::image::Format;
    let pixels = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&p| [p, p, p, 255]).collect(),
        other => {
            return Err(AssetError::InvalidTexture(format!(
                "unsupported glTF image format {other:?}"
            )));
        }
    };
    TextureData::from_rgba8(data.width, data.height, pixels, sampler)
}

fn build_skeleton(
    skin: &gltf::Skin,
    order: &JointOrder,
    table: &NodeTable,
    buffers: &[gltf::buffer::Data],
) -> Result<Skeleton, AssetError> {
    let reader = skin.reader(|b| buffers.get(b.index()).map(|d| &d.0[..]));
    let inverse_binds: Vec<Mat4> = match reader.read_inverse_bind_matrices() {
        Some(m) => m.map(|c| Mat4::from_cols_array_2d(&c)).collect(),
        None => Vec::new(),
    };
    let skin_nodes: Vec<gltf::Node> = skin.joints().collect();

    let mut joints = Vec::with_capacity(order.nodes.len());
    let mut root = Mat4::IDENTITY;
    for &node_index in &order.nodes {
        let slot = skin_nodes
            .iter()
            .position(|n| n.index() == node_index)
            .unwrap_or(0);
        let node = &skin_nodes[slot];
        let (t, r, s) = node.transform().decomposed();

        // Nearest ancestor that is also a joint.
        let mut parent = None;
        let mut cursor = table.parents[node_index];
        while let Some(p) = cursor {
            if let Some(j) = order.joint_of_node(p) {
                parent = Some(j);
                break;
            }
            cursor = table.parents[p];
        }
        if parent.is_none() && joints.is_empty() {
            root = table.parents[node_index]
                .map(|p| table.global(p))
                .unwrap_or(Mat4::IDENTITY);
        }

        joints.push(Joint {
            name: node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("joint_{}", joints.len())),
            parent,
            local: JointTransform {
                translation: Vec3::from_array(t),
                rotation: Quat::from_array(r),
                scale: Vec3::from_array(s),
            },
            inverse_bind: inverse_binds.get(slot).copied().unwrap_or(Mat4::IDENTITY),
        });
    }
    Skeleton::new(joints, root)
}

fn build_clip(
    index: usize,
    animation: &gltf::Animation,
    order: &JointOrder,
    buffers: &[gltf::buffer::Data],
) -> AnimationClip {
    use gltf::animation::util::ReadOutputs;

    let mut channels = Vec::new();
    for channel in animation.channels() {
        let Some(joint) = order.joint_of_node(channel.target().node().index()) else {
            continue;
        };
        let reader = channel.reader(|b| buffers.get(b.index()).map(|d| &d.0[..]));
        let Some(inputs) = reader.read_inputs() else { continue };
        let times: Vec<f32> = inputs.collect();
        let cubic = matches!(
            channel.sampler().interpolation(),
            gltf::animation::Interpolation::CubicSpline
        );
        let interpolation = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => Interpolation::Step,
            _ => Interpolation::Linear,
        };
        let values = match reader.read_outputs() {
            Some(ReadOutputs::Translations(v)) => {
                ChannelValues::Translation(keyframes(v.map(Vec3::from_array).collect(), cubic))
            }
            Some(ReadOutputs::Rotations(v)) => {
                ChannelValues::Rotation(keyframes(v.into_f32().map(Quat::from_array).collect(), cubic))
            }
            Some(ReadOutputs::Scales(v)) => {
                ChannelValues::Scale(keyframes(v.map(Vec3::from_array).collect(), cubic))
            }
            _ => continue,
        };
        channels.push(Channel {
            joint,
            interpolation,
            times,
            values,
        });
    }

    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("clip_{index}"));
    AnimationClip::new(name, channels)
}

/// Cubic spline outputs come as (in-tangent, value, out-tangent) triplets; keep the values.
fn keyframes<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_keyframes_keep_middle_value() {
        assert_eq!(keyframes(vec![1, 2, 3, 4, 5, 6], true), vec![2, 5]);
        assert_eq!(keyframes(vec![1, 2, 3], false), vec![1, 2, 3]);
    }

    #[test]
    fn rgb_images_expand_to_rgba() {
        let data = gltf::image::Data {
            pixels: vec![1, 2, 3, 4, 5, 6],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let tex = texture_from_gltf(&data, SamplerKind::TrilinearWrap).unwrap();
        assert_eq!(tex.pixels, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn missing_file_reports_path() {
        let mut store = TextureStore::new();
        let err = load_gltf("nope/missing.gltf", &mut store).unwrap_err();
        assert!(matches!(err, AssetError::Gltf { .. }));
        assert!(err.to_string().contains("missing.gltf"));
    }

    #[test]
    fn minimal_embedded_triangle() {
        // One triangle, positions only, buffer embedded as base64.
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let encoded = base64_encode(&bytes);
        let json = format!(
            r#"{{
  "asset": {{"version": "2.0"}},
  "scene": 0,
  "scenes": [{{"nodes": [0]}}],
  "nodes": [{{"mesh": 0, "translation": [0.0, 2.0, 0.0]}}],
  "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}}}]}}],
  "buffers": [{{"byteLength": 36, "uri": "data:application/octet-stream;base64,{encoded}"}}],
  "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
  "accessors": [{{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                  "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}}]
}}"#
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.gltf");
        std::fs::write(&path, json).unwrap();

        let mut store = TextureStore::new();
        let model = load_gltf(&path, &mut store).unwrap();
        assert_eq!(model.name, "tri");
        assert_eq!(model.mesh.num_vertices(), 3);
        assert_eq!(model.mesh.num_indices(), 3);
        assert_eq!(model.mesh.submeshes.len(), 1);
        assert!(model.skeleton.is_none());
        assert!(!model.is_skinned());
        // Node translation is baked into the static mesh.
        assert_eq!(model.mesh.vertices[0].position, [0.0, 2.0, 0.0]);
    }

    fn base64_encode(bytes: &[u8]) -> String {
        const TABLE: &[u8; 64] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let mut out = String::new();
        for chunk in bytes.chunks(3) {
            let b = [
                chunk[0],
                chunk.get(1).copied().unwrap_or(0),
                chunk.get(2).copied().unwrap_or(0),
            ];
            let n = (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;
            for i in 0..4 {
                if i <= chunk.len() {
                    out.push(TABLE[(n >> (18 - 6 * i) & 63) as usize] as char);
                } else {
                    out.push('=');
                }
            }
        }
        out
    }
}
