use crate::AssetError;
use crate::texture::TextureId;
use ggp_common::{AnimationData, NormalData, SimpleVertex};
use glam::{Vec2, Vec3};

/// A contiguous index range drawn with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubMesh {
    pub num_indices: u32,
    pub base_index: u32,
    pub base_vertex: i32,
    pub material_index: usize,
}

/// Diffuse and normal textures of a submesh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Material {
    pub name: String,
    pub diffuse: Option<TextureId>,
    pub normal: Option<TextureId>,
}

impl Material {
    pub fn textured(name: impl Into<String>, diffuse: TextureId, normal: Option<TextureId>) -> Self {
        Self {
            name: name.into(),
            diffuse: Some(diffuse),
            normal,
        }
    }
}

/// CPU-side geometry: vertex streams, indices, submeshes and their materials.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<SimpleVertex>,
    pub normals: Vec<NormalData>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<SubMesh>,
    pub materials: Vec<Material>,
    /// Bone influences, present for skinned meshes only.
    pub animation: Option<Vec<AnimationData>>,
}

impl MeshData {
    /// Build a single-submesh mesh and derive its tangent frames.
    pub fn from_geometry(vertices: Vec<SimpleVertex>, indices: Vec<u32>) -> Self {
        let normals = compute_tangents(&vertices, &indices);
        let submeshes = vec![SubMesh {
            num_indices: indices.len() as u32,
            base_index: 0,
            base_vertex: 0,
            material_index: 0,
        }];
        Self {
            vertices,
            normals,
            indices,
            submeshes,
            materials: vec![Material::default()],
            animation: None,
        }
    }

    /// Use `material` for every submesh.
    pub fn with_material(mut self, material: Material) -> Self {
        self.materials = vec![material];
        for sub in &mut self.submeshes {
            sub.material_index = 0;
        }
        self
    }

    pub fn num_indices(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn num_vertices(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    /// True if any material carries a diffuse texture.
    pub fn has_texture(&self) -> bool {
        self.materials.iter().any(|m| m.diffuse.is_some())
    }

    /// True if any material carries a normal map.
    pub fn has_normal_map(&self) -> bool {
        self.materials.iter().any(|m| m.normal.is_some())
    }

    pub fn is_skinned(&self) -> bool {
        self.animation.is_some()
    }

    /// Check stream lengths, index bounds and submesh ranges.
    pub fn validate(&self) -> Result<(), AssetError> {
        let n = self.vertices.len();
        if self.normals.len() != n {
            return Err(AssetError::InvalidMesh(format!(
                "{} normal entries for {n} vertices",
                self.normals.len()
            )));
        }
        if let Some(anim) = &self.animation {
            if anim.len() != n {
                return Err(AssetError::InvalidMesh(format!(
                    "{} animation entries for {n} vertices",
                    anim.len()
                )));
            }
        }
        for sub in &self.submeshes {
            let end = sub.base_index as usize + sub.num_indices as usize;
            if end > self.indices.len() {
                return Err(AssetError::InvalidMesh(format!(
                    "submesh indices {}..{end} exceed {}",
                    sub.base_index,
                    self.indices.len()
                )));
            }
            if sub.material_index >= self.materials.len() {
                return Err(AssetError::InvalidMesh(format!(
                    "material index {} out of {}",
                    sub.material_index,
                    self.materials.len()
                )));
            }
            for &i in &self.indices[sub.base_index as usize..end] {
                let v = i as i64 + sub.base_vertex as i64;
                if v < 0 || v as usize >= n {
                    return Err(AssetError::InvalidMesh(format!(
                        "index {v} out of {n} vertices"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Unit cube centred at the origin, four vertices per face.
pub fn cube_mesh() -> MeshData {
    let p = 0.5_f32;
    let faces: [(Vec3, [Vec3; 4]); 6] = [
        // +Z
        (
            Vec3::Z,
            [
                Vec3::new(-p, -p, p),
                Vec3::new(p, -p, p),
                Vec3::new(p, p, p),
                Vec3::new(-p, p, p),
            ],
        ),
        // -Z
        (
            Vec3::NEG_Z,
            [
                Vec3::new(p, -p, -p),
                Vec3::new(-p, -p, -p),
                Vec3::new(-p, p, -p),
                Vec3::new(p, p, -p),
            ],
        ),
        // +X
        (
            Vec3::X,
            [
                Vec3::new(p, -p, p),
                Vec3::new(p, -p, -p),
                Vec3::new(p, p, -p),
                Vec3::new(p, p, p),
            ],
        ),
        // -X
        (
            Vec3::NEG_X,
            [
                Vec3::new(-p, -p, -p),
                Vec3::new(-p, -p, p),
                Vec3::new(-p, p, p),
                Vec3::new(-p, p, -p),
            ],
        ),
        // +Y
        (
            Vec3::Y,
            [
                Vec3::new(-p, p, p),
                Vec3::new(p, p, p),
                Vec3::new(p, p, -p),
                Vec3::new(-p, p, -p),
            ],
        ),
        // -Y
        (
            Vec3::NEG_Y,
            [
                Vec3::new(-p, -p, -p),
                Vec3::new(p, -p, -p),
                Vec3::new(p, -p, p),
                Vec3::new(-p, -p, p),
            ],
        ),
    ];
    let uvs = [
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 0.0),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, corners) in faces {
        let base = vertices.len() as u32;
        for (corner, uv) in corners.into_iter().zip(uvs) {
            vertices.push(SimpleVertex::new(corner, uv, normal));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    MeshData::from_geometry(vertices, indices)
}

/// Cube seen from the inside: same corners as [`cube_mesh`], reversed winding
/// and inward normals.
pub fn skybox_mesh() -> MeshData {
    let mut mesh = cube_mesh();
    for tri in mesh.indices.chunks_exact_mut(3) {
        tri.swap(1, 2);
    }
    for v in &mut mesh.vertices {
        v.normal = (-v.normal()).to_array();
    }
    mesh.normals = compute_tangents(&mesh.vertices, &mesh.indices);
    mesh
}

/// Per-vertex tangent and bitangent from triangle UV gradients.
///
/// Triangles with degenerate UVs contribute nothing; vertices left without a
/// tangent get an arbitrary basis perpendicular to their normal.
pub fn compute_tangents(vertices: &[SimpleVertex], indices: &[u32]) -> Vec<NormalData> {
    let mut tangents = vec![Vec3::ZERO; vertices.len()];
    let mut bitangents = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let (v0, v1, v2) = (&vertices[i0], &vertices[i1], &vertices[i2]);
        let e1 = v1.position() - v0.position();
        let e2 = v2.position() - v0.position();
        let d1 = v1.tex_coord() - v0.tex_coord();
        let d2 = v2.tex_coord() - v0.tex_coord();
        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b = (e2 * d1.x - e1 * d2.x) * r;
        for i in [i0, i1, i2] {
            tangents[i] += t;
            bitangents[i] += b;
        }
    }

    vertices
        .iter()
        .zip(tangents.into_iter().zip(bitangents))
        .map(|(v, (t, b))| {
            let n = v.normal().normalize_or_zero();
            // Gram-Schmidt against the normal.
            let mut t = (t - n * n.dot(t)).normalize_or_zero();
            if t == Vec3::ZERO {
                t = n.any_orthonormal_vector();
            }
            let mut b = b.normalize_or_zero();
            if b == Vec3::ZERO {
                b = n.cross(t);
            }
            NormalData {
                tangent: t.to_array(),
                bitangent: b.to_array(),
            }
        })
        .collect()
}
