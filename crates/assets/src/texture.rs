use crate::AssetError;
use ggp_common::SamplerKind;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Content-addressed texture id, derived from the texture's source name and sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl TextureId {
    pub fn from_source(source: &str, sampler: SamplerKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(sampler.as_str().as_bytes());
        let result = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&result[..8]);
        Self(u64::from_le_bytes(bytes))
    }
}

/// A decoded RGBA8 texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub sampler: SamplerKind,
}

impl TextureData {
    /// Decode an image file (png, jpeg, bmp, tga) into RGBA8.
    pub fn load(path: impl AsRef<Path>, sampler: SamplerKind) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| AssetError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
            sampler,
        })
    }

    /// Wrap raw RGBA8 pixels. Fails if the buffer does not match the size.
    pub fn from_rgba8(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        sampler: SamplerKind,
    ) -> Result<Self, AssetError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(AssetError::InvalidTexture(format!(
                "{width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            sampler,
        })
    }

    /// Single-texel texture.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
            sampler: SamplerKind::TrilinearWrap,
        }
    }

    /// Flat tangent-space normal (0, 0, 1).
    pub fn flat_normal() -> Self {
        Self::solid([128, 128, 255, 255])
    }

    /// 8x8 magenta and black checker shown wherever a texture failed to load.
    pub fn invalid() -> Self {
        const SIZE: u32 = 8;
        let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
        for y in 0..SIZE {
            for x in 0..SIZE {
                if (x + y) % 2 == 0 {
                    pixels.extend_from_slice(&[255, 0, 255, 255]);
                } else {
                    pixels.extend_from_slice(&[0, 0, 0, 255]);
                }
            }
        }
        Self {
            width: SIZE,
            height: SIZE,
            pixels,
            sampler: SamplerKind::TrilinearWrap,
        }
    }

    /// Number of mip levels for a full chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }

    /// RGBA8 pixels of the next mip level, box filtered.
    pub fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let mut sum = [0u32; 4];
                let mut taps = 0u32;
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let sx = (x * 2 + dx).min(self.width - 1);
                    let sy = (y * 2 + dy).min(self.height - 1);
                    let i = ((sy * self.width + sx) * 4) as usize;
                    for c in 0..4 {
                        sum[c] += self.pixels[i + c] as u32;
                    }
                    taps += 1;
                }
                for c in sum {
                    pixels.push((c / taps) as u8);
                }
            }
        }
        Self {
            width,
            height,
            pixels,
            sampler: self.sampler,
        }
    }
}

/// Six square RGBA8 faces in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeTextureData {
    pub size: u32,
    pub faces: [Vec<u8>; 6],
}

impl CubeTextureData {
    pub fn load(paths: &[PathBuf; 6]) -> Result<Self, AssetError> {
        let mut faces: [Vec<u8>; 6] = Default::default();
        let mut size = None;
        for (i, path) in paths.iter().enumerate() {
            let face = TextureData::load(path, SamplerKind::TrilinearClamp)?;
            if face.width != face.height {
                return Err(AssetError::CubeFaceMismatch(format!(
                    "face {i} ({}) is {}x{}, not square",
                    path.display(),
                    face.width,
                    face.height
                )));
            }
            match size {
                None => size = Some(face.width),
                Some(s) if s != face.width => {
                    return Err(AssetError::CubeFaceMismatch(format!(
                        "face {i} ({}) is {} pixels wide, expected {s}",
                        path.display(),
                        face.width
                    )));
                }
                Some(_) => {}
            }
            faces[i] = face.pixels;
        }
        Ok(Self {
            size: size.unwrap_or(1),
            faces,
        })
    }

    /// Every face filled with one colour.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            size: 1,
            faces: std::array::from_fn(|_| rgba.to_vec()),
        }
    }

    /// Vertical sky gradient: light top face, darker sides, dark bottom.
    pub fn gradient() -> Self {
        const SIZE: u32 = 16;
        let top = [150u8, 190, 255, 255];
        let bottom = [40u8, 40, 60, 255];
        let mut faces: [Vec<u8>; 6] = Default::default();
        for (i, face) in faces.iter_mut().enumerate() {
            for y in 0..SIZE {
                let t = y as f32 / (SIZE - 1) as f32;
                let colour = match i {
                    2 => top,
                    3 => bottom,
                    _ => std::array::from_fn(|c| {
                        (top[c] as f32 * (1.0 - t) + bottom[c] as f32 * t) as u8
                    }),
                };
                for _ in 0..SIZE {
                    face.extend_from_slice(&colour);
                }
            }
        }
        Self { size: SIZE, faces }
    }
}

/// Textures known to a scene, keyed by content id.
#[derive(Debug, Clone, Default)]
pub struct TextureStore {
    textures: BTreeMap<TextureId, TextureData>,
    cubes: BTreeMap<TextureId, CubeTextureData>,
    names: BTreeMap<TextureId, String>,
}

impl TextureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a texture file, or register the invalid checker under its id if that fails.
    pub fn load_or_invalid(&mut self, path: impl AsRef<Path>, sampler: SamplerKind) -> TextureId {
        let path = path.as_ref();
        let source = path.to_string_lossy();
        let id = TextureId::from_source(&source, sampler);
        if self.textures.contains_key(&id) {
            return id;
        }
        let data = match TextureData::load(path, sampler) {
            Ok(data) => {
                tracing::info!(
                    "loaded texture {} ({}x{})",
                    path.display(),
                    data.width,
                    data.height
                );
                data
            }
            Err(e) => {
                tracing::warn!("can't load texture {}: {e}", path.display());
                TextureData {
                    sampler,
                    ..TextureData::invalid()
                }
            }
        };
        self.textures.insert(id, data);
        self.names.insert(id, source.into_owned());
        id
    }

    /// Register an in-memory texture under a name.
    pub fn insert(&mut self, name: &str, data: TextureData) -> TextureId {
        let id = TextureId::from_source(name, data.sampler);
        self.textures.insert(id, data);
        self.names.insert(id, name.to_string());
        id
    }

    pub fn load_cube(&mut self, paths: &[PathBuf; 6]) -> Result<TextureId, AssetError> {
        let source = paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join("|");
        let id = TextureId::from_source(&source, SamplerKind::TrilinearClamp);
        if !self.cubes.contains_key(&id) {
            let data = CubeTextureData::load(paths)?;
            tracing::info!("loaded cube texture ({} px faces)", data.size);
            self.cubes.insert(id, data);
            self.names.insert(id, source);
        }
        Ok(id)
    }

    pub fn insert_cube(&mut self, name: &str, data: CubeTextureData) -> TextureId {
        let id = TextureId::from_source(name, SamplerKind::TrilinearClamp);
        self.cubes.insert(id, data);
        self.names.insert(id, name.to_string());
        id
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(&id)
    }

    pub fn get_cube(&self, id: TextureId) -> Option<&CubeTextureData> {
        self.cubes.get(&id)
    }

    pub fn name(&self, id: TextureId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn textures(&self) -> impl Iterator<Item = (TextureId, &TextureData)> {
        self.textures.iter().map(|(id, t)| (*id, t))
    }

    pub fn cubes(&self) -> impl Iterator<Item = (TextureId, &CubeTextureData)> {
        self.cubes.iter().map(|(id, t)| (*id, t))
    }

    pub fn len(&self) -> usize {
        self.textures.len() + self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.cubes.is_empty()
    }
}
