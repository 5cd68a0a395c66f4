use serde::{Deserialize, Serialize};

use super::fetch::{TextureImage, rgba_len};
use super::loader::MipmapError;

/// Texel filtering modes, named after their WebGL counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    /// Trilinear: interpolate within and across mip levels.
    LinearMipmapLinear,
}

impl FilterMode {
    #[must_use]
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, Self::Nearest | Self::Linear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Sampler state the renderer applies to an uploaded pyramid.
///
/// Every level is supplied explicitly, so `generate_mipmaps` defaults to
/// `false`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextureSampling {
    pub generate_mipmaps: bool,
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    /// Texture-coordinate scale the renderer applies on top of the mesh UVs.
    pub repeat: [f64; 2],
    pub anisotropy: u8,
}

impl Default for TextureSampling {
    fn default() -> Self {
        Self {
            generate_mipmaps: false,
            min_filter: FilterMode::LinearMipmapLinear,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            repeat: [1.0, 1.0],
            anisotropy: 16,
        }
    }
}

impl TextureSampling {
    #[must_use]
    pub fn with_repeat(mut self, repeat: f64) -> Self {
        self.repeat = [repeat, repeat];
        self
    }

    pub fn validate(&self) -> Result<(), MipmapError> {
        if self.mag_filter.uses_mipmaps() {
            return Err(MipmapError::InvalidSampling(format!(
                "magnification filter {:?} cannot sample mip levels",
                self.mag_filter
            )));
        }
        if self.repeat.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(MipmapError::InvalidSampling(format!(
                "repeat must be finite and > 0, got {:?}",
                self.repeat
            )));
        }
        if self.anisotropy == 0 {
            return Err(MipmapError::InvalidSampling(
                "anisotropy must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A mip sublevel: extent plus the raw RGBA8 buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl From<TextureImage> for MipLevel {
    fn from(image: TextureImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            data: image.pixels,
        }
    }
}

/// Extent of the level below one of `width × height`.
#[must_use]
pub fn half_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// A fully loaded mip chain.
///
/// Only constructed once every level is present and consistent, and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MipmapPyramid {
    base: TextureImage,
    mipmaps: Vec<MipLevel>,
    sampling: TextureSampling,
}

impl MipmapPyramid {
    /// Builds a pyramid from per-level images in level order.
    ///
    /// Level 0 is kept whole as the base; the remaining levels are reduced to
    /// their pixel buffers. Each level must be half the size of the previous.
    pub(crate) fn assemble(
        levels: Vec<TextureImage>,
        sampling: TextureSampling,
    ) -> Result<Self, MipmapError> {
        let mut levels = levels.into_iter();
        let base = levels.next().ok_or(MipmapError::Empty)?;
        check_buffer(0, &base)?;

        let mut mipmaps: Vec<MipLevel> = Vec::with_capacity(levels.len());
        let mut previous = base.extent();
        for (level, image) in (1u32..).zip(levels) {
            let expected = half_extent(previous.0, previous.1);
            if image.extent() != expected {
                return Err(MipmapError::LevelSizeMismatch {
                    level,
                    expected,
                    actual: image.extent(),
                });
            }
            check_buffer(level, &image)?;
            previous = expected;
            mipmaps.push(image.into());
        }

        Ok(Self {
            base,
            mipmaps,
            sampling,
        })
    }

    #[must_use]
    pub fn base(&self) -> &TextureImage {
        &self.base
    }

    /// Sublevels `1..=max_level` in ascending order.
    #[must_use]
    pub fn mipmaps(&self) -> &[MipLevel] {
        &self.mipmaps
    }

    #[must_use]
    pub fn sampling(&self) -> &TextureSampling {
        &self.sampling
    }

    /// Number of levels including the base.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.mipmaps.len() + 1
    }

    #[must_use]
    pub fn level_extent(&self, level: usize) -> Option<(u32, u32)> {
        match level {
            0 => Some(self.base.extent()),
            _ => self.mipmaps.get(level - 1).map(|m| (m.width, m.height)),
        }
    }

    /// Pixel buffer of any level, base included.
    #[must_use]
    pub fn level_data(&self, level: usize) -> Option<&[u8]> {
        match level {
            0 => Some(&self.base.pixels),
            _ => self.mipmaps.get(level - 1).map(|m| m.data.as_slice()),
        }
    }

    #[must_use]
    pub fn info(&self) -> PyramidInfo {
        PyramidInfo {
            levels: (0..self.level_count())
                .filter_map(|level| self.level_extent(level))
                .map(|(w, h)| [w, h])
                .collect(),
            sampling: self.sampling,
        }
    }
}

fn check_buffer(level: u32, image: &TextureImage) -> Result<(), MipmapError> {
    if image.has_consistent_buffer() {
        return Ok(());
    }
    Err(MipmapError::CorruptLevel {
        level,
        expected: rgba_len(image.width, image.height),
        actual: image.pixels.len(),
    })
}

/// Level extents and sampler state, handed to the renderer with the buffers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidInfo {
    pub levels: Vec<[u32; 2]>,
    pub sampling: TextureSampling,
}
