//! Texture mipmap pyramids.
//!
//! A pyramid is loaded from a set of pre-downsampled images, one per level,
//! named by substituting the level's edge size into a path template:
//!
//! ```ignore
//! use klein_engine::texture::{FileImageFetcher, TextureSampling, load_pyramid};
//!
//! let fetcher = FileImageFetcher::new("assets/textures");
//! // brick_8.png, brick_4.png, brick_2.png, brick_1.png
//! let pyramid = load_pyramid(&fetcher, "brick_{size}.png", 3, TextureSampling::default()).await?;
//! assert_eq!(pyramid.level_count(), 4);
//! ```

mod fetch;
mod loader;
mod pyramid;

#[cfg(not(target_arch = "wasm32"))]
pub use fetch::FileImageFetcher;
#[cfg(target_arch = "wasm32")]
pub use fetch::HttpImageFetcher;
pub use fetch::{FetchError, ImageFetcher, TextureImage};
pub use loader::{
    MAX_MIP_LEVEL, MipmapError, SIZE_PLACEHOLDER, level_identifier, load_pyramid,
};
pub use pyramid::{
    FilterMode, MipLevel, MipmapPyramid, PyramidInfo, TextureSampling, WrapMode, half_extent,
};
