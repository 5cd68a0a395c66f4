//! Image fetch backends for the pyramid loader.
//!
//! Native builds read images from disk. The browser build fetches them over
//! HTTP; both decode with the `image` crate into RGBA8 buffers.

use std::future::Future;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

/// A decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FetchError> {
        let expected = rgba_len(width, height);
        if pixels.len() != expected {
            return Err(FetchError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// An image filled with one colour.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(rgba_len(width, height) / 4);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Decodes PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FetchError> {
        Ok(image::load_from_memory(bytes)?.into())
    }

    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn has_consistent_buffer(&self) -> bool {
        self.pixels.len() == rgba_len(self.width, self.height)
    }
}

impl From<image::RgbaImage> for TextureImage {
    fn from(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }
}

impl From<image::DynamicImage> for TextureImage {
    fn from(image: image::DynamicImage) -> Self {
        image.to_rgba8().into()
    }
}

pub(crate) fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("resource `{0}` not found")]
    NotFound(String),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("HTTP {status} {status_text} for `{url}`")]
    Http {
        url: String,
        status: u16,
        status_text: String,
    },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("{0}")]
    Backend(String),
}

/// Source of decoded images, addressed by opaque identifiers.
///
/// Each call is independent; the loader issues one per mip level and polls
/// them concurrently.
pub trait ImageFetcher {
    fn fetch(&self, identifier: &str) -> impl Future<Output = Result<TextureImage, FetchError>>;
}

/// Reads images relative to a root directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileImageFetcher {
    root: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileImageFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ImageFetcher for FileImageFetcher {
    fn fetch(&self, identifier: &str) -> impl Future<Output = Result<TextureImage, FetchError>> {
        let path = self.root.join(identifier);
        async move {
            if !path.is_file() {
                return Err(FetchError::NotFound(path.display().to_string()));
            }
            let image = image::open(&path)?;
            log::debug!(
                "loaded {} ({}x{})",
                path.display(),
                image.width(),
                image.height()
            );
            Ok(image.into())
        }
    }
}

/// Fetches images with the browser `fetch` API, relative to a base URL.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    base_url: String,
}

#[cfg(target_arch = "wasm32")]
impl HttpImageFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, identifier: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            identifier.to_string()
        } else {
            format!("{base}/{}", identifier.trim_start_matches('/'))
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, identifier: &str) -> impl Future<Output = Result<TextureImage, FetchError>> {
        let url = self.url_for(identifier);
        async move {
            let bytes = fetch_bytes(&url).await?;
            TextureImage::decode(&bytes)
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn js_err(e: wasm_bindgen::JsValue) -> FetchError {
    FetchError::Backend(format!("{e:?}"))
}

#[cfg(target_arch = "wasm32")]
async fn fetch_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let win = web_sys::window().ok_or_else(|| FetchError::Backend("no window".to_string()))?;
    let resp_val = JsFuture::from(win.fetch_with_str(url))
        .await
        .map_err(js_err)?;
    let resp: web_sys::Response = resp_val.dyn_into().map_err(js_err)?;

    if !resp.ok() {
        return Err(FetchError::Http {
            url: url.to_string(),
            status: resp.status(),
            status_text: resp.status_text(),
        });
    }

    let buf_promise = resp.array_buffer().map_err(js_err)?;
    let buf_val = JsFuture::from(buf_promise).await.map_err(js_err)?;
    let bytes = js_sys::Uint8Array::new(&buf_val);
    Ok(bytes.to_vec())
}
