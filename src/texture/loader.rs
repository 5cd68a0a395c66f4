//! Fan-out/fan-in loading of a mip chain.
//!
//! One fetch is issued per level and all of them are polled together. The
//! loader waits for every fetch to settle before it looks at any result, then
//! either assembles the whole pyramid or reports the first failing level.

use futures::future::join_all;

use super::fetch::{FetchError, ImageFetcher};
use super::pyramid::{MipmapPyramid, TextureSampling};

/// Placeholder replaced by a level's edge size in path templates.
pub const SIZE_PLACEHOLDER: &str = "{size}";

/// Largest supported `max_level`; level 0 then has an edge of `2^31`.
pub const MAX_MIP_LEVEL: u32 = 31;

#[derive(Debug, thiserror::Error)]
pub enum MipmapError {
    #[error("path template `{0}` has no `{{size}}` placeholder")]
    MissingPlaceholder(String),
    #[error("max level {max_level} exceeds 31")]
    MaxLevelTooLarge { max_level: u32 },
    #[error("level {level} is outside 0..={max_level}")]
    LevelOutOfRange { level: u32, max_level: u32 },
    #[error("failed to fetch level {level} (`{identifier}`): {source}")]
    FetchFailure {
        level: u32,
        identifier: String,
        #[source]
        source: FetchError,
    },
    #[error("level {level} is {actual:?}, expected {expected:?}")]
    LevelSizeMismatch {
        level: u32,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("level {level} holds {actual} bytes, expected {expected}")]
    CorruptLevel {
        level: u32,
        expected: usize,
        actual: usize,
    },
    #[error("pyramid has no levels")]
    Empty,
    #[error("invalid sampling: {0}")]
    InvalidSampling(String),
}

/// Resource identifier for `level`: the template with `{size}` replaced by
/// `2^(max_level - level)`.
pub fn level_identifier(template: &str, max_level: u32, level: u32) -> Result<String, MipmapError> {
    if !template.contains(SIZE_PLACEHOLDER) {
        return Err(MipmapError::MissingPlaceholder(template.to_string()));
    }
    if max_level > MAX_MIP_LEVEL {
        return Err(MipmapError::MaxLevelTooLarge { max_level });
    }
    if level > max_level {
        return Err(MipmapError::LevelOutOfRange { level, max_level });
    }
    let size = 1u64 << (max_level - level);
    Ok(template.replace(SIZE_PLACEHOLDER, &size.to_string()))
}

/// Loads levels `0..=max_level` concurrently and assembles them.
///
/// Fails as a whole if any level fails; no partial pyramid is ever returned.
pub async fn load_pyramid<F: ImageFetcher>(
    fetcher: &F,
    template: &str,
    max_level: u32,
    sampling: TextureSampling,
) -> Result<MipmapPyramid, MipmapError> {
    sampling.validate()?;
    let identifiers = (0..=max_level)
        .map(|level| level_identifier(template, max_level, level))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!(
        "fetching {} mip levels for `{template}`",
        identifiers.len()
    );
    let results = join_all(identifiers.iter().map(|id| fetcher.fetch(id))).await;

    let mut levels = Vec::with_capacity(results.len());
    for (level, (identifier, result)) in (0u32..).zip(identifiers.into_iter().zip(results)) {
        match result {
            Ok(image) => levels.push(image),
            Err(source) => {
                log::warn!("mip level {level} (`{identifier}`) failed: {source}");
                return Err(MipmapError::FetchFailure {
                    level,
                    identifier,
                    source,
                });
            }
        }
    }

    let pyramid = MipmapPyramid::assemble(levels, sampling)?;
    log::debug!(
        "assembled {}x{} pyramid with {} levels",
        pyramid.base().width,
        pyramid.base().height,
        pyramid.level_count()
    );
    Ok(pyramid)
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use futures::executor::block_on;

    use super::*;
    use crate::texture::TextureImage;

    /// Returns `Pending` once, waking itself immediately.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                return Poll::Ready(());
            }
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    /// Serves solid squares sized from the `{size}` part of `tex_{size}.png`.
    #[derive(Default)]
    struct MockFetcher {
        fail: Option<&'static str>,
        /// Overrides the served edge for one identifier.
        wrong_size: Option<(&'static str, u32)>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    impl ImageFetcher for MockFetcher {
        fn fetch(&self, identifier: &str) -> impl Future<Output = Result<TextureImage, FetchError>> {
            let identifier = identifier.to_string();
            async move {
                self.requested.lock().unwrap().push(identifier.clone());
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                YieldOnce(false).await;
                self.max_in_flight
                    .fetch_max(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.completed.fetch_add(1, Ordering::SeqCst);

                if self.fail == Some(identifier.as_str()) {
                    return Err(FetchError::NotFound(identifier));
                }
                let size: u32 = identifier
                    .trim_start_matches("tex_")
                    .trim_end_matches(".png")
                    .parse()
                    .map_err(|_| FetchError::Backend(format!("bad identifier {identifier}")))?;
                let edge = match self.wrong_size {
                    Some((id, edge)) if id == identifier => edge,
                    _ => size,
                };
                let shade = (size * 16).min(255) as u8;
                Ok(TextureImage::solid(edge, edge, [shade, shade, shade, 255]))
            }
        }
    }

    fn load(fetcher: &MockFetcher, max_level: u32) -> Result<MipmapPyramid, MipmapError> {
        block_on(load_pyramid(
            fetcher,
            "tex_{size}.png",
            max_level,
            TextureSampling::default(),
        ))
    }

    #[test]
    fn identifiers_count_down_to_one() {
        let ids: Vec<_> = (0..=3)
            .map(|level| level_identifier("tex_{size}.png", 3, level).unwrap())
            .collect();
        assert_eq!(ids, ["tex_8.png", "tex_4.png", "tex_2.png", "tex_1.png"]);
        assert_eq!(level_identifier("a/{size}/{size}.jpg", 1, 0).unwrap(), "a/2/2.jpg");
        assert_eq!(level_identifier("t{size}", 0, 0).unwrap(), "t1");
    }

    #[test]
    fn identifier_rejects_bad_input() {
        assert!(matches!(
            level_identifier("tex.png", 3, 0),
            Err(MipmapError::MissingPlaceholder(_))
        ));
        assert!(matches!(
            level_identifier("t{size}", 32, 0),
            Err(MipmapError::MaxLevelTooLarge { max_level: 32 })
        ));
        assert!(matches!(
            level_identifier("t{size}", 2, 3),
            Err(MipmapError::LevelOutOfRange { level: 3, max_level: 2 })
        ));
        assert_eq!(
            level_identifier("t{size}", 31, 0).unwrap(),
            format!("t{}", 1u64 << 31)
        );
    }

    #[test]
    fn pyramid_halves_each_level() {
        let fetcher = MockFetcher::default();
        let pyramid = load(&fetcher, 3).unwrap();

        assert_eq!(pyramid.level_count(), 4);
        assert_eq!(pyramid.base().extent(), (8, 8));
        assert_eq!(pyramid.base(), &TextureImage::solid(8, 8, [128, 128, 128, 255]));
        for level in 1..4 {
            let (pw, ph) = pyramid.level_extent(level - 1).unwrap();
            let (w, h) = pyramid.level_extent(level).unwrap();
            assert_eq!((w * 2, h * 2), (pw, ph));
        }
        let mip_sizes: Vec<_> = pyramid.mipmaps().iter().map(|m| m.width).collect();
        assert_eq!(mip_sizes, vec![4, 2, 1]);
        assert_eq!(pyramid.mipmaps()[2].data, vec![16, 16, 16, 255]);
    }

    #[test]
    fn fetches_run_concurrently_and_all_complete() {
        let fetcher = MockFetcher::default();
        load(&fetcher, 3).unwrap();
        assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 4);
        assert_eq!(fetcher.completed.load(Ordering::SeqCst), 4);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 4);
    }

    #[test]
    fn failed_level_fails_the_whole_pyramid() {
        let fetcher = MockFetcher {
            fail: Some("tex_2.png"),
            ..MockFetcher::default()
        };
        let err = load(&fetcher, 3).unwrap_err();
        match err {
            MipmapError::FetchFailure {
                level, identifier, ..
            } => {
                assert_eq!(level, 2);
                assert_eq!(identifier, "tex_2.png");
            }
            other => panic!("unexpected error: {other}"),
        }
        // The siblings were still driven to completion.
        assert_eq!(fetcher.completed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn first_failure_in_level_order_is_reported() {
        struct FailAll;
        impl ImageFetcher for FailAll {
            fn fetch(&self, identifier: &str) -> impl Future<Output = Result<TextureImage, FetchError>> {
                let identifier = identifier.to_string();
                async move { Err(FetchError::NotFound(identifier)) }
            }
        }
        let err = block_on(load_pyramid(&FailAll, "tex_{size}.png", 2, TextureSampling::default()))
            .unwrap_err();
        assert!(matches!(err, MipmapError::FetchFailure { level: 0, .. }));
    }

    #[test]
    fn mismatched_level_size_is_rejected() {
        let fetcher = MockFetcher {
            wrong_size: Some(("tex_2.png", 3)),
            ..MockFetcher::default()
        };
        assert!(matches!(
            load(&fetcher, 3),
            Err(MipmapError::LevelSizeMismatch { level: 2, .. })
        ));
    }

    #[test]
    fn single_level_pyramid_has_no_mipmaps() {
        let fetcher = MockFetcher::default();
        let pyramid = load(&fetcher, 0).unwrap();
        assert_eq!(pyramid.level_count(), 1);
        assert!(pyramid.mipmaps().is_empty());
        assert_eq!(pyramid.base().extent(), (1, 1));
    }

    #[test]
    fn missing_placeholder_fails_before_fetching() {
        let fetcher = MockFetcher::default();
        let result = block_on(load_pyramid(&fetcher, "tex.png", 3, TextureSampling::default()));
        assert!(matches!(result, Err(MipmapError::MissingPlaceholder(_))));
        assert!(fetcher.requested.lock().unwrap().is_empty());
    }
}
