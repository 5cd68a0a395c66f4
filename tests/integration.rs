use std::path::PathBuf;

use futures::executor::block_on;
use klein_engine::texture::{
    FileImageFetcher, MipmapError, TextureImage, TextureSampling, load_pyramid,
};
use klein_engine::{Engine, EngineError, EngineSettings};

/// Writes `name_{size}.png` for sizes `2^max_level` down to 1 into a fresh dir.
fn write_png_chain(dir_name: &str, max_level: u32, skip_size: Option<u32>) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "klein-engine-{dir_name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create fixture dir");

    for level in 0..=max_level {
        let size = 1u32 << (max_level - level);
        if Some(size) == skip_size {
            continue;
        }
        let shade = u8::try_from(level * 40).unwrap_or(255);
        let image = image::RgbaImage::from_pixel(size, size, image::Rgba([shade, 0, 255 - shade, 255]));
        image
            .save(dir.join(format!("checker_{size}.png")))
            .expect("write png");
    }
    dir
}

#[test]
fn engine_starts_with_reference_mesh() {
    let engine = Engine::new();
    let mesh = engine.mesh();
    mesh.validate().expect("mesh validate");
    assert_eq!(mesh.vertex_count(), 256);
    assert_eq!(mesh.triangle_count(), 450);
    assert!(engine.diagnostics().is_clean());

    let buffers = mesh.to_buffers();
    assert_eq!(buffers.positions.len(), 256 * 3);
    assert_eq!(buffers.uvs.len(), 256 * 2);
    assert_eq!(buffers.indices.len(), 450 * 3);
}

#[test]
fn sliders_drive_resolution() {
    let mut engine = Engine::new();
    engine.set_slider_value("Stacks", 8.0).expect("stacks slider");
    engine.set_slider_value("slices", 500.0).expect("slices slider");

    assert_eq!(engine.settings().tessellation.slices, 128);
    assert_eq!(engine.settings().tessellation.stacks, 8);
    assert_eq!(engine.mesh().vertex_count(), 129 * 9);

    let spec = engine
        .sliders()
        .into_iter()
        .find(|s| s.id == "slices")
        .expect("slices slider");
    assert_eq!(spec.value, 128.0);
    assert_eq!(spec.max, 128.0);
}

#[test]
fn settings_round_trip_through_json_shape() {
    let mut engine = Engine::new();
    let mut settings = EngineSettings::default();
    settings.tessellation.slices = 30;
    settings.tessellation.uv_repeat = 3.0;
    settings.sampling.anisotropy = 4;
    engine.configure(settings).expect("configure");

    assert_eq!(engine.settings(), &settings);
    let max_u = engine.mesh().uvs.iter().map(|uv| uv[0]).fold(0.0, f64::max);
    assert_eq!(max_u, 3.0);
}

#[test]
fn file_pyramid_loads_all_levels() {
    let dir = write_png_chain("pyramid-ok", 3, None);
    let fetcher = FileImageFetcher::new(&dir);

    let pyramid = block_on(load_pyramid(
        &fetcher,
        "checker_{size}.png",
        3,
        TextureSampling::default(),
    ))
    .expect("load pyramid");

    assert_eq!(pyramid.level_count(), 4);
    assert_eq!(pyramid.base().extent(), (8, 8));
    assert_eq!(pyramid.base().pixels[..4], [0, 0, 255, 255]);
    let extents: Vec<_> = (0..4).filter_map(|l| pyramid.level_extent(l)).collect();
    assert_eq!(extents, vec![(8, 8), (4, 4), (2, 2), (1, 1)]);
    assert_eq!(pyramid.mipmaps()[2].data, vec![120, 0, 135, 255]);

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn missing_level_fails_and_engine_keeps_texture() {
    let good = write_png_chain("pyramid-good", 2, None);
    let broken = write_png_chain("pyramid-broken", 2, Some(2));

    let mut engine = Engine::new();
    block_on(engine.load_texture(&FileImageFetcher::new(&good), "checker_{size}.png", 2))
        .expect("load good texture");
    let installed = engine.texture().cloned().expect("texture installed");

    let err = block_on(engine.load_texture(
        &FileImageFetcher::new(&broken),
        "checker_{size}.png",
        2,
    ))
    .unwrap_err();
    match err {
        EngineError::Texture(MipmapError::FetchFailure {
            level, identifier, ..
        }) => {
            assert_eq!(level, 1);
            assert_eq!(identifier, "checker_2.png");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.texture(), Some(&installed));
    assert_eq!(engine.texture_revision(), 1);

    let _ = std::fs::remove_dir_all(good);
    let _ = std::fs::remove_dir_all(broken);
}

#[test]
fn decoded_png_matches_written_pixels() {
    let mut bytes = Vec::new();
    let image = image::RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 40]));
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");

    let decoded = TextureImage::decode(&bytes).expect("decode png");
    assert_eq!(decoded.extent(), (2, 1));
    assert_eq!(decoded.pixels, vec![10, 20, 30, 40, 10, 20, 30, 40]);
}
