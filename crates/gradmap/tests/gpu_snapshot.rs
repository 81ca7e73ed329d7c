use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use gradmap::{
    render_still, ColorRamp, ColorToken, GpuPowerPreference, GradientPipeline, HeadlessHost,
    MaterialMode, MediaDescriptor, RenderError, RendererConfig, Rgb, SnapshotExporter,
    TextureKind, ViewportSize,
};
use image::{ImageFormat, Rgba, RgbaImage};

const SIZE: ViewportSize = ViewportSize::new(4, 4);

/// Returns `None` when the machine has no usable adapter.
fn headless_pipeline() -> Option<GradientPipeline> {
    let mut pipeline = GradientPipeline::new();
    match pipeline.init(&HeadlessHost::new(SIZE), GpuPowerPreference::Low) {
        Ok(()) => Some(pipeline),
        Err(RenderError::Device(err)) => {
            eprintln!("skipping GPU test: {err:#}");
            None
        }
        Err(err) => panic!("unexpected init failure: {err}"),
    }
}

fn solid(value: u8) -> RgbaImage {
    RgbaImage::from_pixel(SIZE.width, SIZE.height, Rgba([value, value, value, 255]))
}

fn center_pixel(pipeline: &mut GradientPipeline) -> [u8; 4] {
    let frame = pipeline.capture_frame().expect("capture");
    assert_eq!(frame.dimensions(), (SIZE.width, SIZE.height));
    frame.get_pixel(1, 1).0
}

fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!(
            (*a as i32 - *e as i32).abs() <= 2,
            "pixel {actual:?} differs from {expected:?}"
        );
    }
}

#[test]
fn white_to_black_ramp_inverts_luminance() {
    let Some(mut pipeline) = headless_pipeline() else {
        return;
    };
    let ramp = ColorRamp::new(vec![Rgb::WHITE, Rgb::BLACK]);
    pipeline.set_texture(&solid(255), TextureKind::Static).unwrap();
    pipeline.set_material(MaterialMode::GradientMapped, &ramp).unwrap();

    assert_close(center_pixel(&mut pipeline), [0, 0, 0, 255]);

    pipeline.set_texture(&solid(0), TextureKind::Static).unwrap();
    assert_close(center_pixel(&mut pipeline), [255, 255, 255, 255]);

    pipeline.set_texture(&solid(128), TextureKind::Static).unwrap();
    assert_close(center_pixel(&mut pipeline), [127, 127, 127, 255]);

    assert_eq!(pipeline.texture_kind(), Some(TextureKind::Static));
    assert_eq!(pipeline.current_ramp(), Some(&ramp));
    let stats = pipeline.stats();
    assert_eq!(stats.meshes_created, 1);
    assert_eq!(stats.materials_built, 1);
}

#[test]
fn theme_ramp_swap_keeps_mesh_and_texture() {
    let Some(mut pipeline) = headless_pipeline() else {
        return;
    };
    pipeline.set_texture(&solid(255), TextureKind::Static).unwrap();
    pipeline
        .set_material(
            MaterialMode::GradientMapped,
            &ColorRamp::new(vec![Rgb::BLACK, Rgb::WHITE]),
        )
        .unwrap();
    assert_close(center_pixel(&mut pipeline), [255, 255, 255, 255]);

    assert!(pipeline.update_ramp(&ColorRamp::new(vec![Rgb::BLACK, Rgb::new(1.0, 0.0, 0.0)])));
    assert_close(center_pixel(&mut pipeline), [255, 0, 0, 255]);

    let stats = pipeline.stats();
    assert_eq!(stats.meshes_created, 1);
    assert_eq!(stats.textures_created, 1);
    assert_eq!(stats.materials_built, 1);
    assert_eq!(stats.ramp_uploads, 1);
}

#[test]
fn pass_through_shows_the_source() {
    let Some(mut pipeline) = headless_pipeline() else {
        return;
    };
    let image = RgbaImage::from_pixel(SIZE.width, SIZE.height, Rgba([200, 40, 10, 255]));
    pipeline.set_texture(&image, TextureKind::Static).unwrap();
    pipeline
        .set_material(MaterialMode::PassThrough, &ColorRamp::new(vec![Rgb::WHITE, Rgb::BLACK]))
        .unwrap();
    assert!(!pipeline.update_ramp(&ColorRamp::new(vec![Rgb::BLACK, Rgb::WHITE])));
    assert_close(center_pixel(&mut pipeline), [200, 40, 10, 255]);
}

#[test]
fn single_stop_ramp_is_identity() {
    let Some(mut pipeline) = headless_pipeline() else {
        return;
    };
    let image = RgbaImage::from_pixel(SIZE.width, SIZE.height, Rgba([30, 120, 220, 255]));
    pipeline.set_texture(&image, TextureKind::Static).unwrap();
    pipeline
        .set_material(MaterialMode::GradientMapped, &ColorRamp::new(vec![Rgb::WHITE]))
        .unwrap();
    assert_close(center_pixel(&mut pipeline), [30, 120, 220, 255]);
}

#[test]
fn exporter_encodes_png() {
    let Some(mut pipeline) = headless_pipeline() else {
        return;
    };
    pipeline.set_texture(&solid(0), TextureKind::Static).unwrap();
    pipeline
        .set_material(MaterialMode::GradientMapped, &ColorRamp::new(vec![Rgb::WHITE, Rgb::BLACK]))
        .unwrap();
    let bytes = SnapshotExporter::new(&mut pipeline).capture().unwrap();
    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert_close(decoded.get_pixel(0, 0).0, [255, 255, 255, 255]);
}

#[test]
fn render_still_applies_raw_media() {
    let mut encoded = Cursor::new(Vec::new());
    solid(255).write_to(&mut encoded, ImageFormat::Png).unwrap();

    let literal = |raw: &str| ColorToken::parse(raw).unwrap();
    let config = RendererConfig {
        media: MediaDescriptor::RawImage(Arc::from(encoded.into_inner())),
        light_colors: vec![literal("#ffffff"), literal("#000000")],
        dark_colors: vec![literal("#ffffff"), literal("#000000")],
        init_delay: Duration::ZERO,
        gpu_power: GpuPowerPreference::Low,
        ..RendererConfig::default()
    };
    let bytes = match render_still(config, None, SIZE, Duration::from_secs(5)) {
        Ok(bytes) => bytes,
        Err(RenderError::Device(err)) => {
            eprintln!("skipping GPU test: {err:#}");
            return;
        }
        Err(err) => panic!("render failed: {err}"),
    };
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (SIZE.width, SIZE.height));
    assert_close(decoded.get_pixel(2, 2).0, [0, 0, 0, 255]);
}
