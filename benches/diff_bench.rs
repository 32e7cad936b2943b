use criterion::{black_box, criterion_group, criterion_main, Criterion};

use refdiff::{png, DiffConfig, DiffOptions, RasterImage};

fn noisy(width: u32, height: u32, seed: u32) -> RasterImage {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ seed) as u8;
            data.extend_from_slice(&[v, v.wrapping_add(40), v.wrapping_mul(3), 255]);
        }
    }
    RasterImage::new(width, height, data).expect("valid dimensions")
}

fn bench_diff_images(c: &mut Criterion) {
    let reference = noisy(1280, 720, 0);
    let current = noisy(1280, 720, 5);
    c.bench_function("diff_images_720p", |b| {
        b.iter(|| refdiff::diff_images(black_box(&reference), black_box(&current), &[], DiffOptions::default()))
    });
}

fn bench_png_codec(c: &mut Criterion) {
    let image = noisy(800, 600, 9);
    let bytes = png::encode(&image).expect("encode");
    c.bench_function("png_encode_800x600", |b| b.iter(|| png::encode(black_box(&image)).unwrap()));
    c.bench_function("png_decode_800x600", |b| b.iter(|| png::decode(black_box(&bytes)).unwrap()));
}

fn bench_full_run(c: &mut Criterion) {
    let reference = png::encode(&noisy(640, 480, 0)).expect("encode");
    let current = png::encode(&noisy(1280, 960, 0)).expect("encode");
    let cfg = DiffConfig::default();
    c.bench_function("run_reference_diff_2x", |b| {
        b.iter(|| refdiff::run_reference_diff(black_box(&reference), black_box(&current), &cfg).unwrap())
    });
}

criterion_group!(benches, bench_diff_images, bench_png_codec, bench_full_run);
criterion_main!(benches);
