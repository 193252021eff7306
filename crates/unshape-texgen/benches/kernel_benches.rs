//! Benchmarks for the built-in kernels on the CPU backend.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use unshape_texgen::{
    Context, ElementType, Image, ImageDim, LatticeParams, Registry, WhiteNoiseParams,
};

fn bench_lattice(c: &mut Criterion) {
    let ctx = Context::new_cpu().unwrap();
    let registry = Registry::new_builtin();
    let params = LatticeParams::new(1).with_scale(16.0);

    for name in ["gradient_noise", "simplex_noise", "value_noise"] {
        let method = registry.build(name).unwrap();
        let mut image = Image::new_cpu(ImageDim::new(256, 256, 1, 1), ElementType::Float32).unwrap();
        c.bench_function(&format!("{name}_256x256_f32"), |b| {
            b.iter(|| {
                method
                    .compute_typed(&ctx, &mut image, black_box(&params))
                    .unwrap()
            })
        });
    }
}

fn bench_white_noise(c: &mut Criterion) {
    let ctx = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("white_noise").unwrap();
    let params = WhiteNoiseParams::new(42);

    let mut image = Image::new_cpu(ImageDim::new(512, 512, 1, 4), ElementType::UInt8).unwrap();
    c.bench_function("white_noise_512x512x4_u8", |b| {
        b.iter(|| {
            method
                .compute_typed(&ctx, &mut image, black_box(&params))
                .unwrap()
        })
    });
}

fn bench_gpu_round_trip(c: &mut Criterion) {
    let Ok(ctx) = Context::new_gpu() else {
        return;
    };
    let method = Registry::new_builtin().build("simplex_noise").unwrap();
    let params = LatticeParams::new(1).with_scale(16.0);
    let mut image =
        Image::new_gpu_2d(ImageDim::new(256, 256, 1, 1), ElementType::Float32, &ctx).unwrap();

    c.bench_function("simplex_noise_256x256_f32_gpu_sync", |b| {
        b.iter(|| {
            method.compute_typed(&ctx, &mut image, &params).unwrap();
            image.sync().unwrap();
        })
    });
}

criterion_group!(benches, bench_lattice, bench_white_noise, bench_gpu_round_trip);
criterion_main!(benches);
