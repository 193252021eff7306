//! Built-in methods on the CPU backend, and agreement with the GPU backend.

use unshape_texgen::{
    Context, DebugParams, ElementType, Image, ImageDim, LatticeParams, Registry, StatsMode,
    TexgenError, Vec2, WhiteNoiseParams,
};

fn white_noise_run(seed: u32) -> Vec<u8> {
    let ctx = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("white_noise").unwrap();
    let mut image = Image::new_cpu(ImageDim::new(4, 4, 1, 1), ElementType::UInt8).unwrap();
    method
        .compute_typed(&ctx, &mut image, &WhiteNoiseParams::new(seed))
        .unwrap();
    image.map_read().unwrap().data_u8().unwrap().to_vec()
}

#[test]
fn test_white_noise_is_deterministic() {
    let first = white_noise_run(42);
    let second = white_noise_run(42);
    let other = white_noise_run(43);

    assert_eq!(first.len(), 16);
    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn test_debug_fills_constant() {
    let ctx = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("debug").unwrap();
    let mut image = Image::new_cpu(ImageDim::new(2, 2, 1, 4), ElementType::Float32).unwrap();

    method
        .compute(&ctx, &mut image, &0.5f32.to_ne_bytes())
        .unwrap();

    let view = image.map_read().unwrap();
    let bytes = view.bytes();
    assert_eq!(bytes.len(), 16 * 4);
    for chunk in bytes.chunks_exact(4) {
        assert_eq!(chunk, 0.5f32.to_ne_bytes());
    }
    assert!(view.data_f32().unwrap().iter().all(|&v| v == 0.5));
}

#[test]
fn test_debug_default_params() {
    assert_eq!(DebugParams::default().alpha_value, 1.0);
    assert_eq!(LatticeParams::default().scale, 32.0);
}

#[test]
fn test_unknown_method() {
    let registry = Registry::new_builtin();
    match registry.build("nonexistent") {
        Err(TexgenError::UnknownMethod(name)) => assert_eq!(name, "nonexistent"),
        other => panic!("expected UnknownMethod, got {other:?}"),
    }
}

#[test]
fn test_parameter_size_mismatch_does_not_mutate() {
    let ctx = Context::new_cpu().unwrap();
    let registry = Registry::new_builtin();
    let mut image = Image::new_cpu(ImageDim::new(4, 4, 1, 1), ElementType::Float32).unwrap();

    let debug = registry.build("debug").unwrap();
    debug
        .compute_typed(&ctx, &mut image, &DebugParams { alpha_value: 0.25 })
        .unwrap();

    let noise = registry.build("gradient_noise").unwrap();
    let err = noise
        .compute_typed(&ctx, &mut image, &WhiteNoiseParams::new(1))
        .unwrap_err();
    assert!(matches!(
        err,
        TexgenError::ParameterSizeMismatch {
            expected: 20,
            actual: 4,
            ..
        }
    ));
    assert_ne!(err.code(), 0);

    let view = image.map_read().unwrap();
    assert!(view.data_f32().unwrap().iter().all(|&v| v == 0.25));
}

#[test]
fn test_backend_mismatch_leaves_objects_usable() {
    let gpu = match Context::new_gpu() {
        Ok(ctx) => ctx,
        Err(_) => return,
    };
    let cpu = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("value_noise").unwrap();
    let params = LatticeParams::new(3).with_scale(4.0);

    let mut cpu_image = Image::new_cpu(ImageDim::new(8, 8, 1, 1), ElementType::Float32).unwrap();
    let mut gpu_image =
        Image::new_gpu_2d(ImageDim::new(8, 8, 1, 1), ElementType::Float32, &gpu).unwrap();

    let err = method
        .compute_typed(&gpu, &mut cpu_image, &params)
        .unwrap_err();
    assert!(matches!(err, TexgenError::BackendMismatch(_)));
    let err = method
        .compute_typed(&cpu, &mut gpu_image, &params)
        .unwrap_err();
    assert!(matches!(err, TexgenError::BackendMismatch(_)));

    method.compute_typed(&cpu, &mut cpu_image, &params).unwrap();
    method.compute_typed(&gpu, &mut gpu_image, &params).unwrap();
    gpu_image.sync().unwrap();
}

#[test]
fn test_lattice_noises_in_range() {
    let ctx = Context::new_cpu().unwrap();
    let registry = Registry::new_builtin();
    for name in ["gradient_noise", "simplex_noise", "value_noise"] {
        let method = registry.build(name).unwrap();
        let mut image = Image::new_cpu(ImageDim::new(32, 32, 2, 2), ElementType::Float32).unwrap();
        method
            .compute_typed(&ctx, &mut image, &LatticeParams::new(11).with_scale(8.0))
            .unwrap();

        let view = image.map_read().unwrap();
        let data = view.data_f32().unwrap();
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)), "{name} out of range");

        let first = data[0];
        assert!(data.iter().any(|&v| v != first), "{name} is constant");
    }
}

#[test]
fn test_channels_are_independent() {
    let ctx = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("value_noise").unwrap();
    let dim = ImageDim::new(16, 16, 1, 2);
    let mut image = Image::new_cpu(dim, ElementType::Float32).unwrap();
    method
        .compute_typed(&ctx, &mut image, &LatticeParams::new(2).with_scale(4.0))
        .unwrap();

    let view = image.map_read().unwrap();
    let data = view.data_f32().unwrap();
    let differs = (0..16).any(|x| data[dim.index(x, 5, 0, 0)] != data[dim.index(x, 5, 0, 1)]);
    assert!(differs);
}

#[test]
fn test_look_at_mode_samples_one_point() {
    let ctx = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build("gradient_noise").unwrap();
    let mut image = Image::new_cpu(ImageDim::new(16, 16, 1, 1), ElementType::Float32).unwrap();
    let params = LatticeParams::new(8)
        .with_scale(4.0)
        .with_stats_mode(StatsMode::LookAt)
        .with_look_at(Vec2::new(0.3, 0.6));
    method.compute_typed(&ctx, &mut image, &params).unwrap();

    // Every texel draws its own realization at the same point.
    let view = image.map_read().unwrap();
    let data = view.data_f32().unwrap();
    let first = data[0];
    assert!(data.iter().any(|&v| v != first));
    assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
}

fn compare_backends(name: &str, params: &[u8], dim: ImageDim, element_type: ElementType) {
    let gpu = match Context::new_gpu() {
        Ok(ctx) => ctx,
        Err(_) => return,
    };
    let cpu = Context::new_cpu().unwrap();
    let method = Registry::new_builtin().build(name).unwrap();

    let mut cpu_image = Image::new_cpu(dim, element_type).unwrap();
    let mut gpu_image = Image::new_gpu_3d(dim, element_type, &gpu).unwrap();
    method.compute(&cpu, &mut cpu_image, params).unwrap();
    method.compute(&gpu, &mut gpu_image, params).unwrap();
    gpu_image.sync().unwrap();

    let cpu_view = cpu_image.map_read().unwrap();
    let gpu_view = gpu_image.map_read().unwrap();
    match element_type {
        ElementType::UInt8 => {
            let exact = name == "white_noise" || name == "debug";
            for (i, (&a, &b)) in cpu_view
                .data_u8()
                .unwrap()
                .iter()
                .zip(gpu_view.data_u8().unwrap())
                .enumerate()
            {
                if exact {
                    assert_eq!(a, b, "{name} element {i}");
                } else {
                    assert!(a.abs_diff(b) <= 1, "{name} element {i}: {a} vs {b}");
                }
            }
        }
        ElementType::Float32 => {
            for (i, (&a, &b)) in cpu_view
                .data_f32()
                .unwrap()
                .iter()
                .zip(gpu_view.data_f32().unwrap())
                .enumerate()
            {
                assert!((a - b).abs() <= 1e-4, "{name} element {i}: {a} vs {b}");
            }
        }
    }
}

#[test]
fn test_backends_agree() {
    let lattice = LatticeParams::new(17).with_scale(5.0);
    let white = WhiteNoiseParams::new(42);
    let debug = DebugParams { alpha_value: 0.5 };

    for element_type in [ElementType::UInt8, ElementType::Float32] {
        for dim in [ImageDim::new(16, 16, 1, 4), ImageDim::new(9, 5, 3, 3)] {
            for name in ["gradient_noise", "simplex_noise", "value_noise"] {
                compare_backends(name, bytemuck::bytes_of(&lattice), dim, element_type);
            }
            compare_backends("white_noise", bytemuck::bytes_of(&white), dim, element_type);
            compare_backends("debug", bytemuck::bytes_of(&debug), dim, element_type);
        }
    }
}
