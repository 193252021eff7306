//! Image allocation, mapping and sync on both backends.

use unshape_texgen::{
    Backend, Context, ElementType, Image, ImageDim, ImageLayout, Registry, TexgenError,
    WhiteNoiseParams,
};

const DIMS: [ImageDim; 4] = [
    ImageDim {
        width: 7,
        height: 1,
        depth: 1,
        channels: 1,
    },
    ImageDim {
        width: 5,
        height: 3,
        depth: 1,
        channels: 2,
    },
    ImageDim {
        width: 4,
        height: 4,
        depth: 1,
        channels: 4,
    },
    ImageDim {
        width: 3,
        height: 2,
        depth: 3,
        channels: 3,
    },
];

const TYPES: [ElementType; 2] = [ElementType::UInt8, ElementType::Float32];

fn gpu_context() -> Option<Context> {
    Context::new_gpu().ok()
}

fn new_gpu_image(dim: ImageDim, element_type: ElementType, ctx: &Context) -> Image {
    match ImageLayout::of(&dim) {
        ImageLayout::D1 => Image::new_gpu_1d(dim, element_type, ctx),
        ImageLayout::D2 => Image::new_gpu_2d(dim, element_type, ctx),
        ImageLayout::D3 => Image::new_gpu_3d(dim, element_type, ctx),
    }
    .unwrap()
}

fn assert_zeroed(image: &Image) {
    let view = image.map_read().unwrap();
    match image.element_type() {
        ElementType::UInt8 => {
            let data = view.data_u8().unwrap();
            assert_eq!(data.len(), image.dim().element_count());
            assert!(data.iter().all(|&v| v == 0));
        }
        ElementType::Float32 => {
            let data = view.data_f32().unwrap();
            assert_eq!(data.len(), image.dim().element_count());
            assert!(data.iter().all(|&v| v == 0.0));
        }
    }
}

/// Writes a distinct value into every element, then reads it back.
fn assert_round_trip(image: &mut Image) {
    {
        let mut view = image.map_write().unwrap();
        match view.element_type() {
            ElementType::UInt8 => {
                for (i, v) in view.data_u8_mut().unwrap().iter_mut().enumerate() {
                    *v = (i * 7 + 1) as u8;
                }
            }
            ElementType::Float32 => {
                for (i, v) in view.data_f32_mut().unwrap().iter_mut().enumerate() {
                    *v = i as f32 * 0.5 - 3.0;
                }
            }
        }
        view.unmap().unwrap();
    }

    image.sync().unwrap();

    let view = image.map_read().unwrap();
    match image.element_type() {
        ElementType::UInt8 => {
            for (i, &v) in view.data_u8().unwrap().iter().enumerate() {
                assert_eq!(v, (i * 7 + 1) as u8);
            }
        }
        ElementType::Float32 => {
            for (i, &v) in view.data_f32().unwrap().iter().enumerate() {
                assert_eq!(v, i as f32 * 0.5 - 3.0);
            }
        }
    }
}

#[test]
fn test_cpu_images_start_zeroed() {
    for dim in DIMS {
        for element_type in TYPES {
            let image = Image::new_cpu(dim, element_type).unwrap();
            assert_eq!(image.backend(), Backend::Cpu);
            assert_eq!(image.dim(), dim);
            assert_eq!(image.element_type(), element_type);
            assert_zeroed(&image);
        }
    }
}

#[test]
fn test_gpu_images_start_zeroed() {
    let Some(ctx) = gpu_context() else {
        return;
    };
    for dim in DIMS {
        for element_type in TYPES {
            let mut image = new_gpu_image(dim, element_type, &ctx);
            assert_eq!(image.backend(), Backend::Gpu);
            image.sync().unwrap();
            assert_zeroed(&image);
        }
    }
}

#[test]
fn test_cpu_round_trip() {
    for dim in DIMS {
        for element_type in TYPES {
            let mut image = Image::new_cpu(dim, element_type).unwrap();
            assert_round_trip(&mut image);
        }
    }
}

#[test]
fn test_gpu_round_trip() {
    let Some(ctx) = gpu_context() else {
        return;
    };
    for dim in DIMS {
        for element_type in TYPES {
            let mut image = new_gpu_image(dim, element_type, &ctx);
            assert_round_trip(&mut image);
        }
    }
}

#[test]
fn test_gpu_layout_must_fit_dim() {
    let Some(ctx) = gpu_context() else {
        return;
    };
    let dim = ImageDim::new(4, 4, 1, 1);
    assert!(matches!(
        Image::new_gpu_1d(dim, ElementType::UInt8, &ctx),
        Err(TexgenError::InvalidDimensions(_))
    ));
    let image = Image::new_gpu_3d(dim, ElementType::UInt8, &ctx).unwrap();
    assert_eq!(image.layout(), ImageLayout::D3);
}

#[test]
fn test_gpu_sync_is_idempotent() {
    let Some(ctx) = gpu_context() else {
        return;
    };
    let method = Registry::new_builtin().build("white_noise").unwrap();
    let mut image = Image::new_gpu_2d(ImageDim::new(8, 8, 1, 1), ElementType::Float32, &ctx).unwrap();
    method
        .compute_typed(&ctx, &mut image, &WhiteNoiseParams::new(5))
        .unwrap();

    image.sync().unwrap();
    let first = image.map_read().unwrap().data_f32().unwrap().to_vec();
    image.sync().unwrap();
    let second = image.map_read().unwrap().data_f32().unwrap().to_vec();

    assert_eq!(first, second);
    assert!(first.iter().any(|&v| v != 0.0));
}

#[test]
fn test_sync_refused_while_mapped() {
    let mut image = Image::new_cpu(ImageDim::new(2, 2, 1, 1), ElementType::UInt8).unwrap();
    std::mem::forget(image.map_read().unwrap());
    assert!(matches!(image.sync(), Err(TexgenError::AlreadyMapped)));
}

#[test]
fn test_read_views_block_writers() {
    let image = Image::new_cpu(ImageDim::new(2, 2, 1, 1), ElementType::UInt8).unwrap();
    let reader = image.map_read().unwrap();
    assert!(image.is_mapped());
    assert_eq!(reader.image().dim(), ImageDim::new(2, 2, 1, 1));
    drop(reader);
    assert!(!image.is_mapped());
}

#[test]
fn test_gpu_write_view_keeps_synced_results() {
    let Some(ctx) = gpu_context() else {
        return;
    };
    let method = Registry::new_builtin().build("white_noise").unwrap();
    let dim = ImageDim::new(4, 4, 1, 1);
    let params = WhiteNoiseParams::new(9);

    let mut synced = Image::new_gpu_2d(dim, ElementType::Float32, &ctx).unwrap();
    method.compute_typed(&ctx, &mut synced, &params).unwrap();
    synced.sync().unwrap();
    let noise = synced.map_read().unwrap().data_f32().unwrap().to_vec();
    {
        let mut view = synced.map_write().unwrap();
        view.data_f32_mut().unwrap()[0] = 2.0;
    }
    synced.sync().unwrap();
    let after = synced.map_read().unwrap().data_f32().unwrap().to_vec();
    assert_eq!(after[0], 2.0);
    assert_eq!(after[1..], noise[1..]);

    // Without a sync the write view starts from the stale mirror, and
    // releasing it replaces the compute results.
    let mut unsynced = Image::new_gpu_2d(dim, ElementType::Float32, &ctx).unwrap();
    method.compute_typed(&ctx, &mut unsynced, &params).unwrap();
    drop(unsynced.map_write().unwrap());
    unsynced.sync().unwrap();
    assert!(unsynced.map_read().unwrap().data_f32().unwrap().iter().all(|&v| v == 0.0));
}
