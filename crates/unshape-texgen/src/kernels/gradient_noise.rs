//! Gradient (Perlin) noise over hashed cube-edge gradients.

use super::lattice::{LatticeParams, fade, grad3, lattice_hash, lattice_params_wgsl, lerp};
use crate::method::TextureKernel;
use glam::{IVec3, UVec4, Vec3};

/// Gradient noise remapped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradientNoise;

/// Raw gradient noise, roughly in `[-1, 1]`.
pub(crate) fn gradient_noise(seed: u32, p: Vec3) -> f32 {
    let cell = p.floor();
    let i = cell.as_ivec3();
    let f = p - cell;
    let u = fade(f);
    let g = |x: i32, y: i32, z: i32| {
        let offset = IVec3::new(x, y, z);
        grad3(lattice_hash(seed, i + offset), f - offset.as_vec3())
    };

    let x00 = lerp(g(0, 0, 0), g(1, 0, 0), u.x);
    let x10 = lerp(g(0, 1, 0), g(1, 1, 0), u.x);
    let x01 = lerp(g(0, 0, 1), g(1, 0, 1), u.x);
    let x11 = lerp(g(0, 1, 1), g(1, 1, 1), u.x);
    let y0 = lerp(x00, x10, u.y);
    let y1 = lerp(x01, x11, u.y);
    lerp(y0, y1, u.z)
}

impl TextureKernel for GradientNoise {
    type Params = LatticeParams;

    const WGSL: &'static str = concat!(
        lattice_params_wgsl!(),
        r#"
fn lattice_grad(seed: u32, i: vec3<i32>, f: vec3<f32>, x: i32, y: i32, z: i32) -> f32 {
    let offset = vec3<i32>(x, y, z);
    return grad3(lattice_hash(seed, i + offset), f - vec3<f32>(offset));
}

fn gradient_noise(seed: u32, p: vec3<f32>) -> f32 {
    let cell = floor(p);
    let i = vec3<i32>(cell);
    let f = p - cell;
    let u = fade(f);

    let x00 = lerp(lattice_grad(seed, i, f, 0, 0, 0), lattice_grad(seed, i, f, 1, 0, 0), u.x);
    let x10 = lerp(lattice_grad(seed, i, f, 0, 1, 0), lattice_grad(seed, i, f, 1, 1, 0), u.x);
    let x01 = lerp(lattice_grad(seed, i, f, 0, 0, 1), lattice_grad(seed, i, f, 1, 0, 1), u.x);
    let x11 = lerp(lattice_grad(seed, i, f, 0, 1, 1), lattice_grad(seed, i, f, 1, 1, 1), u.x);
    let y0 = lerp(x00, x10, u.y);
    let y1 = lerp(x01, x11, u.y);
    return lerp(y0, y1, u.z);
}

fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32 {
    let seed = lattice_seed(p.global_seed, p.stats_mode, texel, dim);
    let pos = lattice_position(p.scale, p.stats_mode, vec2<f32>(p.look_at_x, p.look_at_y), texel, dim);
    return clamp(0.5 + 0.5 * gradient_noise(seed, pos), 0.0, 1.0);
}
"#
    );

    fn sample(params: &LatticeParams, texel: UVec4, dim: UVec4) -> f32 {
        let seed = params.seed_for(texel, dim);
        (0.5 + 0.5 * gradient_noise(seed, params.position_for(texel, dim))).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_noise_zero_at_lattice_points() {
        for (x, y, z) in [(0.0, 0.0, 0.0), (3.0, 7.0, 1.0), (12.0, 2.0, 5.0)] {
            assert_eq!(gradient_noise(17, Vec3::new(x, y, z)), 0.0);
        }
    }

    #[test]
    fn test_gradient_noise_range() {
        for i in 0..500 {
            let p = Vec3::new(i as f32 * 0.173, i as f32 * 0.117, i as f32 * 0.061);
            let n = gradient_noise(5, p);
            assert!((-1.5..=1.5).contains(&n), "gradient_noise({p}) = {n}");
        }
    }

    #[test]
    fn test_sample_is_seed_dependent() {
        let dim = UVec4::new(64, 64, 1, 1);
        let texel = UVec4::new(13, 29, 0, 0);
        let a = GradientNoise::sample(&LatticeParams::new(1).with_scale(8.0), texel, dim);
        let b = GradientNoise::sample(&LatticeParams::new(2).with_scale(8.0), texel, dim);
        assert!((0.0..=1.0).contains(&a));
        assert_ne!(a, b);
    }
}
