//! Value noise: hashed lattice values, interpolated with the quintic fade.

use super::lattice::{LatticeParams, fade, lattice_hash, lattice_params_wgsl, lerp, unit_float};
use crate::method::TextureKernel;
use glam::{IVec3, UVec4, Vec3};

/// Value noise in `[0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueNoise;

pub(crate) fn value_noise(seed: u32, p: Vec3) -> f32 {
    let cell = p.floor();
    let i = cell.as_ivec3();
    let u = fade(p - cell);
    let v = |x, y, z| unit_float(lattice_hash(seed, i + IVec3::new(x, y, z)));

    let x00 = lerp(v(0, 0, 0), v(1, 0, 0), u.x);
    let x10 = lerp(v(0, 1, 0), v(1, 1, 0), u.x);
    let x01 = lerp(v(0, 0, 1), v(1, 0, 1), u.x);
    let x11 = lerp(v(0, 1, 1), v(1, 1, 1), u.x);
    let y0 = lerp(x00, x10, u.y);
    let y1 = lerp(x01, x11, u.y);
    lerp(y0, y1, u.z)
}

impl TextureKernel for ValueNoise {
    type Params = LatticeParams;

    const WGSL: &'static str = concat!(
        lattice_params_wgsl!(),
        r#"
fn lattice_value(seed: u32, i: vec3<i32>, x: i32, y: i32, z: i32) -> f32 {
    return unit_float(lattice_hash(seed, i + vec3<i32>(x, y, z)));
}

fn value_noise(seed: u32, p: vec3<f32>) -> f32 {
    let cell = floor(p);
    let i = vec3<i32>(cell);
    let u = fade(p - cell);

    let x00 = lerp(lattice_value(seed, i, 0, 0, 0), lattice_value(seed, i, 1, 0, 0), u.x);
    let x10 = lerp(lattice_value(seed, i, 0, 1, 0), lattice_value(seed, i, 1, 1, 0), u.x);
    let x01 = lerp(lattice_value(seed, i, 0, 0, 1), lattice_value(seed, i, 1, 0, 1), u.x);
    let x11 = lerp(lattice_value(seed, i, 0, 1, 1), lattice_value(seed, i, 1, 1, 1), u.x);
    let y0 = lerp(x00, x10, u.y);
    let y1 = lerp(x01, x11, u.y);
    return lerp(y0, y1, u.z);
}

fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32 {
    let seed = lattice_seed(p.global_seed, p.stats_mode, texel, dim);
    let pos = lattice_position(p.scale, p.stats_mode, vec2<f32>(p.look_at_x, p.look_at_y), texel, dim);
    return clamp(value_noise(seed, pos), 0.0, 1.0);
}
"#
    );

    fn sample(params: &LatticeParams, texel: UVec4, dim: UVec4) -> f32 {
        let seed = params.seed_for(texel, dim);
        value_noise(seed, params.position_for(texel, dim)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_noise_range() {
        for i in 0..200 {
            let p = Vec3::new(i as f32 * 0.137, i as f32 * 0.071, i as f32 * 0.029);
            let v = value_noise(11, p);
            assert!((0.0..=1.0).contains(&v), "value_noise({p}) = {v}");
        }
    }

    #[test]
    fn test_value_noise_hits_lattice_values() {
        let p = Vec3::new(3.0, 5.0, 0.0);
        let expected = unit_float(lattice_hash(4, IVec3::new(3, 5, 0)));
        assert_eq!(value_noise(4, p), expected);
    }

    #[test]
    fn test_value_noise_is_continuous() {
        let a = value_noise(1, Vec3::new(2.4999, 1.2, 0.5));
        let b = value_noise(1, Vec3::new(2.5001, 1.2, 0.5));
        assert!((a - b).abs() < 1e-2);
    }
}
