//! 3-D simplex noise.

use super::lattice::{LatticeParams, grad3, lattice_hash, lattice_params_wgsl};
use crate::method::TextureKernel;
use glam::{IVec3, UVec4, Vec3};

const F3: f32 = 1.0 / 3.0;
const G3: f32 = 1.0 / 6.0;

/// Simplex noise remapped to `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexNoise;

fn corner(seed: u32, cell: IVec3, d: Vec3) -> f32 {
    let t = 0.6 - d.dot(d);
    if t < 0.0 {
        0.0
    } else {
        let t = t * t;
        t * t * grad3(lattice_hash(seed, cell), d)
    }
}

/// Offsets of the second and third simplex corners.
fn simplex_offsets(d: Vec3) -> (IVec3, IVec3) {
    if d.x >= d.y {
        if d.y >= d.z {
            (IVec3::new(1, 0, 0), IVec3::new(1, 1, 0))
        } else if d.x >= d.z {
            (IVec3::new(1, 0, 0), IVec3::new(1, 0, 1))
        } else {
            (IVec3::new(0, 0, 1), IVec3::new(1, 0, 1))
        }
    } else if d.y < d.z {
        (IVec3::new(0, 0, 1), IVec3::new(0, 1, 1))
    } else if d.x < d.z {
        (IVec3::new(0, 1, 0), IVec3::new(0, 1, 1))
    } else {
        (IVec3::new(0, 1, 0), IVec3::new(1, 1, 0))
    }
}

/// Simplex noise in `[0, 1]`.
pub(crate) fn simplex_noise(seed: u32, p: Vec3) -> f32 {
    let s = (p.x + p.y + p.z) * F3;
    let cell = (p + s).floor();
    let t = (cell.x + cell.y + cell.z) * G3;
    let d0 = p - (cell - t);
    let (o1, o2) = simplex_offsets(d0);

    let d1 = d0 - o1.as_vec3() + G3;
    let d2 = d0 - o2.as_vec3() + 2.0 * G3;
    let d3 = d0 - 1.0 + 3.0 * G3;

    let i = cell.as_ivec3();
    let n = corner(seed, i, d0)
        + corner(seed, i + o1, d1)
        + corner(seed, i + o2, d2)
        + corner(seed, i + IVec3::ONE, d3);

    (32.0 * n * 0.5 + 0.5).clamp(0.0, 1.0)
}

impl TextureKernel for SimplexNoise {
    type Params = LatticeParams;

    const WGSL: &'static str = concat!(
        lattice_params_wgsl!(),
        r#"
fn simplex_corner(seed: u32, cell: vec3<i32>, d: vec3<f32>) -> f32 {
    let t = 0.6 - dot(d, d);
    if (t < 0.0) {
        return 0.0;
    }
    let t2 = t * t;
    return t2 * t2 * grad3(lattice_hash(seed, cell), d);
}

fn simplex_noise(seed: u32, p: vec3<f32>) -> f32 {
    let f3 = 1.0 / 3.0;
    let g3 = 1.0 / 6.0;
    let s = (p.x + p.y + p.z) * f3;
    let cell = floor(p + s);
    let t = (cell.x + cell.y + cell.z) * g3;
    let d0 = p - (cell - t);

    var o1 = vec3<i32>(0, 1, 0);
    var o2 = vec3<i32>(1, 1, 0);
    if (d0.x >= d0.y) {
        if (d0.y >= d0.z) {
            o1 = vec3<i32>(1, 0, 0);
            o2 = vec3<i32>(1, 1, 0);
        } else if (d0.x >= d0.z) {
            o1 = vec3<i32>(1, 0, 0);
            o2 = vec3<i32>(1, 0, 1);
        } else {
            o1 = vec3<i32>(0, 0, 1);
            o2 = vec3<i32>(1, 0, 1);
        }
    } else if (d0.y < d0.z) {
        o1 = vec3<i32>(0, 0, 1);
        o2 = vec3<i32>(0, 1, 1);
    } else if (d0.x < d0.z) {
        o1 = vec3<i32>(0, 1, 0);
        o2 = vec3<i32>(0, 1, 1);
    }

    let d1 = d0 - vec3<f32>(o1) + g3;
    let d2 = d0 - vec3<f32>(o2) + 2.0 * g3;
    let d3 = d0 - 1.0 + 3.0 * g3;

    let i = vec3<i32>(cell);
    let n = simplex_corner(seed, i, d0)
        + simplex_corner(seed, i + o1, d1)
        + simplex_corner(seed, i + o2, d2)
        + simplex_corner(seed, i + vec3<i32>(1, 1, 1), d3);

    return clamp(32.0 * n * 0.5 + 0.5, 0.0, 1.0);
}

fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32 {
    let seed = lattice_seed(p.global_seed, p.stats_mode, texel, dim);
    let pos = lattice_position(p.scale, p.stats_mode, vec2<f32>(p.look_at_x, p.look_at_y), texel, dim);
    return simplex_noise(seed, pos);
}
"#
    );

    fn sample(params: &LatticeParams, texel: UVec4, dim: UVec4) -> f32 {
        let seed = params.seed_for(texel, dim);
        simplex_noise(seed, params.position_for(texel, dim))
    }
}
