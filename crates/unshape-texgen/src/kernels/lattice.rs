//! Hashing and lattice helpers shared by the built-in kernels.
//!
//! Every helper here has a WGSL twin in [`PRELUDE_WGSL`]; both sides use the
//! same integer hash and the same operation order so the CPU and GPU paths
//! produce matching samples.

use bytemuck::{Pod, Zeroable};
use glam::{IVec3, UVec4, Vec2, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Odd 32-bit constant used to spread seeds.
const GOLDEN: u32 = 0x9e37_79b9;

/// Integer avalanche hash.
#[inline]
pub(crate) fn hash(mut x: u32) -> u32 {
    x = ((x >> 16) ^ x).wrapping_mul(0x045d_9f3b);
    x = ((x >> 16) ^ x).wrapping_mul(0x045d_9f3b);
    (x >> 16) ^ x
}

/// Maps a hash to `[0, 1)` through the float exponent bits.
#[inline]
pub(crate) fn unit_float(x: u32) -> f32 {
    f32::from_bits(0x3f80_0000 | (x >> 9)) - 1.0
}

#[inline]
pub(crate) fn lattice_hash(seed: u32, cell: IVec3) -> u32 {
    hash(seed ^ hash(cell.x as u32 ^ hash(cell.y as u32 ^ hash(cell.z as u32))))
}

/// Quintic fade curve `6t^5 - 15t^4 + 10t^3`.
#[inline]
pub(crate) fn fade(t: Vec3) -> Vec3 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Gradient dot product for one of 12 cube-edge gradients, selected by `h`.
#[inline]
pub(crate) fn grad3(h: u32, d: Vec3) -> f32 {
    let g = h & 15;
    let u = if g < 8 { d.x } else { d.y };
    let v = if g < 4 {
        d.y
    } else if g == 12 || g == 14 {
        d.x
    } else {
        d.z
    };
    (if g & 1 != 0 { -u } else { u }) + (if g & 2 != 0 { -v } else { v })
}

/// Linear texel index, ignoring the channel.
#[inline]
pub(crate) fn texel_index(texel: UVec4, dim: UVec4) -> u32 {
    texel
        .z
        .wrapping_mul(dim.y)
        .wrapping_add(texel.y)
        .wrapping_mul(dim.x)
        .wrapping_add(texel.x)
}

/// Linear element index, including the channel.
#[inline]
pub(crate) fn element_index(texel: UVec4, dim: UVec4) -> u32 {
    texel_index(texel, dim)
        .wrapping_mul(dim.w)
        .wrapping_add(texel.w)
}

/// Per-seed offset applied to element indices.
#[inline]
pub(crate) fn seed_offset(global_seed: u32) -> u32 {
    global_seed.wrapping_mul(GOLDEN)
}

/// How lattice kernels pick the noise realization at each texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i32)]
pub enum StatsMode {
    /// One realization, sampled at each texel.
    #[default]
    Normal = 0,
    /// An independent realization per texel, sampled at the texel.
    Process = 1,
    /// An independent realization per texel, sampled at the look-at point.
    LookAt = 2,
}

impl StatsMode {
    /// Decodes a raw mode. Unknown values behave as [`StatsMode::Normal`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => StatsMode::Process,
            2 => StatsMode::LookAt,
            _ => StatsMode::Normal,
        }
    }
}

/// Parameters of the lattice noise kernels (`gradient_noise`,
/// `simplex_noise`, `value_noise`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatticeParams {
    /// Pseudo-random seed.
    pub global_seed: u32,
    /// Lattice cell size in pixels.
    pub scale: f32,
    /// Raw [`StatsMode`].
    pub stats_mode: i32,
    /// Look-at point in `[0, 1]^2`, used by [`StatsMode::LookAt`].
    pub stats_look_at: Vec2,
}

impl Default for LatticeParams {
    fn default() -> Self {
        Self {
            global_seed: 0,
            scale: 32.0,
            stats_mode: StatsMode::Normal as i32,
            stats_look_at: Vec2::ZERO,
        }
    }
}

impl LatticeParams {
    /// Creates parameters with the given seed and default scale.
    pub fn new(global_seed: u32) -> Self {
        Self {
            global_seed,
            ..Default::default()
        }
    }

    /// Sets the lattice cell size in pixels.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the stats mode.
    pub fn with_stats_mode(mut self, mode: StatsMode) -> Self {
        self.stats_mode = mode as i32;
        self
    }

    /// Sets the look-at point.
    pub fn with_look_at(mut self, look_at: Vec2) -> Self {
        self.stats_look_at = look_at;
        self
    }

    /// Seed of the realization sampled at `texel`.
    pub(crate) fn seed_for(&self, texel: UVec4, dim: UVec4) -> u32 {
        let seed = hash(self.global_seed.wrapping_add(texel.w.wrapping_mul(GOLDEN)));
        match StatsMode::from_raw(self.stats_mode) {
            StatsMode::Normal => seed,
            StatsMode::Process | StatsMode::LookAt => hash(seed ^ hash(texel_index(texel, dim))),
        }
    }

    /// Lattice-space position sampled at `texel`.
    pub(crate) fn position_for(&self, texel: UVec4, dim: UVec4) -> Vec3 {
        let p = match StatsMode::from_raw(self.stats_mode) {
            StatsMode::LookAt => Vec3::new(
                self.stats_look_at.x * dim.x as f32,
                self.stats_look_at.y * dim.y as f32,
                texel.z as f32 + 0.5,
            ),
            StatsMode::Normal | StatsMode::Process => texel.truncate().as_vec3() + 0.5,
        };
        p / self.scale
    }
}

/// Declares the WGSL `Params` struct matching [`LatticeParams`].
macro_rules! lattice_params_wgsl {
    () => {
        r#"
struct Params {
    global_seed: u32,
    scale: f32,
    stats_mode: i32,
    look_at_x: f32,
    look_at_y: f32,
}
"#
    };
}
pub(crate) use lattice_params_wgsl;

/// WGSL helpers available to every kernel.
pub(crate) const PRELUDE_WGSL: &str = r#"
fn hash(v: u32) -> u32 {
    var x = ((v >> 16u) ^ v) * 0x45d9f3bu;
    x = ((x >> 16u) ^ x) * 0x45d9f3bu;
    return (x >> 16u) ^ x;
}

fn unit_float(x: u32) -> f32 {
    return bitcast<f32>(0x3f800000u | (x >> 9u)) - 1.0;
}

fn lattice_hash(seed: u32, cell: vec3<i32>) -> u32 {
    return hash(seed ^ hash(bitcast<u32>(cell.x) ^ hash(bitcast<u32>(cell.y) ^ hash(bitcast<u32>(cell.z)))));
}

fn fade(t: vec3<f32>) -> vec3<f32> {
    return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    return a + (b - a) * t;
}

fn grad3(h: u32, d: vec3<f32>) -> f32 {
    let g = h & 15u;
    let u = select(d.y, d.x, g < 8u);
    let v = select(select(d.z, d.x, g == 12u || g == 14u), d.y, g < 4u);
    return select(u, -u, (g & 1u) != 0u) + select(v, -v, (g & 2u) != 0u);
}

fn texel_index(texel: vec4<u32>, dim: vec4<u32>) -> u32 {
    return (texel.z * dim.y + texel.y) * dim.x + texel.x;
}

fn element_index(texel: vec4<u32>, dim: vec4<u32>) -> u32 {
    return texel_index(texel, dim) * dim.w + texel.w;
}

fn seed_offset(global_seed: u32) -> u32 {
    return global_seed * 0x9e3779b9u;
}

fn lattice_seed(global_seed: u32, stats_mode: i32, texel: vec4<u32>, dim: vec4<u32>) -> u32 {
    let seed = hash(global_seed + texel.w * 0x9e3779b9u);
    if (stats_mode == 1 || stats_mode == 2) {
        return hash(seed ^ hash(texel_index(texel, dim)));
    }
    return seed;
}

fn lattice_position(scale: f32, stats_mode: i32, look_at: vec2<f32>, texel: vec4<u32>, dim: vec4<u32>) -> vec3<f32> {
    if (stats_mode == 2) {
        return vec3<f32>(look_at.x * f32(dim.x), look_at.y * f32(dim.y), f32(texel.z) + 0.5) / scale;
    }
    return (vec3<f32>(texel.xyz) + 0.5) / scale;
}
"#;
