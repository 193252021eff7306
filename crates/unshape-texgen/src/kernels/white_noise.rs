//! Per-element hashed white noise.

use super::lattice::{element_index, hash, seed_offset, unit_float};
use crate::method::TextureKernel;
use bytemuck::{Pod, Zeroable};
use glam::UVec4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the `white_noise` kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WhiteNoiseParams {
    /// Pseudo-random seed.
    pub global_seed: u32,
}

impl WhiteNoiseParams {
    /// Creates parameters with the given seed.
    pub fn new(global_seed: u32) -> Self {
        Self { global_seed }
    }
}

/// Uncorrelated values in `[0, 1)`, one hash per element.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhiteNoise;

impl TextureKernel for WhiteNoise {
    type Params = WhiteNoiseParams;

    const WGSL: &'static str = r#"
struct Params {
    global_seed: u32,
}

fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32 {
    return unit_float(hash(element_index(texel, dim) + seed_offset(p.global_seed)));
}
"#;

    fn sample(params: &WhiteNoiseParams, texel: UVec4, dim: UVec4) -> f32 {
        unit_float(hash(
            element_index(texel, dim).wrapping_add(seed_offset(params.global_seed)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_noise_range() {
        let dim = UVec4::new(16, 16, 1, 2);
        let params = WhiteNoiseParams::new(3);
        for y in 0..16 {
            for x in 0..16 {
                let v = WhiteNoise::sample(&params, UVec4::new(x, y, 0, 1), dim);
                assert!((0.0..1.0).contains(&v), "white_noise({x}, {y}) = {v}");
            }
        }
    }

    #[test]
    fn test_white_noise_seed_zero_hashes_index() {
        let dim = UVec4::new(4, 4, 1, 1);
        let v = WhiteNoise::sample(&WhiteNoiseParams::default(), UVec4::new(1, 0, 0, 0), dim);
        assert_eq!(v, unit_float(hash(1)));
    }
}
