//! Constant fill kernel.

use crate::method::TextureKernel;
use bytemuck::{Pod, Zeroable};
use glam::UVec4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of the `debug` kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugParams {
    /// Value written into every element.
    pub alpha_value: f32,
}

impl Default for DebugParams {
    fn default() -> Self {
        Self { alpha_value: 1.0 }
    }
}

/// Writes `alpha_value` into every element, independent of position.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFill;

impl TextureKernel for DebugFill {
    type Params = DebugParams;

    const WGSL: &'static str = r#"
struct Params {
    alpha_value: f32,
}

fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32 {
    return p.alpha_value;
}
"#;

    fn sample(params: &DebugParams, _texel: UVec4, _dim: UVec4) -> f32 {
        params.alpha_value
    }
}
