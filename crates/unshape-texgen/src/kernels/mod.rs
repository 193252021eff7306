//! Built-in texture kernels.
//!
//! | Name | Kernel | Parameters |
//! |------|--------|------------|
//! | `gradient_noise` | [`GradientNoise`] | [`LatticeParams`] |
//! | `simplex_noise` | [`SimplexNoise`] | [`LatticeParams`] |
//! | `value_noise` | [`ValueNoise`] | [`LatticeParams`] |
//! | `white_noise` | [`WhiteNoise`] | [`WhiteNoiseParams`] |
//! | `debug` | [`DebugFill`] | [`DebugParams`] |

mod debug;
mod gradient_noise;
pub(crate) mod lattice;
mod simplex_noise;
mod value_noise;
mod white_noise;

pub use debug::{DebugFill, DebugParams};
pub use gradient_noise::GradientNoise;
pub use lattice::{LatticeParams, StatsMode};
pub use simplex_noise::SimplexNoise;
pub use value_noise::ValueNoise;
pub use white_noise::{WhiteNoise, WhiteNoiseParams};

use crate::registry::Registry;

/// Registers every built-in kernel under its stable name.
pub(crate) fn register_builtin(registry: &mut Registry) {
    registry.register_kernel::<GradientNoise>("gradient_noise");
    registry.register_kernel::<SimplexNoise>("simplex_noise");
    registry.register_kernel::<ValueNoise>("value_noise");
    registry.register_kernel::<WhiteNoise>("white_noise");
    registry.register_kernel::<DebugFill>("debug");
}
