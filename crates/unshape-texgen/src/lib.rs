//! Procedural texture generation on CPU and GPU backends.
//!
//! The same method runs on either backend:
//!
//! - [`Context`]: an execution backend, either a rayon thread pool or a wgpu device
//! - [`Image`]: a typed element buffer bound to one backend, with mapped views
//! - [`Registry`] / [`Method`]: named kernels resolved at runtime
//!
//! # Example
//!
//! ```ignore
//! use unshape_texgen::{Context, ElementType, Image, ImageDim, LatticeParams, Registry};
//!
//! let registry = Registry::new_builtin();
//! let method = registry.build("gradient_noise")?;
//!
//! let ctx = Context::new_gpu()?;
//! let mut image = Image::new_gpu_2d(ImageDim::new(256, 256, 1, 1), ElementType::Float32, &ctx)?;
//! method.compute_typed(&ctx, &mut image, &LatticeParams::new(7).with_scale(16.0))?;
//!
//! image.sync()?;
//! let view = image.map_read()?;
//! let pixels: &[f32] = view.data_f32()?;
//! ```

mod context;
mod error;
mod gpu;
mod image;
mod kernels;
mod map;
mod method;
mod registry;

pub use context::{Backend, Context, ContextOptions, CpuContext, GpuContext};
pub use error::{TexgenError, TexgenResult};
pub use image::{ElementType, Image, ImageDim, ImageLayout};
pub use kernels::{
    DebugFill, DebugParams, GradientNoise, LatticeParams, SimplexNoise, StatsMode, ValueNoise,
    WhiteNoise, WhiteNoiseParams,
};
pub use map::{MappedImageRead, MappedImageWrite};
pub use method::{CpuKernel, GpuKernel, Method, TextureKernel};
pub use registry::{MethodConstructor, Registry};

pub use glam::Vec2;
