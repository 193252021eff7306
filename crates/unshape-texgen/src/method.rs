//! Methods: named, parameterized compute units.
//!
//! A [`Method`] pairs a [`CpuKernel`] and a [`GpuKernel`] with the size of
//! the parameter record they decode. [`Method::compute`] validates its
//! inputs once and then runs the kernel matching the context's backend.
//!
//! Most kernels are written once as a [`TextureKernel`], a per-element
//! sample function with a WGSL twin, and wrapped into both backends by
//! [`Method::from_kernel`].

use crate::context::{Context, CpuContext, GpuContext};
use crate::error::{TexgenError, TexgenResult};
use crate::gpu::{PipelineCache, shader_source, to_unorm8};
use crate::image::{HostData, Image};
use bytemuck::Pod;
use glam::UVec4;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;
use std::marker::PhantomData;

/// A per-element texture generator.
///
/// `sample` must agree with the WGSL function
/// `fn sample_texel(p: Params, texel: vec4<u32>, dim: vec4<u32>) -> f32`
/// declared in [`TextureKernel::WGSL`], together with a `struct Params`
/// matching [`TextureKernel::Params`] and holding at least one member.
/// `texel` is `(x, y, z, channel)` and `dim` is
/// `(width, height, depth, channels)`.
pub trait TextureKernel: Send + Sync + 'static {
    /// Plain-data parameter record.
    type Params: Pod + Default + Send + Sync;

    /// WGSL declaring `Params` and `sample_texel`.
    const WGSL: &'static str;

    /// Value of one element. `UInt8` images store `clamp(v * 255, 0, 255)`.
    fn sample(params: &Self::Params, texel: UVec4, dim: UVec4) -> f32;
}

/// CPU implementation of a method.
///
/// `params` has already been checked against the method's record size, and
/// `image` is an unmapped CPU image.
pub trait CpuKernel: Send + Sync {
    fn run(&self, ctx: &CpuContext, params: &[u8], image: &mut Image) -> TexgenResult<()>;
}

/// GPU implementation of a method.
///
/// `params` has already been checked against the method's record size, and
/// `image` is an unmapped GPU image on `ctx`'s device. Implementations
/// should mark the image dirty once work is submitted.
pub trait GpuKernel: Send + Sync {
    fn run(&self, ctx: &GpuContext, params: &[u8], image: &mut Image) -> TexgenResult<()>;
}

struct CpuTexture<K>(PhantomData<fn() -> K>);

impl<K: TextureKernel> CpuKernel for CpuTexture<K> {
    fn run(&self, ctx: &CpuContext, params: &[u8], image: &mut Image) -> TexgenResult<()> {
        let params: K::Params = bytemuck::pod_read_unaligned(params);
        let dim = image.dim();
        let extent = dim.as_uvec4();
        let params = &params;

        ctx.install(|| match image.host_mut() {
            HostData::UInt8(data) => data.par_iter_mut().enumerate().for_each(|(i, out)| {
                *out = to_unorm8(K::sample(params, dim.texel_of(i), extent));
            }),
            HostData::Float32(data) => data.par_iter_mut().enumerate().for_each(|(i, out)| {
                *out = K::sample(params, dim.texel_of(i), extent);
            }),
        });
        Ok(())
    }
}

struct GpuTexture<K> {
    pipelines: Mutex<PipelineCache>,
    _kernel: PhantomData<fn() -> K>,
}

impl<K: TextureKernel> GpuKernel for GpuTexture<K> {
    fn run(&self, ctx: &GpuContext, params: &[u8], image: &mut Image) -> TexgenResult<()> {
        let device = ctx.shared();
        let pipeline = self.pipelines.lock().get_or_compile(
            device,
            std::any::type_name::<K>(),
            || shader_source(K::WGSL),
        )?;

        let storage = image
            .device_storage()
            .ok_or_else(|| TexgenError::backend_mismatch("image has no device storage"))?;
        pipeline.dispatch(device, storage, &image.dim(), image.element_type(), params);
        image.mark_device_dirty();
        Ok(())
    }
}

/// A resolved compute unit.
///
/// Methods hold no context. GPU pipelines are compiled on the first GPU
/// compute and cached per device, so one method can serve several contexts.
pub struct Method {
    name: String,
    params_size: usize,
    cpu: Box<dyn CpuKernel>,
    gpu: Box<dyn GpuKernel>,
}

impl Method {
    /// Creates a method from explicit backend implementations.
    pub fn new(
        name: impl Into<String>,
        params_size: usize,
        cpu: Box<dyn CpuKernel>,
        gpu: Box<dyn GpuKernel>,
    ) -> Self {
        Self {
            name: name.into(),
            params_size,
            cpu,
            gpu,
        }
    }

    /// Creates a method running `K` on both backends.
    pub fn from_kernel<K: TextureKernel>(name: impl Into<String>) -> Self {
        Self::new(
            name,
            std::mem::size_of::<K::Params>(),
            Box::new(CpuTexture::<K>(PhantomData)),
            Box::new(GpuTexture::<K> {
                pipelines: Mutex::new(PipelineCache::default()),
                _kernel: PhantomData,
            }),
        )
    }

    /// Returns the registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the size of the parameter record in bytes.
    pub fn params_size(&self) -> usize {
        self.params_size
    }

    /// Runs the method over every element of `image`.
    ///
    /// Fails without touching the image when:
    /// - the image belongs to another backend or device ([`TexgenError::BackendMismatch`]),
    /// - `params` is not exactly [`Method::params_size`] bytes
    ///   ([`TexgenError::ParameterSizeMismatch`]),
    /// - the image has an open view ([`TexgenError::AlreadyMapped`]).
    ///
    /// CPU results are in place when this returns. GPU results become
    /// visible after [`Image::sync`].
    pub fn compute(&self, ctx: &Context, image: &mut Image, params: &[u8]) -> TexgenResult<()> {
        match (ctx, image.device_storage()) {
            (Context::Cpu(_), None) => {}
            (Context::Gpu(gpu), Some(storage)) => {
                if !gpu.owns(&storage.device) {
                    return Err(TexgenError::backend_mismatch(
                        "image was allocated on another GPU device",
                    ));
                }
            }
            _ => {
                return Err(TexgenError::backend_mismatch(format!(
                    "context is {}, image is {}",
                    ctx.backend(),
                    image.backend()
                )));
            }
        }

        if params.len() != self.params_size {
            return Err(TexgenError::ParameterSizeMismatch {
                method: self.name.clone(),
                expected: self.params_size,
                actual: params.len(),
            });
        }

        if image.is_mapped() {
            return Err(TexgenError::AlreadyMapped);
        }

        tracing::debug!(
            method = %self.name,
            backend = %ctx.backend(),
            dim = %image.dim(),
            element_type = %image.element_type(),
            "dispatching compute"
        );

        match ctx {
            Context::Cpu(cpu) => self.cpu.run(cpu, params, image),
            Context::Gpu(gpu) => self.gpu.run(gpu, params, image),
        }
    }

    /// Runs the method with a typed parameter record.
    pub fn compute_typed<P: Pod>(
        &self,
        ctx: &Context,
        image: &mut Image,
        params: &P,
    ) -> TexgenResult<()> {
        self.compute(ctx, image, bytemuck::bytes_of(params))
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("params_size", &self.params_size)
            .finish_non_exhaustive()
    }
}
