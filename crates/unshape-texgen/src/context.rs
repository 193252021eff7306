//! Execution backends.
//!
//! A [`Context`] is either a CPU context, which owns a rayon thread pool, or
//! a GPU context, which owns a wgpu device and queue. The backend is chosen
//! once, when the context is created, and every image and method dispatch
//! branches on [`Context::backend`] afterwards.

use crate::error::{TexgenError, TexgenResult};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Backend tag of a [`Context`] or [`Image`](crate::Image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum Backend {
    /// Host memory, rayon execution.
    Cpu = 0,
    /// Device memory, wgpu compute execution.
    Gpu = 1,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => f.write_str("cpu"),
            Backend::Gpu => f.write_str("gpu"),
        }
    }
}

/// Options used when creating a [`Context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Worker threads for the CPU pool. `None` uses rayon's default.
    pub cpu_threads: Option<usize>,
    /// Adapter preference for GPU contexts.
    pub power_preference: wgpu::PowerPreference,
    /// Only accept a software fallback adapter.
    pub force_fallback_adapter: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            cpu_threads: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

impl ContextOptions {
    /// Sets the number of CPU worker threads.
    pub fn with_cpu_threads(mut self, threads: usize) -> Self {
        self.cpu_threads = Some(threads);
        self
    }

    /// Sets the GPU adapter power preference.
    pub fn with_power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }

    /// Requests a software fallback adapter.
    pub fn with_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }
}

/// An execution backend.
pub enum Context {
    /// CPU backend.
    Cpu(CpuContext),
    /// GPU backend.
    Gpu(GpuContext),
}

impl Context {
    /// Creates a CPU context with default options.
    pub fn new_cpu() -> TexgenResult<Self> {
        Self::new_cpu_with(&ContextOptions::default())
    }

    /// Creates a CPU context.
    pub fn new_cpu_with(options: &ContextOptions) -> TexgenResult<Self> {
        CpuContext::new(options).map(Context::Cpu)
    }

    /// Creates a GPU context with default options.
    ///
    /// Fails with [`TexgenError::BackendUnavailable`] when no adapter or
    /// device can be acquired.
    pub fn new_gpu() -> TexgenResult<Self> {
        Self::new_gpu_with(&ContextOptions::default())
    }

    /// Creates a GPU context.
    pub fn new_gpu_with(options: &ContextOptions) -> TexgenResult<Self> {
        GpuContext::new(options).map(Context::Gpu)
    }

    /// Returns the backend tag.
    pub fn backend(&self) -> Backend {
        match self {
            Context::Cpu(_) => Backend::Cpu,
            Context::Gpu(_) => Backend::Gpu,
        }
    }

    /// Returns a human-readable description of the execution resources.
    pub fn device_info(&self) -> String {
        match self {
            Context::Cpu(cpu) => format!("cpu ({} threads)", cpu.num_threads()),
            Context::Gpu(gpu) => gpu.device_info(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.backend())
            .field("device", &self.device_info())
            .finish()
    }
}

/// CPU execution resources.
pub struct CpuContext {
    pool: rayon::ThreadPool,
}

impl CpuContext {
    /// Creates a CPU context with its own thread pool.
    pub fn new(options: &ContextOptions) -> TexgenResult<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("unshape-texgen-{i}"));
        if let Some(threads) = options.cpu_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build().map_err(|e| {
            TexgenError::BackendUnavailable(format!("failed to build CPU thread pool: {e}"))
        })?;

        tracing::info!(threads = pool.current_num_threads(), "created CPU context");
        Ok(Self { pool })
    }

    /// Returns the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the context's thread pool.
    pub(crate) fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Device and queue shared between a GPU context and the images allocated
/// on it.
pub(crate) struct GpuDevice {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
}

/// GPU execution resources.
///
/// Images allocated through a GPU context keep the device alive and can only
/// be computed through a context that shares the same device.
pub struct GpuContext {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    shared: Arc<GpuDevice>,
}

impl GpuContext {
    /// Creates a GPU context.
    pub fn new(options: &ContextOptions) -> TexgenResult<Self> {
        pollster::block_on(Self::new_async(options))
    }

    /// Creates a GPU context asynchronously.
    pub async fn new_async(options: &ContextOptions) -> TexgenResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                force_fallback_adapter: options.force_fallback_adapter,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| {
                TexgenError::BackendUnavailable("failed to request GPU adapter".into())
            })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("unshape-texgen"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| {
                TexgenError::BackendUnavailable(format!("failed to request GPU device: {e}"))
            })?;

        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            "created GPU context"
        );

        Ok(Self {
            instance,
            adapter,
            shared: Arc::new(GpuDevice { device, queue }),
        })
    }

    /// Returns the adapter name and backend.
    pub fn device_info(&self) -> String {
        let info = self.adapter.get_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    pub(crate) fn shared(&self) -> &Arc<GpuDevice> {
        &self.shared
    }

    /// Returns `true` if `device` is this context's device.
    pub(crate) fn owns(&self, device: &Arc<GpuDevice>) -> bool {
        Arc::ptr_eq(&self.shared, device)
    }
}
