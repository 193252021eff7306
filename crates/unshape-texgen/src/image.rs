//! Images: typed, dimensioned element buffers bound to a backend.
//!
//! Every image keeps its elements in a zero-initialized host buffer. For
//! CPU images that buffer is the storage itself. For GPU images it is a
//! mirror of a device storage buffer, refreshed by [`Image::sync`] and
//! uploaded when a write view is released.

use crate::context::{Backend, Context, GpuDevice};
use crate::error::{TexgenError, TexgenResult};
use crate::map::{MapState, MappedImageRead, MappedImageWrite};
use glam::UVec4;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Image extents.
///
/// `depth == 1` is a 2-D image, `height == depth == 1` a 1-D image.
/// Elements are laid out as `((z * height + y) * width + x) * channels + c`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageDim {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub channels: usize,
}

impl ImageDim {
    /// Creates image extents.
    pub fn new(width: usize, height: usize, depth: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            depth,
            channels,
        }
    }

    /// Number of texels (`width * height * depth`).
    pub fn texel_count(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// Number of elements (`texel_count * channels`).
    pub fn element_count(&self) -> usize {
        self.texel_count() * self.channels
    }

    /// Linear element index of channel `c` at `(x, y, z)`.
    pub fn index(&self, x: usize, y: usize, z: usize, c: usize) -> usize {
        ((z * self.height + y) * self.width + x) * self.channels + c
    }

    /// Coordinates `(x, y, z, c)` of a linear element index.
    pub fn texel_of(&self, index: usize) -> UVec4 {
        let c = index % self.channels;
        let texel = index / self.channels;
        let x = texel % self.width;
        let rest = texel / self.width;
        let y = rest % self.height;
        let z = rest / self.height;
        UVec4::new(x as u32, y as u32, z as u32, c as u32)
    }

    /// Extents as `(width, height, depth, channels)`.
    pub fn as_uvec4(&self) -> UVec4 {
        UVec4::new(
            self.width as u32,
            self.height as u32,
            self.depth as u32,
            self.channels as u32,
        )
    }

    /// Checks the channel count and extents, returning the element count.
    fn validate(&self) -> TexgenResult<usize> {
        if !(1..=4).contains(&self.channels) {
            return Err(TexgenError::InvalidChannelCount(self.channels));
        }
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(TexgenError::InvalidDimensions(format!(
                "image extents must be > 0, got {}x{}x{}",
                self.width, self.height, self.depth
            )));
        }
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.depth))
            .and_then(|n| n.checked_mul(self.channels))
            .ok_or_else(|| TexgenError::InvalidDimensions(format!("{self} overflows")))
    }
}

impl fmt::Display for ImageDim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}",
            self.width, self.height, self.depth, self.channels
        )
    }
}

/// Element type of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum ElementType {
    /// Integer samples in `0..=255`.
    UInt8 = 0,
    /// 32-bit float samples, conventionally in `[0, 1]`.
    Float32 = 1,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            ElementType::UInt8 => 1,
            ElementType::Float32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::UInt8 => f.write_str("u8"),
            ElementType::Float32 => f.write_str("f32"),
        }
    }
}

/// Indexing scheme an image was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// `height == depth == 1`.
    D1,
    /// `depth == 1`.
    D2,
    /// Any extents.
    D3,
}

impl ImageLayout {
    /// Smallest layout that can address `dim`.
    pub fn of(dim: &ImageDim) -> Self {
        if dim.depth > 1 {
            ImageLayout::D3
        } else if dim.height > 1 {
            ImageLayout::D2
        } else {
            ImageLayout::D1
        }
    }

    fn check(self, dim: &ImageDim) -> TexgenResult<()> {
        let fits = match self {
            ImageLayout::D1 => dim.height == 1 && dim.depth == 1,
            ImageLayout::D2 => dim.depth == 1,
            ImageLayout::D3 => true,
        };
        if fits {
            Ok(())
        } else {
            Err(TexgenError::InvalidDimensions(format!(
                "{dim} does not fit a {self:?} image"
            )))
        }
    }
}

/// Host-side element storage.
pub(crate) enum HostData {
    UInt8(Vec<u8>),
    Float32(Vec<f32>),
}

impl HostData {
    fn zeroed(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::UInt8 => HostData::UInt8(vec![0; len]),
            ElementType::Float32 => HostData::Float32(vec![0.0; len]),
        }
    }

    pub(crate) fn as_u8(&self) -> TexgenResult<&[u8]> {
        match self {
            HostData::UInt8(data) => Ok(data),
            HostData::Float32(_) => Err(mismatch(ElementType::UInt8, ElementType::Float32)),
        }
    }

    pub(crate) fn as_f32(&self) -> TexgenResult<&[f32]> {
        match self {
            HostData::Float32(data) => Ok(data),
            HostData::UInt8(_) => Err(mismatch(ElementType::Float32, ElementType::UInt8)),
        }
    }

    pub(crate) fn as_u8_mut(&mut self) -> TexgenResult<&mut [u8]> {
        match self {
            HostData::UInt8(data) => Ok(data),
            HostData::Float32(_) => Err(mismatch(ElementType::UInt8, ElementType::Float32)),
        }
    }

    pub(crate) fn as_f32_mut(&mut self) -> TexgenResult<&mut [f32]> {
        match self {
            HostData::Float32(data) => Ok(data),
            HostData::UInt8(_) => Err(mismatch(ElementType::Float32, ElementType::UInt8)),
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            HostData::UInt8(data) => data,
            HostData::Float32(data) => bytemuck::cast_slice(data),
        }
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        match self {
            HostData::UInt8(data) => data,
            HostData::Float32(data) => bytemuck::cast_slice_mut(data),
        }
    }
}

fn mismatch(expected: ElementType, actual: ElementType) -> TexgenError {
    TexgenError::ElementTypeMismatch { expected, actual }
}

/// Device-resident storage of a GPU image.
pub(crate) struct DeviceStorage {
    pub(crate) device: Arc<GpuDevice>,
    pub(crate) buffer: wgpu::Buffer,
    /// The device holds writes the host mirror has not seen yet.
    dirty: bool,
}

impl DeviceStorage {
    fn new(device: Arc<GpuDevice>, dim: &ImageDim, byte_len: usize) -> TexgenResult<Self> {
        let limits = device.device.limits();
        let size = byte_len.div_ceil(4).max(1) * 4;
        if u32::try_from(dim.element_count()).is_err()
            || size as u64 > u64::from(limits.max_storage_buffer_binding_size)
        {
            return Err(TexgenError::InvalidDimensions(format!(
                "{dim} exceeds the device storage limit of {} bytes",
                limits.max_storage_buffer_binding_size
            )));
        }

        let buffer = device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("unshape_texgen_image"),
            size: size as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            buffer,
            dirty: false,
        })
    }
}

enum Storage {
    Cpu,
    Gpu(DeviceStorage),
}

/// A typed, dimensioned element buffer bound to one backend.
pub struct Image {
    dim: ImageDim,
    element_type: ElementType,
    layout: ImageLayout,
    host: HostData,
    storage: Storage,
    map_state: MapState,
}

impl Image {
    /// Creates a zero-initialized host image.
    pub fn new_cpu(dim: ImageDim, element_type: ElementType) -> TexgenResult<Self> {
        let len = dim.validate()?;
        tracing::debug!(%dim, %element_type, "allocated CPU image");
        Ok(Self {
            dim,
            element_type,
            layout: ImageLayout::of(&dim),
            host: HostData::zeroed(element_type, len),
            storage: Storage::Cpu,
            map_state: MapState::new(),
        })
    }

    /// Creates a zero-initialized 1-D GPU image. `height` and `depth` must be 1.
    pub fn new_gpu_1d(dim: ImageDim, element_type: ElementType, ctx: &Context) -> TexgenResult<Self> {
        Self::new_gpu(dim, element_type, ImageLayout::D1, ctx)
    }

    /// Creates a zero-initialized 2-D GPU image. `depth` must be 1.
    pub fn new_gpu_2d(dim: ImageDim, element_type: ElementType, ctx: &Context) -> TexgenResult<Self> {
        Self::new_gpu(dim, element_type, ImageLayout::D2, ctx)
    }

    /// Creates a zero-initialized 3-D GPU image.
    pub fn new_gpu_3d(dim: ImageDim, element_type: ElementType, ctx: &Context) -> TexgenResult<Self> {
        Self::new_gpu(dim, element_type, ImageLayout::D3, ctx)
    }

    fn new_gpu(
        dim: ImageDim,
        element_type: ElementType,
        layout: ImageLayout,
        ctx: &Context,
    ) -> TexgenResult<Self> {
        let Context::Gpu(gpu) = ctx else {
            return Err(TexgenError::backend_mismatch(
                "GPU images require a GPU context",
            ));
        };
        let len = dim.validate()?;
        layout.check(&dim)?;

        let byte_len = len * element_type.byte_size();
        let storage = DeviceStorage::new(Arc::clone(gpu.shared()), &dim, byte_len)?;
        tracing::debug!(%dim, %element_type, ?layout, bytes = byte_len, "allocated GPU image");

        Ok(Self {
            dim,
            element_type,
            layout,
            host: HostData::zeroed(element_type, len),
            storage: Storage::Gpu(storage),
            map_state: MapState::new(),
        })
    }

    /// Returns the image extents.
    pub fn dim(&self) -> ImageDim {
        self.dim
    }

    /// Returns the element type.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Returns the backend the image was allocated for.
    pub fn backend(&self) -> Backend {
        match self.storage {
            Storage::Cpu => Backend::Cpu,
            Storage::Gpu(_) => Backend::Gpu,
        }
    }

    /// Returns the indexing scheme the image was created for.
    pub fn layout(&self) -> ImageLayout {
        self.layout
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dim.element_count()
    }

    /// Always `false`: images have at least one element.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the element storage in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.element_type.byte_size()
    }

    /// Returns `true` while any view is open.
    pub fn is_mapped(&self) -> bool {
        self.map_state.is_mapped()
    }

    /// Opens a read view.
    ///
    /// Any number of read views may be open at once. Fails with
    /// [`TexgenError::AlreadyMapped`] while a write view is open.
    pub fn map_read(&self) -> TexgenResult<MappedImageRead<'_>> {
        MappedImageRead::new(self)
    }

    /// Opens an exclusive write view.
    ///
    /// Fails with [`TexgenError::AlreadyMapped`] while any view is open.
    /// For GPU images the view edits the host mirror, and releasing it
    /// uploads the mirror over the device buffer. Call [`Image::sync`]
    /// after a compute first, or the upload discards its results.
    pub fn map_write(&mut self) -> TexgenResult<MappedImageWrite<'_>> {
        MappedImageWrite::new(self)
    }

    /// Copies pending device writes into the host mirror.
    ///
    /// A no-op for CPU images, and for GPU images with nothing pending, so
    /// repeated calls observe the same contents.
    pub fn sync(&mut self) -> TexgenResult<()> {
        if self.map_state.is_mapped() {
            return Err(TexgenError::AlreadyMapped);
        }
        let Storage::Gpu(gpu) = &mut self.storage else {
            return Ok(());
        };
        if !gpu.dirty {
            return Ok(());
        }

        let size = gpu.buffer.size();
        let device = &gpu.device;
        let staging = device.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("unshape_texgen_staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("unshape_texgen_sync"),
            });
        encoder.copy_buffer_to_buffer(&gpu.buffer, 0, &staging, 0, size);
        device.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| TexgenError::SyncFailed("readback callback was dropped".into()))?
            .map_err(|e| TexgenError::SyncFailed(e.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            let host = self.host.as_bytes_mut();
            let len = host.len();
            host.copy_from_slice(&mapped[..len]);
        }
        staging.unmap();
        gpu.dirty = false;

        tracing::debug!(dim = %self.dim, bytes = size, "synced GPU image");
        Ok(())
    }

    pub(crate) fn host(&self) -> &HostData {
        &self.host
    }

    pub(crate) fn host_mut(&mut self) -> &mut HostData {
        &mut self.host
    }

    pub(crate) fn map_state(&self) -> &MapState {
        &self.map_state
    }

    pub(crate) fn device_storage(&self) -> Option<&DeviceStorage> {
        match &self.storage {
            Storage::Cpu => None,
            Storage::Gpu(gpu) => Some(gpu),
        }
    }

    /// Records that device writes are pending.
    pub(crate) fn mark_device_dirty(&mut self) {
        if let Storage::Gpu(gpu) = &mut self.storage {
            gpu.dirty = true;
        }
    }

    /// Uploads the host mirror to the device.
    pub(crate) fn upload_host(&mut self) {
        let Storage::Gpu(gpu) = &mut self.storage else {
            return;
        };
        let bytes = self.host.as_bytes();
        if bytes.len() % 4 == 0 {
            gpu.device.queue.write_buffer(&gpu.buffer, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(bytes.len().div_ceil(4) * 4, 0);
            gpu.device.queue.write_buffer(&gpu.buffer, 0, &padded);
        }
        gpu.dirty = false;
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("dim", &self.dim)
            .field("element_type", &self.element_type)
            .field("backend", &self.backend())
            .field("layout", &self.layout)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
