//! Image and mapped-view entry points.
//!
//! Each image lives in an [`ImageSlot`] that records its open views. While a
//! view is open the slot refuses every call that would need a new reference
//! to the image, so the view's borrow stays the only one. Dimensions and
//! element type are cached in the slot and stay readable throughout.

use crate::context::CONTEXTS;
use crate::error::{FfiError, FfiResult, wrap, wrap_code, wrap_ptr};
use crate::handles::HandleSet;
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use unshape_texgen::{
    Backend, Context, ElementType, Image, ImageDim, MappedImageRead, MappedImageWrite,
    TexgenError, TexgenResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mapping {
    Unmapped,
    Read(usize),
    Write,
}

/// An image together with the views opened on it through handles.
pub(crate) struct ImageSlot {
    dim: ImageDim,
    element_type: ElementType,
    backend: Backend,
    mapping: Mutex<Mapping>,
    image: UnsafeCell<Image>,
}

// SAFETY: `image` is reached either with `mapping` locked and recording no
// write view, or through a view guard that `mapping` accounts for.
unsafe impl Sync for ImageSlot {}

impl ImageSlot {
    fn new(image: Image) -> Self {
        Self {
            dim: image.dim(),
            element_type: image.element_type(),
            backend: image.backend(),
            mapping: Mutex::new(Mapping::Unmapped),
            image: UnsafeCell::new(image),
        }
    }

    pub(crate) fn backend(&self) -> Backend {
        self.backend
    }

    /// Runs `f` on the image unless a view is open.
    pub(crate) fn with_unmapped<R>(
        &self,
        f: impl FnOnce(&mut Image) -> FfiResult<R>,
    ) -> FfiResult<R> {
        let mapping = self.mapping.lock();
        if *mapping != Mapping::Unmapped {
            return Err(TexgenError::AlreadyMapped.into());
        }
        // SAFETY: no view is open and the lock is held.
        f(unsafe { &mut *self.image.get() })
    }
}

/// An open read view.
pub struct MappedImageDataRead {
    view: Mutex<Option<MappedImageRead<'static>>>,
    slot: Arc<ImageSlot>,
}

/// An open write view.
pub struct MappedImageDataWrite {
    view: Mutex<Option<MappedImageWrite<'static>>>,
    /// Start of the host elements, taken once when the view opened.
    data: NonNull<u8>,
    slot: Arc<ImageSlot>,
}

// SAFETY: `data` points into the image that `view` exclusively borrows, and
// is only handed out, never dereferenced here.
unsafe impl Send for MappedImageDataWrite {}
unsafe impl Sync for MappedImageDataWrite {}

pub(crate) static IMAGES: HandleSet<Image, ImageSlot> = HandleSet::new("image");
static READ_VIEWS: HandleSet<MappedImageDataRead> = HandleSet::new("read view");
static WRITE_VIEWS: HandleSet<MappedImageDataWrite> = HandleSet::new("write view");

fn element_type_from_raw(raw: u32) -> FfiResult<ElementType> {
    match raw {
        0 => Ok(ElementType::UInt8),
        1 => Ok(ElementType::Float32),
        other => Err(FfiError::InvalidElementType(other)),
    }
}

fn write_out<T>(out: *mut T, value: T, what: &'static str) -> FfiResult<()> {
    if out.is_null() {
        return Err(FfiError::NullPointer(what));
    }
    // SAFETY: callers promise `out` is valid for writes when non-null.
    unsafe { out.write(value) };
    Ok(())
}

fn check_type(slot: &ImageSlot, expected: ElementType) -> FfiResult<()> {
    if slot.element_type == expected {
        Ok(())
    } else {
        Err(TexgenError::ElementTypeMismatch {
            expected,
            actual: slot.element_type,
        }
        .into())
    }
}

/// Allocates a zeroed CPU image. `element_type` is `0` for `u8` and `1`
/// for `f32`.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_new_cpu(dim: ImageDim, element_type: u32) -> *mut Image {
    wrap_ptr(|| {
        let element_type = element_type_from_raw(element_type)?;
        Ok(IMAGES.insert(ImageSlot::new(Image::new_cpu(dim, element_type)?)))
    })
}

fn new_gpu(
    dim: ImageDim,
    element_type: u32,
    ctx: *const Context,
    alloc: fn(ImageDim, ElementType, &Context) -> TexgenResult<Image>,
) -> *mut Image {
    wrap_ptr(|| {
        let ctx = CONTEXTS.get(ctx)?;
        let element_type = element_type_from_raw(element_type)?;
        Ok(IMAGES.insert(ImageSlot::new(alloc(dim, element_type, &ctx)?)))
    })
}

/// Allocates a zeroed 1D image on a GPU context.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_new_gpu_1d(
    dim: ImageDim,
    element_type: u32,
    ctx: *const Context,
) -> *mut Image {
    new_gpu(dim, element_type, ctx, Image::new_gpu_1d)
}

/// Allocates a zeroed 2D image on a GPU context.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_new_gpu_2d(
    dim: ImageDim,
    element_type: u32,
    ctx: *const Context,
) -> *mut Image {
    new_gpu(dim, element_type, ctx, Image::new_gpu_2d)
}

/// Allocates a zeroed 3D image on a GPU context.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_new_gpu_3d(
    dim: ImageDim,
    element_type: u32,
    ctx: *const Context,
) -> *mut Image {
    new_gpu(dim, element_type, ctx, Image::new_gpu_3d)
}

/// Destroys an image. Fails while any view on it is open.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_destroy(image: *mut Image) -> i32 {
    wrap_code(|| {
        let slot = IMAGES.get(image)?;
        let mapping = slot.mapping.lock();
        if *mapping != Mapping::Unmapped {
            return Err(TexgenError::AlreadyMapped.into());
        }
        IMAGES.remove(image)?;
        Ok(())
    })
}

/// Writes the dimensions of `image` to `out`.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unshape_texgen_image_dim(image: *const Image, out: *mut ImageDim) -> i32 {
    wrap_code(|| write_out(out, IMAGES.get(image)?.dim, "dim output"))
}

/// Writes the element type of `image` to `out`.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unshape_texgen_image_element_type(
    image: *const Image,
    out: *mut ElementType,
) -> i32 {
    wrap_code(|| write_out(out, IMAGES.get(image)?.element_type, "element type output"))
}

/// Copies device results into the host mirror. A no-op for CPU images.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_sync(image: *mut Image) -> i32 {
    wrap_code(|| IMAGES.get(image)?.with_unmapped(|image| Ok(image.sync()?)))
}

/// Opens a read view. Several read views may be open at once.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_read(image: *const Image) -> *mut MappedImageDataRead {
    wrap_ptr(|| {
        let slot = IMAGES.get(image)?;
        let view = {
            let mut mapping = slot.mapping.lock();
            let readers = match *mapping {
                Mapping::Unmapped => 0,
                Mapping::Read(readers) => readers,
                Mapping::Write => return Err(TexgenError::AlreadyMapped.into()),
            };
            // SAFETY: only read views are open, and they hold shared
            // borrows too. The view keeps `slot` alive.
            let target: &'static Image = unsafe { &*slot.image.get() };
            let view = target.map_read()?;
            *mapping = Mapping::Read(readers + 1);
            view
        };
        Ok(READ_VIEWS.insert(MappedImageDataRead {
            view: Mutex::new(Some(view)),
            slot,
        }))
    })
}

/// Opens the exclusive write view.
///
/// For GPU images the view edits the host mirror, which is uploaded when
/// the view is unmapped. Sync first to keep earlier compute results.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_write(image: *mut Image) -> *mut MappedImageDataWrite {
    wrap_ptr(|| {
        let slot = IMAGES.get(image)?;
        let (view, data) = {
            let mut mapping = slot.mapping.lock();
            if *mapping != Mapping::Unmapped {
                return Err(TexgenError::AlreadyMapped.into());
            }
            // SAFETY: no view is open and the lock is held. The view keeps
            // `slot` alive, and the slot refuses other access until unmap.
            let target: &'static mut Image = unsafe { &mut *slot.image.get() };
            let mut view = target.map_write()?;
            let data = NonNull::from(view.bytes_mut()).cast::<u8>();
            *mapping = Mapping::Write;
            (view, data)
        };
        Ok(WRITE_VIEWS.insert(MappedImageDataWrite {
            view: Mutex::new(Some(view)),
            data,
            slot,
        }))
    })
}

/// Closes a read view and invalidates its data pointers.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_unmap_read(view: *mut MappedImageDataRead) -> i32 {
    wrap_code(|| {
        let handle = READ_VIEWS.remove(view)?;
        let guard = handle
            .view
            .lock()
            .take()
            .ok_or(FfiError::InvalidHandle("read view"))?;
        let mut mapping = handle.slot.mapping.lock();
        let result = guard.unmap();
        *mapping = match *mapping {
            Mapping::Read(readers) if readers > 1 => Mapping::Read(readers - 1),
            _ => Mapping::Unmapped,
        };
        Ok(result?)
    })
}

/// Closes a write view, publishing its contents to the image.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_unmap_write(view: *mut MappedImageDataWrite) -> i32 {
    wrap_code(|| {
        let handle = WRITE_VIEWS.remove(view)?;
        let guard = handle
            .view
            .lock()
            .take()
            .ok_or(FfiError::InvalidHandle("write view"))?;
        let mut mapping = handle.slot.mapping.lock();
        let result = guard.unmap();
        *mapping = Mapping::Unmapped;
        Ok(result?)
    })
}

/// Returns the `u8` elements of a read view, or null if the image holds
/// another element type.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_read_data_u8(
    view: *const MappedImageDataRead,
) -> *const u8 {
    wrap(ptr::null(), || {
        let handle = READ_VIEWS.get(view)?;
        let guard = handle.view.lock();
        let guard = guard.as_ref().ok_or(FfiError::InvalidHandle("read view"))?;
        Ok(guard.data_u8()?.as_ptr())
    })
}

/// Returns the `f32` elements of a read view, or null if the image holds
/// another element type.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_read_data_f32(
    view: *const MappedImageDataRead,
) -> *const f32 {
    wrap(ptr::null(), || {
        let handle = READ_VIEWS.get(view)?;
        let guard = handle.view.lock();
        let guard = guard.as_ref().ok_or(FfiError::InvalidHandle("read view"))?;
        Ok(guard.data_f32()?.as_ptr())
    })
}

/// Returns the writable `u8` elements of a write view, or null if the image
/// holds another element type.
///
/// The pointer stays valid until the view is unmapped.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_write_data_u8(
    view: *mut MappedImageDataWrite,
) -> *mut u8 {
    wrap_ptr(|| {
        let handle = WRITE_VIEWS.get(view)?;
        check_type(&handle.slot, ElementType::UInt8)?;
        Ok(handle.data.as_ptr())
    })
}

/// Returns the writable `f32` elements of a write view, or null if the image
/// holds another element type.
///
/// The pointer stays valid until the view is unmapped.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_image_map_write_data_f32(
    view: *mut MappedImageDataWrite,
) -> *mut f32 {
    wrap_ptr(|| {
        let handle = WRITE_VIEWS.get(view)?;
        check_type(&handle.slot, ElementType::Float32)?;
        Ok(handle.data.cast::<f32>().as_ptr())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_from_raw() {
        assert_eq!(element_type_from_raw(0).unwrap(), ElementType::UInt8);
        assert_eq!(element_type_from_raw(1).unwrap(), ElementType::Float32);
        assert!(matches!(
            element_type_from_raw(2),
            Err(FfiError::InvalidElementType(2))
        ));
    }

    #[test]
    fn test_slot_refuses_access_while_mapped() {
        let image = Image::new_cpu(ImageDim::new(2, 1, 1, 1), ElementType::UInt8).unwrap();
        let slot = ImageSlot::new(image);
        assert!(slot.with_unmapped(|image| Ok(image.len())).is_ok());

        *slot.mapping.lock() = Mapping::Read(1);
        assert!(matches!(
            slot.with_unmapped(|image| Ok(image.len())),
            Err(FfiError::Texgen(TexgenError::AlreadyMapped))
        ));
        assert_eq!(slot.dim, ImageDim::new(2, 1, 1, 1));
        assert_eq!(slot.backend(), Backend::Cpu);
    }
}
