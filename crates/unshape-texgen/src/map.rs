//! Mapped views over image storage.
//!
//! Each image carries a [`MapState`] that tracks its open views:
//!
//! | State | Meaning |
//! |------:|--------|
//! | `0` | Unmapped |
//! | `1` | Write-mapped |
//! | `>= 2` | Read-mapped (`state - 1` open readers) |
//!
//! Conflicting acquisitions fail immediately with
//! [`TexgenError::AlreadyMapped`] instead of waiting.

use crate::error::{TexgenError, TexgenResult};
use crate::image::{ElementType, Image};
use std::sync::atomic::{AtomicUsize, Ordering};

const UNMAPPED: usize = 0;
const WRITE_MAPPED: usize = 1;

/// Per-image map state.
#[derive(Debug, Default)]
pub(crate) struct MapState {
    state: AtomicUsize,
}

impl MapState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_mapped(&self) -> bool {
        self.state.load(Ordering::Acquire) != UNMAPPED
    }

    /// Number of open read views.
    #[cfg(test)]
    pub(crate) fn readers(&self) -> usize {
        self.state.load(Ordering::Acquire).saturating_sub(1)
    }

    pub(crate) fn acquire_read(&self) -> TexgenResult<()> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                UNMAPPED => Some(2),
                WRITE_MAPPED => None,
                readers => readers.checked_add(1),
            })
            .map(|_| ())
            .map_err(|_| TexgenError::AlreadyMapped)
    }

    pub(crate) fn release_read(&self) -> TexgenResult<()> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                UNMAPPED | WRITE_MAPPED => None,
                2 => Some(UNMAPPED),
                readers => Some(readers - 1),
            })
            .map(|_| ())
            .map_err(|_| TexgenError::NotMapped)
    }

    pub(crate) fn acquire_write(&self) -> TexgenResult<()> {
        self.state
            .compare_exchange(UNMAPPED, WRITE_MAPPED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| TexgenError::AlreadyMapped)
    }

    pub(crate) fn release_write(&self) -> TexgenResult<()> {
        self.state
            .compare_exchange(WRITE_MAPPED, UNMAPPED, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| TexgenError::NotMapped)
    }
}

/// A read view over an image's host storage.
///
/// For GPU images the view shows the host mirror as of the last
/// [`Image::sync`]. The view is released when dropped or through
/// [`MappedImageRead::unmap`].
pub struct MappedImageRead<'a> {
    image: &'a Image,
    open: bool,
}

impl<'a> MappedImageRead<'a> {
    pub(crate) fn new(image: &'a Image) -> TexgenResult<Self> {
        image.map_state().acquire_read()?;
        Ok(Self { image, open: true })
    }

    /// Returns the mapped image.
    pub fn image(&self) -> &Image {
        self.image
    }

    /// Returns the elements of a [`ElementType::UInt8`] image.
    pub fn data_u8(&self) -> TexgenResult<&[u8]> {
        self.image.host().as_u8()
    }

    /// Returns the elements of a [`ElementType::Float32`] image.
    pub fn data_f32(&self) -> TexgenResult<&[f32]> {
        self.image.host().as_f32()
    }

    /// Returns the raw element bytes.
    pub fn bytes(&self) -> &[u8] {
        self.image.host().as_bytes()
    }

    /// Releases the view.
    pub fn unmap(mut self) -> TexgenResult<()> {
        self.open = false;
        self.image.map_state().release_read()
    }
}

impl Drop for MappedImageRead<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.image.map_state().release_read() {
                tracing::warn!(error = %e, "failed to release read view");
            }
        }
    }
}

/// An exclusive write view over an image's host storage.
///
/// For GPU images, the host mirror is uploaded to the device when the view
/// is released, so a later [`Image::sync`] and read view observe the
/// written values.
pub struct MappedImageWrite<'a> {
    image: &'a mut Image,
    open: bool,
}

impl<'a> MappedImageWrite<'a> {
    pub(crate) fn new(image: &'a mut Image) -> TexgenResult<Self> {
        image.map_state().acquire_write()?;
        Ok(Self { image, open: true })
    }

    /// Returns the element type of the mapped image.
    pub fn element_type(&self) -> ElementType {
        self.image.element_type()
    }

    /// Returns the elements of a [`ElementType::UInt8`] image.
    pub fn data_u8(&self) -> TexgenResult<&[u8]> {
        self.image.host().as_u8()
    }

    /// Returns the elements of a [`ElementType::Float32`] image.
    pub fn data_f32(&self) -> TexgenResult<&[f32]> {
        self.image.host().as_f32()
    }

    /// Returns the mutable elements of a [`ElementType::UInt8`] image.
    pub fn data_u8_mut(&mut self) -> TexgenResult<&mut [u8]> {
        self.image.host_mut().as_u8_mut()
    }

    /// Returns the mutable elements of a [`ElementType::Float32`] image.
    pub fn data_f32_mut(&mut self) -> TexgenResult<&mut [f32]> {
        self.image.host_mut().as_f32_mut()
    }

    /// Returns the raw mutable element bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.image.host_mut().as_bytes_mut()
    }

    /// Releases the view, uploading the host mirror of GPU images.
    pub fn unmap(mut self) -> TexgenResult<()> {
        self.open = false;
        self.release()
    }

    fn release(&mut self) -> TexgenResult<()> {
        self.image.upload_host();
        self.image.map_state().release_write()
    }
}

impl Drop for MappedImageWrite<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.release() {
                tracing::warn!(error = %e, "failed to release write view");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_share() {
        let state = MapState::new();
        state.acquire_read().unwrap();
        state.acquire_read().unwrap();
        assert_eq!(state.readers(), 2);
        assert!(matches!(state.acquire_write(), Err(TexgenError::AlreadyMapped)));

        state.release_read().unwrap();
        state.release_read().unwrap();
        assert!(!state.is_mapped());
        assert!(matches!(state.release_read(), Err(TexgenError::NotMapped)));
    }

    #[test]
    fn test_writer_is_exclusive() {
        let state = MapState::new();
        state.acquire_write().unwrap();
        assert!(matches!(state.acquire_write(), Err(TexgenError::AlreadyMapped)));
        assert!(matches!(state.acquire_read(), Err(TexgenError::AlreadyMapped)));
        assert!(matches!(state.release_read(), Err(TexgenError::NotMapped)));

        state.release_write().unwrap();
        assert!(matches!(state.release_write(), Err(TexgenError::NotMapped)));
        state.acquire_read().unwrap();
        assert_eq!(state.readers(), 1);
    }
}
