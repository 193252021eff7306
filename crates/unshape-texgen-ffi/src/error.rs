//! Thread-local last-error channel and call wrappers.
//!
//! Every entry point runs its body through one of the `wrap_*` helpers. A
//! failure records its message for [`unshape_texgen_get_last_error`] and
//! returns the failure value; a success clears the message. Panics are
//! caught and reported the same way.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use thiserror::Error;
use unshape_texgen::TexgenError;

/// Errors raised at the C boundary.
#[derive(Error, Debug)]
pub enum FfiError {
    #[error(transparent)]
    Texgen(#[from] TexgenError),

    /// A required pointer argument was null.
    #[error("{0} pointer is null")]
    NullPointer(&'static str),

    /// A handle was not created by this library, or was already destroyed.
    #[error("invalid {0} handle")]
    InvalidHandle(&'static str),

    /// A method name was not valid UTF-8.
    #[error("method name is not valid UTF-8")]
    InvalidName,

    /// Raw element type outside of the enum.
    #[error("invalid element type {0}")]
    InvalidElementType(u32),

    /// The call panicked.
    #[error("panic: {0}")]
    Panic(String),
}

impl FfiError {
    /// Returns the non-zero status code for this error.
    pub fn code(&self) -> i32 {
        match self {
            FfiError::Texgen(e) => e.code(),
            FfiError::NullPointer(_) => 100,
            FfiError::InvalidHandle(_) => 101,
            FfiError::InvalidName => 102,
            FfiError::InvalidElementType(_) => 103,
            FfiError::Panic(_) => 104,
        }
    }
}

pub(crate) type FfiResult<T> = Result<T, FfiError>;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(error: &FfiError) {
    tracing::warn!(code = error.code(), error = %error, "call failed");
    let message = CString::new(error.to_string().replace('\0', " "))
        .unwrap_or_else(|_| c"unknown error".to_owned());
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Ok(message) = payload.downcast::<String>() {
        *message
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `f`, returning its value or `failed` after recording the error.
pub(crate) fn wrap<T>(failed: T, f: impl FnOnce() -> FfiResult<T>) -> T {
    let error = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => {
            clear_last_error();
            return value;
        }
        Ok(Err(error)) => error,
        Err(payload) => FfiError::Panic(panic_message(payload)),
    };
    set_last_error(&error);
    failed
}

/// Runs `f`, returning `0` or the error's status code.
pub(crate) fn wrap_code(f: impl FnOnce() -> FfiResult<()>) -> i32 {
    let error = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {
            clear_last_error();
            return 0;
        }
        Ok(Err(error)) => error,
        Err(payload) => FfiError::Panic(panic_message(payload)),
    };
    let code = error.code();
    set_last_error(&error);
    code
}

/// Runs `f`, returning its pointer or null.
pub(crate) fn wrap_ptr<T>(f: impl FnOnce() -> FfiResult<*mut T>) -> *mut T {
    wrap(ptr::null_mut(), f)
}

/// Returns the message of the last failed call on this thread, or null if
/// the last call succeeded.
///
/// The string stays valid until the next call into this library on the
/// same thread.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_get_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |message| message.as_ptr())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn last_error() -> Option<String> {
        let message = unshape_texgen_get_last_error();
        if message.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned())
        }
    }

    #[test]
    fn test_wrap_code_records_and_clears() {
        let code = wrap_code(|| Err(FfiError::NullPointer("image")));
        assert_eq!(code, 100);
        assert_eq!(last_error().as_deref(), Some("image pointer is null"));

        assert_eq!(wrap_code(|| Ok(())), 0);
        assert_eq!(last_error(), None);
    }

    #[test]
    fn test_wrap_catches_panics() {
        let value = wrap(-1, || -> FfiResult<i32> { panic!("boom") });
        assert_eq!(value, -1);
        assert_eq!(last_error().as_deref(), Some("panic: boom"));
    }

    #[test]
    fn test_texgen_codes_pass_through() {
        let error = FfiError::from(TexgenError::AlreadyMapped);
        assert_eq!(error.code(), TexgenError::AlreadyMapped.code());
        assert_eq!(error.to_string(), "image is already mapped");
    }
}
