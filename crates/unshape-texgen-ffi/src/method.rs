//! Registry and method entry points.

use crate::context::CONTEXTS;
use crate::error::{FfiError, wrap_code, wrap_ptr};
use crate::handles::HandleSet;
use crate::image::IMAGES;
use std::ffi::{CStr, c_char, c_void};
use unshape_texgen::{Context, Image, Method, Registry, TexgenError};

pub(crate) static REGISTRIES: HandleSet<Registry> = HandleSet::new("registry");
pub(crate) static METHODS: HandleSet<Method> = HandleSet::new("method");

/// Creates a registry holding the built-in methods.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_registry_new_builtin() -> *mut Registry {
    wrap_ptr(|| Ok(REGISTRIES.insert(Registry::new_builtin())))
}

/// Destroys a registry. Methods built from it stay valid.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_registry_destroy(registry: *mut Registry) -> i32 {
    wrap_code(|| {
        REGISTRIES.remove(registry)?;
        Ok(())
    })
}

/// Builds the method registered under `name`.
///
/// Returns null if the name is unknown.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unshape_texgen_method_new(
    registry: *const Registry,
    name: *const c_char,
) -> *mut Method {
    wrap_ptr(|| {
        let registry = REGISTRIES.get(registry)?;
        if name.is_null() {
            return Err(FfiError::NullPointer("name"));
        }
        let name = unsafe { CStr::from_ptr(name) }
            .to_str()
            .map_err(|_| FfiError::InvalidName)?;
        Ok(METHODS.insert(registry.build(name)?))
    })
}

/// Destroys a method.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_method_destroy(method: *mut Method) -> i32 {
    wrap_code(|| {
        METHODS.remove(method)?;
        Ok(())
    })
}

/// Runs `method` over `image` with the parameter record at `params`.
///
/// `params_len` must equal the method's record size. `params` may be null
/// only when `params_len` is zero. GPU results become visible after
/// `unshape_texgen_image_sync`.
///
/// # Safety
///
/// `params` must be valid for `params_len` bytes of reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unshape_texgen_method_compute(
    ctx: *const Context,
    method: *const Method,
    image: *mut Image,
    params: *const c_void,
    params_len: usize,
) -> i32 {
    wrap_code(|| {
        let ctx = CONTEXTS.get(ctx)?;
        let method = METHODS.get(method)?;
        let slot = IMAGES.get(image)?;
        let params: &[u8] = if params_len == 0 {
            &[]
        } else if params.is_null() {
            return Err(FfiError::NullPointer("params"));
        } else {
            unsafe { std::slice::from_raw_parts(params.cast::<u8>(), params_len) }
        };

        let result = slot.with_unmapped(|image| Ok(method.compute(&ctx, image, params)?));
        if let Err(FfiError::Texgen(TexgenError::AlreadyMapped)) = result {
            // A mapped image is off limits, so the checks that precede the
            // map state check run on the slot's metadata.
            if ctx.backend() != slot.backend() {
                return Err(TexgenError::backend_mismatch(format!(
                    "context is {}, image is {}",
                    ctx.backend(),
                    slot.backend()
                ))
                .into());
            }
            if params.len() != method.params_size() {
                return Err(TexgenError::ParameterSizeMismatch {
                    method: method.name().to_string(),
                    expected: method.params_size(),
                    actual: params.len(),
                }
                .into());
            }
        }
        result
    })
}
