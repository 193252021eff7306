//! Context entry points.

use crate::error::{FfiError, wrap_code, wrap_ptr};
use crate::handles::HandleSet;
use crate::logging::init_logging;
use unshape_texgen::{Backend, Context};

pub(crate) static CONTEXTS: HandleSet<Context> = HandleSet::new("context");

/// Creates a CPU context backed by a thread pool.
///
/// Returns null on failure; see `unshape_texgen_get_last_error`.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_context_new_cpu() -> *mut Context {
    init_logging();
    wrap_ptr(|| Ok(CONTEXTS.insert(Context::new_cpu()?)))
}

/// Creates a GPU context on the preferred adapter.
///
/// Returns null when no GPU backend is available.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_context_new_gpu() -> *mut Context {
    init_logging();
    wrap_ptr(|| Ok(CONTEXTS.insert(Context::new_gpu()?)))
}

/// Destroys a context.
///
/// Images allocated on a GPU context keep its device alive until they are
/// destroyed themselves.
#[unsafe(no_mangle)]
pub extern "C" fn unshape_texgen_context_destroy(ctx: *mut Context) -> i32 {
    wrap_code(|| {
        CONTEXTS.remove(ctx)?;
        Ok(())
    })
}

/// Writes the backend of `ctx` to `out`.
///
/// # Safety
///
/// `out` must be null or valid for writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unshape_texgen_context_backend(ctx: *const Context, out: *mut Backend) -> i32 {
    wrap_code(|| {
        let ctx = CONTEXTS.get(ctx)?;
        if out.is_null() {
            return Err(FfiError::NullPointer("backend output"));
        }
        unsafe { out.write(ctx.backend()) };
        Ok(())
    })
}
