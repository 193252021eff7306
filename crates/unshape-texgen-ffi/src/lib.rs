//! C-callable boundary for `unshape-texgen`.
//!
//! Objects cross the boundary as opaque handles:
//!
//! - `Context`, `Registry`, `Method` and `Image` handles come from the
//!   `*_new*` entry points and are released with the matching `*_destroy`
//! - `MappedImageDataRead` and `MappedImageDataWrite` come from
//!   `image_map_read`/`image_map_write` and are released by unmapping
//!
//! Entry points returning `i32` report `0` on success and a non-zero code per
//! failure kind. Entry points returning pointers report failure as null. In
//! both cases the message is available from
//! [`unshape_texgen_get_last_error`] on the calling thread.
//!
//! Handles are opaque ids that are never reused and never dereferenced, so
//! null, stale and foreign handles fail with a recorded error. Logging is configured through
//! the `UNSHAPE_TEXGEN_LOG` environment variable on first context creation.

mod context;
mod error;
mod handles;
mod image;
mod logging;
mod method;

pub use context::{
    unshape_texgen_context_backend, unshape_texgen_context_destroy,
    unshape_texgen_context_new_cpu, unshape_texgen_context_new_gpu,
};
pub use error::{FfiError, unshape_texgen_get_last_error};
pub use image::{
    MappedImageDataRead, MappedImageDataWrite, unshape_texgen_image_destroy,
    unshape_texgen_image_dim, unshape_texgen_image_element_type,
    unshape_texgen_image_map_read, unshape_texgen_image_map_read_data_f32,
    unshape_texgen_image_map_read_data_u8, unshape_texgen_image_map_write,
    unshape_texgen_image_map_write_data_f32, unshape_texgen_image_map_write_data_u8,
    unshape_texgen_image_new_cpu, unshape_texgen_image_new_gpu_1d,
    unshape_texgen_image_new_gpu_2d, unshape_texgen_image_new_gpu_3d,
    unshape_texgen_image_sync, unshape_texgen_image_unmap_read,
    unshape_texgen_image_unmap_write,
};
pub use logging::LOG_ENV;
pub use method::{
    unshape_texgen_method_compute, unshape_texgen_method_destroy, unshape_texgen_method_new,
    unshape_texgen_registry_destroy, unshape_texgen_registry_new_builtin,
};
pub use unshape_texgen::{Backend, ElementType, ImageDim};
