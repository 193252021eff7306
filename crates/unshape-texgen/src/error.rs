//! Texture generation error types.

use crate::image::ElementType;
use thiserror::Error;

/// Errors that can occur while creating backends, images and methods, or
/// while running a method.
#[derive(Error, Debug)]
pub enum TexgenError {
    /// The requested backend could not be created.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No method with this name is registered.
    #[error("unknown method: {0:?}")]
    UnknownMethod(String),

    /// The image was allocated for a different backend or device than the
    /// context it is being used with.
    #[error("backend mismatch: {0}")]
    BackendMismatch(String),

    /// The parameter blob does not have the size of the method's record.
    #[error("parameter size mismatch for {method}: expected {expected} bytes, got {actual}")]
    ParameterSizeMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// Device-to-host transfer failed.
    #[error("sync failed: {0}")]
    SyncFailed(String),

    /// A typed accessor was used on an image of another element type.
    #[error("element type mismatch: image is {actual}, accessor expects {expected}")]
    ElementTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// The image already has a conflicting mapped view open.
    #[error("image is already mapped")]
    AlreadyMapped,

    /// The image has no mapped view to release.
    #[error("image is not mapped")]
    NotMapped,

    /// Image dimensions are unusable for the requested storage.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Channel count outside of `1..=4`.
    #[error("invalid channel count {0}, expected 1 to 4")]
    InvalidChannelCount(usize),

    /// Shader compilation error.
    #[error("shader compilation error: {0}")]
    ShaderError(String),
}

impl TexgenError {
    /// Creates a [`TexgenError::BackendMismatch`] from any displayable reason.
    pub fn backend_mismatch(reason: impl Into<String>) -> Self {
        Self::BackendMismatch(reason.into())
    }

    /// Returns the stable non-zero status code for this error.
    ///
    /// `0` is reserved for success at the C boundary.
    pub fn code(&self) -> i32 {
        match self {
            Self::BackendUnavailable(_) => 1,
            Self::UnknownMethod(_) => 2,
            Self::BackendMismatch(_) => 3,
            Self::ParameterSizeMismatch { .. } => 4,
            Self::SyncFailed(_) => 5,
            Self::ElementTypeMismatch { .. } => 6,
            Self::AlreadyMapped => 7,
            Self::NotMapped => 8,
            Self::InvalidDimensions(_) => 9,
            Self::InvalidChannelCount(_) => 10,
            Self::ShaderError(_) => 11,
        }
    }
}

/// Result type for texture generation operations.
pub type TexgenResult<T> = Result<T, TexgenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_and_non_zero() {
        let errors = [
            TexgenError::BackendUnavailable(String::new()),
            TexgenError::UnknownMethod(String::new()),
            TexgenError::backend_mismatch(""),
            TexgenError::ParameterSizeMismatch {
                method: String::new(),
                expected: 0,
                actual: 0,
            },
            TexgenError::SyncFailed(String::new()),
            TexgenError::ElementTypeMismatch {
                expected: ElementType::UInt8,
                actual: ElementType::Float32,
            },
            TexgenError::AlreadyMapped,
            TexgenError::NotMapped,
            TexgenError::InvalidDimensions(String::new()),
            TexgenError::InvalidChannelCount(5),
            TexgenError::ShaderError(String::new()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(TexgenError::code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_messages() {
        let err = TexgenError::ParameterSizeMismatch {
            method: "debug".into(),
            expected: 4,
            actual: 2,
        };
        assert_eq!(
            err.to_string(),
            "parameter size mismatch for debug: expected 4 bytes, got 2"
        );
        assert_eq!(
            TexgenError::UnknownMethod("nope".into()).to_string(),
            "unknown method: \"nope\""
        );
    }
}
