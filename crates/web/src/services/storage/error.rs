//! Storage error types.

use thiserror::Error;

/// Errors from any storage backend.
///
/// Callers treat every variant the same way: the operation failed and
/// nothing was cleaned up.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The upload contained no bytes.
    #[error("uploaded file is empty")]
    Empty,

    /// The filename hint has no allowed image extension.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The reference cannot belong to this backend.
    #[error("invalid storage reference: {0}")]
    InvalidReference(String),

    /// Local filesystem error.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Object storage request failed.
    #[error("object storage error: {0}")]
    ObjectStore(String),
}

impl StorageError {
    /// Whether the error was caused by the upload itself rather than the
    /// backend, so it can be shown as a form error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Empty | Self::UnsupportedType(_))
    }
}
