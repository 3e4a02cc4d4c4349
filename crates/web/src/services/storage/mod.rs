//! Pluggable image storage.
//!
//! Box photos are written through [`StorageBackend`]. Two implementations
//! exist, picked once at start-up by [`from_config`]:
//!
//! - [`LocalStorage`] writes under a directory served at `/uploads`
//! - [`S3Storage`] uploads to an S3-compatible bucket
//!
//! Both hand back an opaque reference string that is persisted in
//! `boxes.image_ref`; nothing outside this module interprets it.

mod error;
mod local;
mod s3;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

pub use error::StorageError;
pub use local::{LocalStorage, UPLOADS_URL_PREFIX};
pub use s3::S3Storage;

/// File extensions accepted for box photos.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Capability interface for persisting uploaded images.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Persist `bytes` and return the reference to store.
    ///
    /// `filename_hint` is the client-supplied file name; only its
    /// extension is used.
    async fn store(&self, bytes: Bytes, filename_hint: &str) -> Result<String, StorageError>;

    /// URL a browser can load the stored file from.
    fn retrieve_url(&self, reference: &str) -> Result<String, StorageError>;

    /// Remove a stored file. Removing a missing file succeeds.
    async fn delete(&self, reference: &str) -> Result<(), StorageError>;

    /// Whether a stored file exists.
    async fn exists(&self, reference: &str) -> Result<bool, StorageError>;
}

/// Build the backend described by `config`.
///
/// # Errors
///
/// Returns `StorageError::Io` if the local root cannot be created.
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match config {
        StorageConfig::Local { root } => Arc::new(LocalStorage::open(root).await?),
        StorageConfig::S3(s3) => Arc::new(S3Storage::from_config(s3).await),
    };
    tracing::info!(backend = backend.name(), "Storage backend ready");
    Ok(backend)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Lower-cased extension of `filename_hint` if it is an allowed image type.
///
/// # Errors
///
/// Returns `StorageError::UnsupportedType` otherwise.
pub fn image_extension(filename_hint: &str) -> Result<String, StorageError> {
    let ext = Path::new(filename_hint)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::UnsupportedType(if ext.is_empty() {
            "no extension".to_owned()
        } else {
            ext
        }))
    }
}

/// Fresh collision-free relative name, `images/<uuid>.<ext>`.
#[must_use]
pub fn generate_name(ext: &str) -> String {
    format!("images/{}.{ext}", Uuid::new_v4().simple())
}

/// MIME type for an allowed extension.
#[must_use]
pub fn content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Shared upload checks: non-empty body and an allowed extension.
fn validate_upload(bytes: &Bytes, filename_hint: &str) -> Result<String, StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    image_extension(filename_hint)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("Photo.JPG").unwrap(), "jpg");
        assert_eq!(image_extension("box.webp").unwrap(), "webp");
        assert!(matches!(
            image_extension("notes.txt"),
            Err(StorageError::UnsupportedType(ref e)) if e == "txt"
        ));
        assert!(matches!(
            image_extension("README"),
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_generate_name_is_unique() {
        let a = generate_name("png");
        let b = generate_name("png");
        assert_ne!(a, b);
        assert!(a.starts_with("images/"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("jpeg"), "image/jpeg");
        assert_eq!(content_type("png"), "image/png");
    }

    #[test]
    fn test_validate_upload_rejects_empty() {
        assert!(matches!(
            validate_upload(&Bytes::new(), "a.png"),
            Err(StorageError::Empty)
        ));
    }

    #[test]
    fn test_client_errors() {
        assert!(StorageError::Empty.is_client_error());
        assert!(!StorageError::ObjectStore("boom".into()).is_client_error());
    }
}
