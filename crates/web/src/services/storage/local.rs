//! Local filesystem storage backend.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::{StorageBackend, StorageError, generate_name, validate_upload};

/// URL prefix the upload directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Stores files below a root directory.
///
/// References are `/`-separated paths relative to the root.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Open (and create if needed) the storage root.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `reference`, refusing anything that could
    /// escape the root.
    fn resolve(&self, reference: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidReference(reference.to_owned());

        if reference.is_empty() || reference.contains('\\') {
            return Err(invalid());
        }
        let relative = Path::new(reference);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(invalid());
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn store(&self, bytes: Bytes, filename_hint: &str) -> Result<String, StorageError> {
        let ext = validate_upload(&bytes, filename_hint)?;
        let reference = generate_name(&ext);
        let path = self.resolve(&reference)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        tracing::debug!(reference = %reference, size = bytes.len(), "Stored file locally");
        Ok(reference)
    }

    fn retrieve_url(&self, reference: &str) -> Result<String, StorageError> {
        self.resolve(reference)?;
        Ok(format!("{UPLOADS_URL_PREFIX}/{reference}"))
    }

    async fn delete(&self, reference: &str) -> Result<(), StorageError> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(reference = %reference, "Deleted local file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, reference: &str) -> Result<bool, StorageError> {
        let path = self.resolve(reference)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().join("uploads")).await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_store_retrieve_delete() {
        let (_dir, storage) = storage().await;

        let reference = storage
            .store(Bytes::from_static(b"\x89PNG fake"), "box.PNG")
            .await
            .unwrap();
        assert!(reference.starts_with("images/"));
        assert!(reference.ends_with(".png"));
        assert!(storage.exists(&reference).await.unwrap());

        let on_disk = tokio::fs::read(storage.root().join(&reference)).await.unwrap();
        assert_eq!(on_disk, b"\x89PNG fake");

        assert_eq!(
            storage.retrieve_url(&reference).unwrap(),
            format!("/uploads/{reference}")
        );

        storage.delete(&reference).await.unwrap();
        assert!(!storage.exists(&reference).await.unwrap());
        // Deleting again is fine
        storage.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_bad_uploads() {
        let (_dir, storage) = storage().await;

        assert!(matches!(
            storage.store(Bytes::new(), "a.png").await,
            Err(StorageError::Empty)
        ));
        assert!(matches!(
            storage.store(Bytes::from_static(b"MZ"), "setup.exe").await,
            Err(StorageError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escaping_references() {
        let (_dir, storage) = storage().await;

        for reference in ["../secret.png", "/etc/passwd", "images\\a.png", "", "images/../../x"] {
            assert!(
                matches!(
                    storage.delete(reference).await,
                    Err(StorageError::InvalidReference(_))
                ),
                "{reference} should be rejected"
            );
        }
    }
}
