use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use herbsight_shared::types::extension_for_mime;
use herbsight_store::StoredFile;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// Verify that a resolved path stays within the expected base directory.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ServerError> {
    // target may not exist yet, so only the base is canonicalized
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target.strip_prefix(base).unwrap_or(target).components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            Component::ParentDir => {
                return Err(ServerError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {}
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ServerError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

/// Uploaded images on disk, one file per upload named `<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
    max_size: usize,
}

impl FileStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::FileStorage(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "File store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Write an image and return its metadata. Only `image/*` types with a
    /// known extension are accepted.
    pub async fn store_file(
        &self,
        data: &[u8],
        mime_type: &str,
    ) -> Result<StoredFile, ServerError> {
        if !mime_type.starts_with("image/") {
            return Err(ServerError::UnsupportedMedia(mime_type.to_string()));
        }
        let ext = extension_for_mime(mime_type)
            .ok_or_else(|| ServerError::UnsupportedMedia(mime_type.to_string()))?;
        if data.is_empty() {
            return Err(ServerError::BadRequest("Empty file".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::FileTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.safe_path(&name)?;

        fs::write(&path, data)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to write {}: {}", name, e)))?;

        debug!(name = %name, size = data.len(), "Stored file");

        Ok(StoredFile {
            name,
            mime_type: mime_type.to_string(),
            file_size: data.len() as i64,
            blake3_hash: blake3::hash(data).to_hex().to_string(),
            created_at: Utc::now(),
        })
    }

    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, ServerError> {
        let path = self.safe_path(name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("file {name}")));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to read {}: {}", name, e)))?;

        debug!(name = %name, size = data.len(), "Read file");
        Ok(data)
    }

    pub async fn delete_file(&self, name: &str) -> Result<(), ServerError> {
        let path = self.safe_path(name)?;

        if !path.exists() {
            return Err(ServerError::NotFound(format!("file {name}")));
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| ServerError::FileStorage(format!("Failed to delete {}: {}", name, e)))?;

        debug!(name = %name, "Deleted file");
        Ok(())
    }

    /// Names come from URLs, so anything that could leave the directory is
    /// rejected before the path is built.
    fn safe_path(&self, name: &str) -> Result<PathBuf, ServerError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ServerError::BadRequest("Path traversal detected".to_string()));
        }
        ensure_within(&self.base_path, &self.base_path.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (FileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().to_path_buf(), 1024).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_read() {
        let (store, _dir) = test_store().await;
        let data = b"\xff\xd8\xff\xe0jpeg-ish";

        let file = store.store_file(data, "image/jpeg").await.unwrap();
        assert!(file.name.ends_with(".jpg"));
        assert_eq!(file.file_size, data.len() as i64);
        assert_eq!(file.blake3_hash, blake3::hash(data).to_hex().to_string());

        assert_eq!(store.read_file(&file.name).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = test_store().await;
        let file = store.store_file(b"png", "image/png").await.unwrap();

        store.delete_file(&file.name).await.unwrap();
        assert!(matches!(
            store.read_file(&file.name).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_images() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.store_file(b"%PDF", "application/pdf").await,
            Err(ServerError::UnsupportedMedia(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.store_file(b"", "image/jpeg").await,
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            store.store_file(&[0u8; 2048], "image/jpeg").await,
            Err(ServerError::FileTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.read_file("../etc/passwd").await.is_err());
        assert!(store.read_file("a/b.jpg").await.is_err());
    }
}
