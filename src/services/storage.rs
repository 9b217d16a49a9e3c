use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Read access to stored stamp images.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn read(&self, image_path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Images kept on local disk under a public root, addressed by web paths
/// such as `/uploads/1700000000-abc-stamp.jpg`.
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a web path onto the filesystem, refusing anything that escapes the root.
    pub fn resolve(&self, image_path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(image_path.trim_start_matches('/'));
        let escapes = relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        if escapes {
            return Err(StorageError::InvalidPath(image_path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageSource for LocalImageStore {
    async fn read(&self, image_path: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(image_path)?;
        tokio::fs::read(&path).await.map_err(|source| StorageError::Read {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    #[error("Failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strips_leading_slash() {
        let store = LocalImageStore::new("/srv/public");
        let path = store.resolve("/uploads/a.jpg").unwrap();
        assert_eq!(path, PathBuf::from("/srv/public/uploads/a.jpg"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = LocalImageStore::new("/srv/public");
        assert!(store.resolve("/uploads/../../etc/passwd").is_err());
        assert!(store.resolve("").is_err());
        assert!(store.resolve("/").is_err());
    }

    #[tokio::test]
    async fn test_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/stamp.png"), b"png-bytes").unwrap();

        let store = LocalImageStore::new(dir.path());
        assert_eq!(store.read("/uploads/stamp.png").await.unwrap(), b"png-bytes");

        let missing = store.read("/uploads/none.png").await;
        assert!(matches!(missing, Err(StorageError::Read { .. })));
    }
}
