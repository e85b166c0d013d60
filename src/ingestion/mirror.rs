//! Optional object-store mirroring behind a pluggable blob port. Mirror
//! failures are logged and never fail the pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{FiscalOpsError, Result};

/// Key layout shared with the UI's document resolver.
pub fn mirror_key(source_key: &str, md5: &str, filename: &str) -> String {
    let prefix = &md5[..md5.len().min(2)];
    format!("documents/{source_key}/{prefix}/{md5}/{filename}")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn head(&self, key: &str) -> Result<bool>;
    async fn put(&self, key: &str, file: &Path, content_type: Option<&str>) -> Result<()>;
    async fn presign(&self, key: &str, ttl_secs: u64) -> Result<String>;
}

/// Filesystem-backed blob store. Stands in for an object store in
/// single-node deployments and in tests; the S3 adapter lives behind the
/// same trait in the deployment repo.
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    pub fn new(root: &Path, bucket: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            bucket: bucket.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn head(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).exists())
    }

    async fn put(&self, key: &str, file: &Path, _content_type: Option<&str>) -> Result<()> {
        let target = self.path_for(key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(file, &target).await?;
        Ok(())
    }

    async fn presign(&self, key: &str, _ttl_secs: u64) -> Result<String> {
        let target = self.path_for(key);
        if !target.exists() {
            return Err(FiscalOpsError::internal(format!(
                "no mirrored object for key {key} in bucket {}",
                self.bucket
            )));
        }
        Ok(format!("file://{}", target.display()))
    }
}

/// Pipeline-facing wrapper; `None` disables mirroring entirely.
#[derive(Clone, Default)]
pub struct Mirror {
    store: Option<Arc<dyn BlobStore>>,
}

impl Mirror {
    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Upload if absent; returns the mirror key on success, `None` when
    /// disabled or on failure.
    pub async fn mirror_file(
        &self,
        file_path: &Path,
        md5: &str,
        source_key: &str,
        content_type: Option<&str>,
    ) -> Option<String> {
        let store = self.store.as_ref()?;
        let filename = file_path.file_name()?.to_string_lossy().to_string();
        let key = mirror_key(source_key, md5, &filename);

        match store.head(&key).await {
            Ok(true) => {
                debug!(key = %key, "mirror object already present");
                return Some(key);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(key = %key, error = %err, "mirror head check failed");
                return None;
            }
        }

        match store.put(&key, file_path, content_type).await {
            Ok(()) => Some(key),
            Err(err) => {
                warn!(key = %key, error = %err, "mirror upload failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_key_layout() {
        let key = mirror_key("treasury", "a1b2c3d4", "doc.pdf");
        assert_eq!(key, "documents/treasury/a1/a1b2c3d4/doc.pdf");
    }

    #[tokio::test]
    async fn test_fs_store_put_head_presign() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.pdf");
        std::fs::write(&source, b"pdf bytes").unwrap();

        let store = FsBlobStore::new(dir.path(), "test-bucket");
        let key = mirror_key("cob", "deadbeef", "source.pdf");

        assert!(!store.head(&key).await.unwrap());
        store.put(&key, &source, Some("application/pdf")).await.unwrap();
        assert!(store.head(&key).await.unwrap());

        let url = store.presign(&key, 3600).await.unwrap();
        assert!(url.starts_with("file://"));
    }

    #[tokio::test]
    async fn test_disabled_mirror_is_noop() {
        let mirror = Mirror::disabled();
        let result = mirror
            .mirror_file(Path::new("/tmp/whatever.pdf"), "md5", "oag", None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_mirror_reuses_existing_object() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.pdf");
        std::fs::write(&source, b"x").unwrap();

        let mirror = Mirror::new(Arc::new(FsBlobStore::new(dir.path(), "bucket")));
        let first = mirror.mirror_file(&source, "cafe", "oag", None).await.unwrap();
        let second = mirror.mirror_file(&source, "cafe", "oag", None).await.unwrap();
        assert_eq!(first, second);
    }
}
