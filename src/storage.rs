use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::async_trait;
use bytes::Bytes;

/// Seam over the file store so handlers never touch the filesystem directly.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    async fn get(&self, name: &str) -> anyhow::Result<Option<Bytes>>;
    async fn delete(&self, name: &str) -> anyhow::Result<()>;
}

/// Disk-backed store rooted at the configured upload directory.
#[derive(Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub async fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    // Stored names are generated by us (uuid.ext); reject anything that could
    // escape the root if a caller ever passes a raw path through.
    fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            anyhow::bail!("invalid stored file name: {name}");
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl Storage for DiskStorage {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> anyhow::Result<Option<Bytes>> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete(&self, name: &str) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

/// In-memory store used by unit tests.
#[derive(Default)]
pub struct MemoryStorage {
    files: std::sync::Mutex<std::collections::HashMap<String, Bytes>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        self.files
            .lock()
            .expect("storage lock")
            .insert(name.to_string(), body);
        Ok(())
    }

    async fn get(&self, name: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.files.lock().expect("storage lock").get(name).cloned())
    }

    async fn delete(&self, name: &str) -> anyhow::Result<()> {
        self.files.lock().expect("storage lock").remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_storage_put_get_delete() {
        let store = MemoryStorage::default();
        store.put("a.pdf", Bytes::from_static(b"%PDF")).await.unwrap();
        assert_eq!(
            store.get("a.pdf").await.unwrap(),
            Some(Bytes::from_static(b"%PDF"))
        );
        store.delete("a.pdf").await.unwrap();
        assert_eq!(store.get("a.pdf").await.unwrap(), None);
    }

    #[tokio::test]
    async fn disk_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("docshare-test-{}", uuid::Uuid::new_v4()));
        let store = DiskStorage::new(&dir).await.unwrap();

        store.put("f.txt", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(
            store.get("f.txt").await.unwrap(),
            Some(Bytes::from_static(b"hello"))
        );

        store.delete("f.txt").await.unwrap();
        assert_eq!(store.get("f.txt").await.unwrap(), None);
        // deleting twice is not an error
        store.delete("f.txt").await.unwrap();

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn disk_storage_rejects_path_traversal() {
        let dir = std::env::temp_dir().join(format!("docshare-test-{}", uuid::Uuid::new_v4()));
        let store = DiskStorage::new(&dir).await.unwrap();
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("a/b.txt", Bytes::new()).await.is_err());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn disk_storage_get_missing_is_none() {
        let dir = std::env::temp_dir().join(format!("docshare-test-{}", uuid::Uuid::new_v4()));
        let store = DiskStorage::new(&dir).await.unwrap();
        assert_eq!(store.get("nope.pdf").await.unwrap(), None);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
