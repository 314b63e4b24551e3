//! In-memory blob store for tests.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::{content_hash, BlobStore, StoredBlob};

/// Blob store backed by a map. Public URLs use a fake `memory://` scheme.
#[derive(Default)]
pub struct MemBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StoredBlob> {
        let hash = content_hash(&data);
        let size_bytes = data.len() as u64;
        self.objects.lock().await.insert(key.to_string(), data);
        Ok(StoredBlob {
            key: key.to_string(),
            url: format!("memory://{key}"),
            content_hash: hash,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemBlobStore::new();
        let blob = store
            .put("projects/1/audio/x.mp3", b"bytes".to_vec(), "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(blob.url, "memory://projects/1/audio/x.mp3");
        assert_eq!(blob.size_bytes, 5);
        assert_eq!(store.get("projects/1/audio/x.mp3").await.unwrap(), b"bytes");
        assert!(store.exists("projects/1/audio/x.mp3").await.unwrap());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = MemBlobStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
