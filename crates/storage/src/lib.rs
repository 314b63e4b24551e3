//! Blob storage for generated pipeline assets.
//!
//! [`BlobStore`] is the seam: [`S3BlobStore`] talks to any S3-compatible
//! bucket, [`MemBlobStore`] backs the test suites. Keys are built with
//! [`asset_key`] so every stored object carries its content hash and is
//! therefore immutable once written.

mod error;
mod mem;
mod s3;

pub use error::{StorageError, StorageResult};
pub use mem::MemBlobStore;
pub use s3::{S3BlobStore, S3Config};

use sha2::{Digest, Sha256};

/// A stored object: where it lives and how it is addressed publicly.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub url: String,
    pub content_hash: String,
    pub size_bytes: u64,
}

/// Blob storage seam.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under `key`, returning the stored object descriptor.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StoredBlob>;

    /// Download an object's bytes.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Hex-encoded SHA-256 of the content.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Key for a scene asset, content-addressed so re-uploads of identical
/// bytes land on the same object.
pub fn asset_key(project_id: i64, scene_id: i64, kind: &str, hash: &str, ext: &str) -> String {
    format!("projects/{project_id}/scenes/{scene_id}/{kind}/{hash}.{ext}")
}

/// Key for a project-level asset (final video, avatar portrait).
pub fn project_key(project_id: i64, kind: &str, hash: &str, ext: &str) -> String {
    format!("projects/{project_id}/{kind}/{hash}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_hex() {
        let hash = content_hash(b"hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(b"hello"));
        assert_ne!(hash, content_hash(b"world"));
    }

    #[test]
    fn asset_key_embeds_hash_and_kind() {
        let key = asset_key(7, 42, "audio", "abc123", "mp3");
        assert_eq!(key, "projects/7/scenes/42/audio/abc123.mp3");
    }
}
