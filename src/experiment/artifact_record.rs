//! Artifact Record - content-addressed files stored with a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Artifact Record represents a file stored under a run.
///
/// The `key` is the artifact's path relative to the run's `artifacts/`
/// directory. The `cas_hash` identifies the content.
///
/// ## CAS Hash Format
///
/// The `cas_hash` follows the format: `algorithm:hex_digest`, e.g.
/// `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Artifact path (e.g., "model/model.json")
    /// * `cas_hash` - Content-addressable hash (e.g., "sha256:abc123")
    /// * `size_bytes` - Size of the artifact in bytes
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Create a record describing `bytes`, hashing them with SHA-256.
    #[must_use]
    pub fn for_bytes(run_id: impl Into<String>, key: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(run_id, key, sha256_hash(bytes), bytes.len() as u64)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// `sha256:<hex>` digest of `bytes`.
#[must_use]
pub fn sha256_hash(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_record_new() {
        let artifact = ArtifactRecord::new("run-1", "model/model.json", "sha256:abc123", 1000);
        assert_eq!(artifact.run_id(), "run-1");
        assert_eq!(artifact.key(), "model/model.json");
        assert_eq!(artifact.cas_hash(), "sha256:abc123");
        assert_eq!(artifact.size_bytes(), 1000);
    }

    #[test]
    fn test_artifact_for_bytes_hashes_content() {
        let artifact = ArtifactRecord::for_bytes("run-1", "empty.bin", b"");
        assert_eq!(
            artifact.cas_hash(),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(artifact.size_bytes(), 0);
    }
}
