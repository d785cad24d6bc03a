//! Packaged release assets.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A final distributable asset, derived from a raw artifact by the
/// packaging policy.
///
/// Assets are produced deterministically (same artifact and classifier give
/// the same bytes) and live only for the duration of the publish stage that
/// uploads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagedAsset {
    /// The asset file name as it appears on the release.
    pub name: String,

    /// The MIME content type for the upload.
    pub content_type: String,

    /// The packaged payload bytes.
    pub payload: Vec<u8>,

    /// Hex-encoded SHA-256 digest of the packaged payload.
    pub digest: String,
}

impl PackagedAsset {
    /// Creates a new packaged asset, computing the payload digest.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        let digest = hex::encode(Sha256::digest(&payload));
        Self {
            name: name.into(),
            content_type: content_type.into(),
            payload,
            digest,
        }
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_creation() {
        let asset = PackagedAsset::new("app-v1.gz", "application/octet-stream", vec![1, 2, 3]);
        assert_eq!(asset.name, "app-v1.gz");
        assert_eq!(asset.content_type, "application/octet-stream");
        assert_eq!(asset.len(), 3);
        assert_eq!(asset.digest.len(), 64);
    }

    #[test]
    fn test_digest_tracks_payload() {
        let a = PackagedAsset::new("x", "application/octet-stream", vec![1]);
        let b = PackagedAsset::new("y", "application/octet-stream", vec![1]);
        assert_eq!(a.digest, b.digest);
    }
}
