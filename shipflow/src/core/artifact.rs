//! Run-scoped build artifacts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named, immutable binary output produced by exactly one stage.
///
/// Artifacts are written once into the run's [`crate::store::ArtifactStore`]
/// and read any number of times by later stages. The payload is opaque to
/// the core: a compiled binary, a bundle archive, or a small capability
/// handle such as the release upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// The artifact name, unique within a run.
    pub name: String,

    /// The opaque payload bytes.
    pub payload: Vec<u8>,

    /// The name of the stage that produced this artifact.
    pub producer: String,

    /// The platform classifier, for per-target outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Hex-encoded SHA-256 digest of the payload.
    pub digest: String,
}

impl Artifact {
    /// Creates a new artifact, computing the payload digest.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Vec<u8>, producer: impl Into<String>) -> Self {
        let digest = hex::encode(Sha256::digest(&payload));
        Self {
            name: name.into(),
            payload,
            producer: producer.into(),
            platform: None,
            digest,
        }
    }

    /// Sets the platform classifier.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
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

    /// Interprets the payload as UTF-8 text.
    ///
    /// Used for small capability handles stored as artifacts.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_creation() {
        let artifact = Artifact::new("app-x86_64-unknown-linux-musl", b"\x7fELF".to_vec(), "build:x86_64-unknown-linux-musl")
            .with_platform("x86_64-unknown-linux-musl");

        assert_eq!(artifact.name, "app-x86_64-unknown-linux-musl");
        assert_eq!(artifact.producer, "build:x86_64-unknown-linux-musl");
        assert_eq!(artifact.platform.as_deref(), Some("x86_64-unknown-linux-musl"));
        assert_eq!(artifact.len(), 4);
    }

    #[test]
    fn test_digest_is_stable() {
        let a = Artifact::new("a", b"same bytes".to_vec(), "s1");
        let b = Artifact::new("b", b"same bytes".to_vec(), "s2");
        let c = Artifact::new("c", b"other bytes".to_vec(), "s3");

        assert_eq!(a.digest, b.digest);
        assert_ne!(a.digest, c.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_as_text() {
        let handle = Artifact::new("endpoint", b"https://uploads.example/rel-1".to_vec(), "gate");
        assert_eq!(handle.as_text(), Some("https://uploads.example/rel-1"));

        let binary = Artifact::new("bin", vec![0xff, 0xfe], "build");
        assert_eq!(binary.as_text(), None);
    }
}
