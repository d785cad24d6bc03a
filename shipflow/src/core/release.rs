//! Release records and creation requests.

use serde::{Deserialize, Serialize};

/// A published release record, created at most once per tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Identifier assigned by the release host.
    pub id: String,

    /// The version tag the release was created for (e.g. `v1.2.3`).
    pub tag: String,

    /// Whether the release is a draft.
    pub draft: bool,

    /// Whether the release is marked as a prerelease.
    pub prerelease: bool,

    /// Opaque capability string authorizing asset uploads for this release.
    pub upload_endpoint: String,
}

/// Parameters for creating a release on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    /// The version tag to release.
    pub tag: String,

    /// Create as a draft release.
    pub draft: bool,

    /// Mark as a prerelease.
    pub prerelease: bool,
}

impl ReleaseRequest {
    /// Creates a request for a normal (non-draft, non-prerelease) release.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            draft: false,
            prerelease: false,
        }
    }

    /// Marks the release as a draft.
    #[must_use]
    pub fn draft(mut self) -> Self {
        self.draft = true;
        self
    }

    /// Marks the release as a prerelease.
    #[must_use]
    pub fn prerelease(mut self) -> Self {
        self.prerelease = true;
        self
    }
}
