//! Shared run context threaded through every stage.

use crate::core::Release;
use crate::policy::PackagingPolicy;
use crate::release::ReleaseHost;
use crate::store::ArtifactStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Commit metadata handed to every build command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// The commit hash the tag points at.
    pub hash: String,
    /// The commit date, preformatted by the trigger source.
    pub date: String,
}

impl CommitInfo {
    /// Creates commit info.
    #[must_use]
    pub fn new(hash: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            date: date.into(),
        }
    }
}

/// The per-run context shared by all stages.
///
/// Holds the run identity, the product/commit parameters, and handles to the
/// shared collaborators: the artifact store, the packaging policy, and the
/// release host. The context itself is immutable apart from the release
/// slot, which the gate stage fills exactly once.
pub struct RunContext {
    run_id: Uuid,
    product: String,
    commit: CommitInfo,
    artifacts: Arc<ArtifactStore>,
    policy: Arc<PackagingPolicy>,
    host: Arc<dyn ReleaseHost>,
    release: Mutex<Option<Release>>,
    started_at: DateTime<Utc>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("product", &self.product)
            .field("commit", &self.commit)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Creates a new run context.
    #[must_use]
    pub fn new(
        product: impl Into<String>,
        commit: CommitInfo,
        host: Arc<dyn ReleaseHost>,
        policy: Arc<PackagingPolicy>,
        artifacts: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            product: product.into(),
            commit,
            artifacts,
            policy,
            host,
            release: Mutex::new(None),
            started_at: Utc::now(),
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the product name used in artifact naming.
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Returns the commit metadata for this run.
    #[must_use]
    pub fn commit(&self) -> &CommitInfo {
        &self.commit
    }

    /// Returns the run's artifact store.
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Returns the packaging policy.
    #[must_use]
    pub fn policy(&self) -> &PackagingPolicy {
        &self.policy
    }

    /// Returns the release host collaborator.
    #[must_use]
    pub fn host(&self) -> &dyn ReleaseHost {
        self.host.as_ref()
    }

    /// Returns when the run started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Records the release created by the gate stage.
    pub fn record_release(&self, release: Release) {
        *self.release.lock() = Some(release);
    }

    /// Returns the release, if the gate has created one.
    #[must_use]
    pub fn release(&self) -> Option<Release> {
        self.release.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let (ctx, _host) = crate::testing::run_context("app");

        assert_eq!(ctx.product(), "app");
        assert!(ctx.release().is_none());
        assert!(ctx.artifacts().is_empty());
    }

    #[test]
    fn test_release_slot() {
        let (ctx, _host) = crate::testing::run_context("app");

        ctx.record_release(Release {
            id: "rel-1".to_string(),
            tag: "v1.0.0".to_string(),
            draft: false,
            prerelease: false,
            upload_endpoint: "mem://rel-1".to_string(),
        });

        assert_eq!(ctx.release().map(|r| r.id), Some("rel-1".to_string()));
    }
}
