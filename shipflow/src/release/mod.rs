//! The release gate and the external release-hosting collaborator.

use crate::context::RunContext;
use crate::core::{Artifact, PackagedAsset, Release, ReleaseRequest};
use crate::errors::ShipflowError;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Artifact key under which the gate publishes the upload-endpoint handle.
///
/// Publish stages fetch the handle through the artifact store exactly like
/// any build output, which also gives them the happens-before edge on the
/// gate's terminal status for free.
pub const UPLOAD_ENDPOINT_ARTIFACT: &str = "release.upload-endpoint";

/// External release-hosting collaborator.
///
/// Implementations talk to whatever service stores releases. The core never
/// retries these calls; retry is the caller's policy.
#[async_trait]
pub trait ReleaseHost: Send + Sync {
    /// Creates a release record for a tag and returns it together with its
    /// upload-endpoint capability.
    ///
    /// # Errors
    ///
    /// Any failure of the external call.
    async fn create_release(&self, request: &ReleaseRequest) -> Result<Release, ShipflowError>;

    /// Uploads a packaged asset against an upload endpoint.
    ///
    /// Implementations must reject a second upload with the same name
    /// against the same endpoint rather than overwriting it.
    ///
    /// # Errors
    ///
    /// Any failure of the external call, including name collisions.
    async fn upload_asset(
        &self,
        endpoint: &str,
        asset: &PackagedAsset,
    ) -> Result<(), ShipflowError>;
}

/// Idempotent, exactly-once release creation keyed by tag.
///
/// The gate outlives individual pipeline runs: a redelivered trigger event
/// reaches the same gate and gets the already-created release back instead
/// of a duplicate.
pub struct ReleaseGate {
    host: Arc<dyn ReleaseHost>,
    // Held across the create call so concurrent ensure_release calls for
    // the same tag serialize instead of racing the host.
    created: tokio::sync::Mutex<HashMap<String, Release>>,
}

impl std::fmt::Debug for ReleaseGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseGate").finish_non_exhaustive()
    }
}

impl ReleaseGate {
    /// Creates a gate over a release host.
    #[must_use]
    pub fn new(host: Arc<dyn ReleaseHost>) -> Self {
        Self {
            host,
            created: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the release for a tag, creating it on first call.
    ///
    /// A second call with the same tag returns the stored release unchanged;
    /// no second creation call reaches the host.
    ///
    /// # Errors
    ///
    /// Propagates the host's failure; nothing is cached on error.
    pub async fn ensure_release(
        &self,
        request: &ReleaseRequest,
    ) -> Result<Release, ShipflowError> {
        let mut created = self.created.lock().await;

        if let Some(release) = created.get(&request.tag) {
            info!(tag = %request.tag, release_id = %release.id, "release already exists, reusing");
            return Ok(release.clone());
        }

        let release = self.host.create_release(request).await?;
        info!(tag = %request.tag, release_id = %release.id, "release created");
        created.insert(request.tag.clone(), release.clone());
        Ok(release)
    }
}

/// The gate stage driver: ensures the release exists and publishes its
/// upload endpoint into the artifact store.
#[derive(Debug)]
pub struct GateStage {
    name: String,
    request: ReleaseRequest,
    gate: Arc<ReleaseGate>,
}

impl GateStage {
    /// Creates the gate stage for a tag.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: impl Into<String>, gate: Arc<ReleaseGate>) -> Self {
        Self {
            name: name.into(),
            request: ReleaseRequest::new(tag),
            gate,
        }
    }
}

#[async_trait]
impl Stage for GateStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let release = match self.gate.ensure_release(&self.request).await {
            Ok(release) => release,
            Err(e) => {
                warn!(tag = %self.request.tag, error = %e, "release creation failed");
                return StageOutcome::fail(e.to_string());
            }
        };

        ctx.record_release(release.clone());

        let handle = Artifact::new(
            UPLOAD_ENDPOINT_ARTIFACT,
            release.upload_endpoint.into_bytes(),
            &self.name,
        );
        StageOutcome::from_result(ctx.artifacts().put(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run_context, InMemoryReleaseHost};

    #[tokio::test]
    async fn test_ensure_release_is_idempotent() {
        let host = Arc::new(InMemoryReleaseHost::new());
        let gate = ReleaseGate::new(host.clone());
        let request = ReleaseRequest::new("v1.2.3");

        let first = gate.ensure_release(&request).await.unwrap();
        let second = gate.ensure_release(&request).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(host.create_call_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_tags_create_distinct_releases() {
        let host = Arc::new(InMemoryReleaseHost::new());
        let gate = ReleaseGate::new(host.clone());

        let a = gate.ensure_release(&ReleaseRequest::new("v1.0.0")).await.unwrap();
        let b = gate.ensure_release(&ReleaseRequest::new("v2.0.0")).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(host.create_call_count(), 2);
    }

    #[tokio::test]
    async fn test_host_failure_is_not_cached() {
        let host = Arc::new(InMemoryReleaseHost::new());
        let gate = ReleaseGate::new(host.clone());
        let request = ReleaseRequest::new("v1.0.0");

        host.set_fail_create(true);
        assert!(gate.ensure_release(&request).await.is_err());

        host.set_fail_create(false);
        assert!(gate.ensure_release(&request).await.is_ok());
        assert_eq!(host.create_call_count(), 2);
    }

    #[tokio::test]
    async fn test_gate_stage_publishes_endpoint_handle() {
        let (ctx, host) = run_context("app");
        let gate = Arc::new(ReleaseGate::new(host));
        let stage = GateStage::new("create-release", "v1.2.3", gate);

        let outcome = stage.run(&ctx).await;
        assert!(outcome.is_success());

        let handle = ctx.artifacts().try_get(UPLOAD_ENDPOINT_ARTIFACT).unwrap();
        assert!(handle.as_text().unwrap().starts_with("mem://"));
        assert_eq!(ctx.release().unwrap().tag, "v1.2.3");
    }

    #[tokio::test]
    async fn test_gate_stage_fails_when_host_fails() {
        let (ctx, host) = run_context("app");
        host.set_fail_create(true);

        let gate = Arc::new(ReleaseGate::new(host));
        let stage = GateStage::new("create-release", "v1.2.3", gate);

        let outcome = stage.run(&ctx).await;
        assert!(!outcome.is_success());
        assert!(ctx.release().is_none());
        assert!(ctx.artifacts().try_get(UPLOAD_ENDPOINT_ARTIFACT).is_none());
    }
}
