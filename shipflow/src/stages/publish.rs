//! The publish stage driver: package one target's artifact and upload it.

use crate::context::RunContext;
use crate::policy;
use crate::release::UPLOAD_ENDPOINT_ARTIFACT;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use tracing::{info, warn};

/// One leg of the publish matrix.
///
/// Fetches the built artifact and the upload-endpoint handle from the
/// artifact store (suspending until both producers are terminal), applies
/// the packaging policy, and uploads the resulting asset. Packaging is pure,
/// so a retried publish leg repeats identical work up to the upload step.
#[derive(Debug)]
pub struct PublishStage {
    name: String,
    target: String,
}

impl PublishStage {
    /// Creates a publish stage for a target.
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl Stage for PublishStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let artifact_name = match policy::artifact_name(ctx.product(), &self.target) {
            Ok(name) => name,
            Err(e) => return StageOutcome::fail(e.to_string()),
        };

        let artifact = match ctx.artifacts().get(&artifact_name).await {
            Ok(artifact) => artifact,
            Err(e) => return StageOutcome::fail(e.to_string()),
        };

        let endpoint = match ctx.artifacts().get(UPLOAD_ENDPOINT_ARTIFACT).await {
            Ok(handle) => match handle.as_text() {
                Some(endpoint) => endpoint.to_string(),
                None => {
                    return StageOutcome::fail("upload endpoint handle is not valid UTF-8")
                }
            },
            Err(e) => return StageOutcome::fail(e.to_string()),
        };

        let asset = match ctx.policy().package(&self.target, &artifact) {
            Ok(asset) => asset,
            Err(e) => return StageOutcome::fail(e.to_string()),
        };

        match ctx.host().upload_asset(&endpoint, &asset).await {
            Ok(()) => {
                info!(
                    target = %self.target,
                    asset = %asset.name,
                    bytes = asset.len(),
                    digest = %asset.digest,
                    "asset uploaded"
                );
                StageOutcome::ok()
            }
            Err(e) => {
                warn!(target = %self.target, asset = %asset.name, error = %e, "upload failed");
                StageOutcome::fail(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Artifact, StageStatus};
    use crate::testing::run_context;

    fn seed_endpoint(ctx: &crate::context::RunContext, endpoint: &str) {
        ctx.artifacts()
            .put(Artifact::new(
                UPLOAD_ENDPOINT_ARTIFACT,
                endpoint.as_bytes().to_vec(),
                "create-release",
            ))
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_uploads_packaged_asset() {
        let (ctx, host) = run_context("app");
        ctx.artifacts()
            .put(
                Artifact::new(
                    "app-x86_64-unknown-linux-musl",
                    b"binary".to_vec(),
                    "build:x86_64-unknown-linux-musl",
                )
                .with_platform("x86_64-unknown-linux-musl"),
            )
            .unwrap();
        seed_endpoint(&ctx, "mem://rel-1");

        let stage =
            PublishStage::new("publish:x86_64-unknown-linux-musl", "x86_64-unknown-linux-musl");
        let outcome = stage.run(&ctx).await;

        assert!(outcome.is_success());
        assert_eq!(
            host.uploaded_asset_names("mem://rel-1"),
            vec!["app-x86_64-unknown-linux-musl.gz".to_string()]
        );
    }

    #[tokio::test]
    async fn test_publish_fails_when_build_failed() {
        let (ctx, _host) = run_context("app");
        ctx.artifacts()
            .expect("app-x86_64-unknown-linux-musl", "build:x86_64-unknown-linux-musl")
            .unwrap();
        ctx.artifacts()
            .seal_stage("build:x86_64-unknown-linux-musl", StageStatus::Failed);
        seed_endpoint(&ctx, "mem://rel-1");

        let stage =
            PublishStage::new("publish:x86_64-unknown-linux-musl", "x86_64-unknown-linux-musl");
        let outcome = stage.run(&ctx).await;

        assert!(outcome.error().unwrap_or_default().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_duplicate_upload_is_rejected() {
        let (ctx, _host) = run_context("app");
        ctx.artifacts()
            .put(
                Artifact::new(
                    "app-x86_64-unknown-linux-musl",
                    b"binary".to_vec(),
                    "build:x86_64-unknown-linux-musl",
                )
                .with_platform("x86_64-unknown-linux-musl"),
            )
            .unwrap();
        seed_endpoint(&ctx, "mem://rel-1");

        let stage =
            PublishStage::new("publish:x86_64-unknown-linux-musl", "x86_64-unknown-linux-musl");

        assert!(stage.run(&ctx).await.is_success());
        let second = stage.run(&ctx).await;
        assert!(second.error().unwrap_or_default().contains("duplicate asset"));
    }
}
