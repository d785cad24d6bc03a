//! The build stage driver and the external build-command boundary.

use crate::context::RunContext;
use crate::core::Artifact;
use crate::policy;
use crate::stages::{Stage, StageOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment inputs handed to the external build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInputs {
    /// The commit hash being built.
    pub commit_hash: String,
    /// The commit date being built.
    pub commit_date: String,
    /// The target triple or bundle classifier.
    pub target: String,
}

/// External cross-compilation collaborator.
///
/// The core treats a build as an opaque command: invoked once per target, it
/// either yields the produced binary/bundle bytes or fails. Toolchains, SDK
/// provisioning, and the compilation itself live behind this trait.
#[async_trait]
pub trait BuildCommand: Send + Sync {
    /// Runs the build for one target.
    ///
    /// # Errors
    ///
    /// Any failure of the external command.
    async fn run(&self, inputs: &BuildInputs) -> anyhow::Result<Vec<u8>>;
}

/// One leg of the build matrix: runs the external command for its target
/// and stores the output under the conventional artifact name.
pub struct BuildStage {
    name: String,
    target: String,
    command: Arc<dyn BuildCommand>,
}

impl std::fmt::Debug for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildStage")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl BuildStage {
    /// Creates a build stage for a target.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        command: Arc<dyn BuildCommand>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            command,
        }
    }
}

#[async_trait]
impl Stage for BuildStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let artifact_name = match policy::artifact_name(ctx.product(), &self.target) {
            Ok(name) => name,
            Err(e) => return StageOutcome::fail(e.to_string()),
        };

        let inputs = BuildInputs {
            commit_hash: ctx.commit().hash.clone(),
            commit_date: ctx.commit().date.clone(),
            target: self.target.clone(),
        };

        let payload = match self.command.run(&inputs).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target = %self.target, error = %e, "build command failed");
                return StageOutcome::fail(format!(
                    "build command failed for target '{}': {e}",
                    self.target
                ));
            }
        };

        debug!(
            target = %self.target,
            artifact = %artifact_name,
            bytes = payload.len(),
            "build produced artifact"
        );

        let artifact =
            Artifact::new(artifact_name, payload, &self.name).with_platform(&self.target);
        StageOutcome::from_result(ctx.artifacts().put(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run_context, ScriptedBuildCommand, StaticBuildCommand};

    #[tokio::test]
    async fn test_build_stores_named_artifact() {
        let (ctx, _host) = run_context("app");
        let stage = BuildStage::new(
            "build:x86_64-unknown-linux-musl",
            "x86_64-unknown-linux-musl",
            Arc::new(StaticBuildCommand::new()),
        );

        let outcome = stage.run(&ctx).await;
        assert!(outcome.is_success());

        let artifact = ctx
            .artifacts()
            .try_get("app-x86_64-unknown-linux-musl")
            .unwrap();
        assert_eq!(artifact.platform.as_deref(), Some("x86_64-unknown-linux-musl"));
        assert_eq!(artifact.producer, "build:x86_64-unknown-linux-musl");
    }

    #[tokio::test]
    async fn test_bundle_targets_use_bundle_names() {
        let (ctx, _host) = run_context("app");
        let stage = BuildStage::new(
            "build:apple-universal",
            crate::policy::APPLE_BUNDLE,
            Arc::new(StaticBuildCommand::new()),
        );

        assert!(stage.run(&ctx).await.is_success());
        assert!(ctx.artifacts().contains("app.xcframework.zip"));
    }

    #[tokio::test]
    async fn test_failing_command_fails_stage() {
        let (ctx, _host) = run_context("app");
        let command =
            ScriptedBuildCommand::failing_targets(["aarch64-unknown-linux-musl"]);
        let stage = BuildStage::new(
            "build:aarch64-unknown-linux-musl",
            "aarch64-unknown-linux-musl",
            Arc::new(command),
        );

        let outcome = stage.run(&ctx).await;
        assert!(!outcome.is_success());
        assert!(ctx.artifacts().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_artifact_fails_stage() {
        let (ctx, _host) = run_context("app");
        let stage = BuildStage::new(
            "build:x86_64-unknown-linux-musl",
            "x86_64-unknown-linux-musl",
            Arc::new(StaticBuildCommand::new()),
        );

        assert!(stage.run(&ctx).await.is_success());
        let second = stage.run(&ctx).await;
        assert!(second.error().unwrap_or_default().contains("duplicate artifact"));
    }
}
