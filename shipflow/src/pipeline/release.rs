//! The release pipeline: trigger filtering, graph assembly, and run reports.

use super::executor::{ExecutorConfig, FailureMode, StageGraph};
use super::matrix;
use super::spec::StageSpec;
use crate::context::{CommitInfo, RunContext};
use crate::core::{Release, RunStatus, StageKind, StageStatus, TriggerEvent};
use crate::errors::{PipelineValidationError, ShipflowError};
use crate::policy::PackagingPolicy;
use crate::release::{GateStage, ReleaseGate, ReleaseHost, UPLOAD_ENDPOINT_ARTIFACT};
use crate::stages::{BuildCommand, BuildStage, PublishStage};
use crate::store::ArtifactStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the release gate stage.
pub const GATE_STAGE: &str = "create-release";
/// Name of the build matrix group.
pub const BUILD_GROUP: &str = "build";
/// Name of the publish matrix group.
pub const PUBLISH_GROUP: &str = "publish";

/// Summary of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// The run identifier.
    pub run_id: Uuid,
    /// The release tag the run was triggered for.
    pub tag: String,
    /// Overall run outcome.
    pub status: RunStatus,
    /// The release, if the gate created or reused one.
    pub release: Option<Release>,
    /// Terminal status per stage.
    pub stage_statuses: HashMap<String, StageStatus>,
    /// Failure reason per failed stage.
    pub stage_errors: HashMap<String, String>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Total run time in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns the terminal status of a stage.
    #[must_use]
    pub fn stage_status(&self, stage: &str) -> Option<StageStatus> {
        self.stage_statuses.get(stage).copied()
    }
}

/// Builder for [`ReleasePipeline`].
#[derive(Default)]
pub struct ReleasePipelineBuilder {
    product: Option<String>,
    targets: Vec<String>,
    command: Option<Arc<dyn BuildCommand>>,
    host: Option<Arc<dyn ReleaseHost>>,
    policy: Option<Arc<PackagingPolicy>>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for ReleasePipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePipelineBuilder")
            .field("product", &self.product)
            .field("targets", &self.targets)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReleasePipelineBuilder {
    /// Sets the product name used for artifact and asset naming.
    #[must_use]
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Adds a target classifier to the build/publish matrix.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Sets the target matrix.
    #[must_use]
    pub fn targets(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the external build command.
    #[must_use]
    pub fn build_command(mut self, command: Arc<dyn BuildCommand>) -> Self {
        self.command = Some(command);
        self
    }

    /// Sets the release host.
    #[must_use]
    pub fn release_host(mut self, host: Arc<dyn ReleaseHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the packaging policy. Defaults to the standard table.
    #[must_use]
    pub fn packaging_policy(mut self, policy: PackagingPolicy) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Sets the failure propagation mode.
    #[must_use]
    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.config.failure_mode = mode;
        self
    }

    /// Sets the worker-pool size.
    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.config.max_concurrency = limit;
        self
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the product, build command, or release
    /// host is missing, if no target is configured, or if a target repeats.
    pub fn build(self) -> Result<ReleasePipeline, PipelineValidationError> {
        let product = self
            .product
            .ok_or_else(|| PipelineValidationError::new("product name is required"))?;
        let command = self
            .command
            .ok_or_else(|| PipelineValidationError::new("build command is required"))?;
        let host = self
            .host
            .ok_or_else(|| PipelineValidationError::new("release host is required"))?;

        if self.targets.is_empty() {
            return Err(PipelineValidationError::new(
                "at least one target is required",
            ));
        }
        for (i, target) in self.targets.iter().enumerate() {
            if self.targets[..i].contains(target) {
                return Err(PipelineValidationError::new(format!(
                    "target '{target}' is listed more than once"
                )));
            }
        }

        let gate = Arc::new(ReleaseGate::new(host.clone()));
        Ok(ReleasePipeline {
            product,
            targets: self.targets,
            command,
            host,
            gate,
            policy: self.policy.unwrap_or_default(),
            config: self.config,
        })
    }
}

/// The tag-to-release orchestrator.
///
/// One pipeline instance serves many trigger deliveries; each accepted tag
/// gets a fresh run with its own artifact store and context, while the
/// release gate is shared so redelivered tags reuse the existing release.
pub struct ReleasePipeline {
    product: String,
    targets: Vec<String>,
    command: Arc<dyn BuildCommand>,
    host: Arc<dyn ReleaseHost>,
    gate: Arc<ReleaseGate>,
    policy: Arc<PackagingPolicy>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for ReleasePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePipeline")
            .field("product", &self.product)
            .field("targets", &self.targets)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReleasePipeline {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder() -> ReleasePipelineBuilder {
        ReleasePipelineBuilder::default()
    }

    /// Returns the configured targets.
    #[must_use]
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Handles one trigger delivery.
    ///
    /// Non-tag refs and tags that are not release tags (no leading `v`) are
    /// ignored and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only for executor-internal failures; stage failures
    /// are reported through the [`RunReport`].
    pub async fn handle(
        &self,
        trigger: &TriggerEvent,
        commit: CommitInfo,
    ) -> Result<Option<RunReport>, ShipflowError> {
        let Some(tag) = trigger.release_tag() else {
            debug!(git_ref = %trigger.git_ref, "ignoring non-release trigger");
            return Ok(None);
        };

        let tag = tag.to_string();
        self.run_for_tag(&tag, commit).await.map(Some)
    }

    /// Runs the full pipeline for a release tag.
    ///
    /// # Errors
    ///
    /// Returns an error for graph validation or executor-internal failures.
    pub async fn run_for_tag(
        &self,
        tag: &str,
        commit: CommitInfo,
    ) -> Result<RunReport, ShipflowError> {
        let artifacts = Arc::new(ArtifactStore::new());
        let ctx = Arc::new(RunContext::new(
            self.product.clone(),
            commit,
            self.host.clone(),
            self.policy.clone(),
            artifacts,
        ));

        info!(
            run_id = %ctx.run_id(),
            tag,
            targets = self.targets.len(),
            "release run started"
        );

        let graph = self.assemble(tag, ctx.as_ref())?;
        let report = graph.execute(ctx.clone()).await?;

        let release = ctx.release();
        let status = if report.success {
            RunStatus::Succeeded
        } else if release.is_some() {
            // The release exists on the host even though a leg failed; a
            // redelivery of the same tag finishes the remaining uploads.
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };

        info!(
            run_id = %ctx.run_id(),
            tag,
            status = %status,
            duration_ms = report.duration_ms,
            "release run finished"
        );

        Ok(RunReport {
            run_id: ctx.run_id(),
            tag: tag.to_string(),
            status,
            release,
            stage_statuses: report.statuses,
            stage_errors: report.errors,
            started_at: ctx.started_at(),
            duration_ms: report.duration_ms,
        })
    }

    fn assemble(&self, tag: &str, ctx: &RunContext) -> Result<StageGraph, ShipflowError> {
        // Pre-register every producer so readers of a failed or skipped
        // stage's output resolve instead of suspending.
        for target in &self.targets {
            let artifact = crate::policy::artifact_name(ctx.product(), target)?;
            ctx.artifacts()
                .expect(artifact, matrix::instance_name(BUILD_GROUP, target))?;
        }
        ctx.artifacts()
            .expect(UPLOAD_ENDPOINT_ARTIFACT, GATE_STAGE)?;

        let command = self.command.clone();
        let (build_specs, build_group) =
            matrix::expand(BUILD_GROUP, &self.targets, |name, classifier| {
                StageSpec::new(
                    name,
                    StageKind::Build,
                    Arc::new(BuildStage::new(name, classifier, command.clone())),
                )
                .with_target(classifier)
            });

        let gate_spec = StageSpec::new(
            GATE_STAGE,
            StageKind::Gate,
            Arc::new(GateStage::new(GATE_STAGE, tag, self.gate.clone())),
        )
        .with_dependency(BUILD_GROUP);

        let (publish_specs, publish_group) =
            matrix::expand(PUBLISH_GROUP, &self.targets, |name, classifier| {
                StageSpec::new(
                    name,
                    StageKind::Publish,
                    Arc::new(PublishStage::new(name, classifier)),
                )
                .with_target(classifier)
                .with_dependency(GATE_STAGE)
            });

        let mut specs = build_specs;
        specs.push(gate_spec);
        specs.extend(publish_specs);

        Ok(StageGraph::new(
            format!("release:{tag}"),
            specs,
            vec![build_group, publish_group],
            self.config.clone(),
        )?)
    }
}
