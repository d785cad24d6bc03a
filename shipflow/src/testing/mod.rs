//! Test doubles for the external collaborators.
//!
//! Used by the crate's own tests and available to downstream crates that
//! want to exercise pipelines without a real release host or toolchain.

use crate::context::{CommitInfo, RunContext};
use crate::core::{PackagedAsset, Release, ReleaseRequest};
use crate::errors::ShipflowError;
use crate::policy::PackagingPolicy;
use crate::release::ReleaseHost;
use crate::stages::{BuildCommand, BuildInputs, Stage, StageOutcome};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Builds a run context over fresh in-memory collaborators.
///
/// Returns the context together with the host so tests can inspect uploads
/// and inject failures.
#[must_use]
pub fn run_context(product: &str) -> (Arc<RunContext>, Arc<InMemoryReleaseHost>) {
    let host = Arc::new(InMemoryReleaseHost::new());
    let ctx = Arc::new(RunContext::new(
        product,
        CommitInfo::new("0d1f2e3a", "2026-08-27"),
        host.clone(),
        Arc::new(PackagingPolicy::standard()),
        Arc::new(ArtifactStore::new()),
    ));
    (ctx, host)
}

#[derive(Default)]
struct HostState {
    releases: Vec<Release>,
    uploads: Vec<(String, PackagedAsset)>,
}

/// In-memory [`ReleaseHost`] that records every call.
///
/// Upload endpoints look like `mem://rel-1`. A second upload with the same
/// asset name against the same endpoint is rejected, matching real hosts.
#[derive(Default)]
pub struct InMemoryReleaseHost {
    state: Mutex<HostState>,
    create_calls: AtomicUsize,
    fail_create: AtomicBool,
}

impl std::fmt::Debug for InMemoryReleaseHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryReleaseHost")
            .field("create_calls", &self.create_calls.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InMemoryReleaseHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_release` calls fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Returns how many times `create_release` was called.
    #[must_use]
    pub fn create_call_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Returns every release created so far.
    #[must_use]
    pub fn releases(&self) -> Vec<Release> {
        self.state.lock().releases.clone()
    }

    /// Returns the total number of uploaded assets across all endpoints.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Returns the sorted names of assets uploaded against an endpoint.
    #[must_use]
    pub fn uploaded_asset_names(&self, endpoint: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .uploads
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, asset)| asset.name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ReleaseHost for InMemoryReleaseHost {
    async fn create_release(&self, request: &ReleaseRequest) -> Result<Release, ShipflowError> {
        let calls = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ShipflowError::ReleaseHost(
                "simulated create_release failure".to_string(),
            ));
        }

        let release = Release {
            id: format!("rel-{calls}"),
            tag: request.tag.clone(),
            draft: request.draft,
            prerelease: request.prerelease,
            upload_endpoint: format!("mem://rel-{calls}"),
        };
        self.state.lock().releases.push(release.clone());
        Ok(release)
    }

    async fn upload_asset(
        &self,
        endpoint: &str,
        asset: &PackagedAsset,
    ) -> Result<(), ShipflowError> {
        let mut state = self.state.lock();

        if state
            .uploads
            .iter()
            .any(|(e, a)| e == endpoint && a.name == asset.name)
        {
            return Err(ShipflowError::ReleaseHost(format!(
                "duplicate asset '{}' on endpoint '{endpoint}'",
                asset.name
            )));
        }

        state.uploads.push((endpoint.to_string(), asset.clone()));
        Ok(())
    }
}

/// [`BuildCommand`] that deterministically derives bytes from its inputs.
#[derive(Debug, Default)]
pub struct StaticBuildCommand;

impl StaticBuildCommand {
    /// Creates the command.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildCommand for StaticBuildCommand {
    async fn run(&self, inputs: &BuildInputs) -> anyhow::Result<Vec<u8>> {
        Ok(format!(
            "{}@{} ({})",
            inputs.target, inputs.commit_hash, inputs.commit_date
        )
        .into_bytes())
    }
}

/// [`BuildCommand`] that fails for a configured set of targets and behaves
/// like [`StaticBuildCommand`] for the rest.
#[derive(Debug, Default)]
pub struct ScriptedBuildCommand {
    failing: HashSet<String>,
}

impl ScriptedBuildCommand {
    /// Creates a command that fails for the given targets.
    #[must_use]
    pub fn failing_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: targets.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl BuildCommand for ScriptedBuildCommand {
    async fn run(&self, inputs: &BuildInputs) -> anyhow::Result<Vec<u8>> {
        if self.failing.contains(&inputs.target) {
            anyhow::bail!("scripted failure for target '{}'", inputs.target);
        }
        StaticBuildCommand::new().run(inputs).await
    }
}

/// Tracks how many stages run at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    /// Creates a gauge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the highest concurrency observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`Stage`] with a scripted outcome, optional delay, and optional
/// concurrency tracking.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    failure: Option<String>,
    delay: Option<Duration>,
    gauge: Option<Arc<ConcurrencyGauge>>,
}

impl ScriptedStage {
    /// Creates a stage that succeeds.
    #[must_use]
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure: None,
            delay: None,
            gauge: None,
        }
    }

    /// Creates a stage that fails with the given reason.
    #[must_use]
    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::succeeding(name)
        }
    }

    /// Makes the stage sleep before finishing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attaches a concurrency gauge.
    #[must_use]
    pub fn with_gauge(mut self, gauge: Arc<ConcurrencyGauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }

        match &self.failure {
            Some(reason) => StageOutcome::fail(reason.clone()),
            None => StageOutcome::ok(),
        }
    }
}
