//! The stage graph executor.
//!
//! Runs stages as soon as their declared dependencies have all succeeded,
//! in parallel on tokio tasks bounded by a worker pool. Failure propagates
//! to dependents as `skipped`; group dependencies are satisfied only when
//! every member succeeded.

use super::matrix::StageGroup;
use super::StageSpec;
use crate::context::RunContext;
use crate::core::StageStatus;
use crate::errors::{PipelineValidationError, ShipflowError};
use crate::stages::StageOutcome;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default worker-pool size.
pub const DEFAULT_WORKER_POOL: usize = 4;

/// What the executor does with not-yet-started stages after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// After the first failure no new stage starts; running stages finish
    /// but their results are not consumed. Matches the original engine.
    #[default]
    FailFast,
    /// Independent branches keep scheduling; only dependents of the failed
    /// stage are skipped.
    FailIsolated,
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of stages running concurrently.
    pub max_concurrency: usize,
    /// Failure propagation mode.
    pub failure_mode: FailureMode,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_WORKER_POOL,
            failure_mode: FailureMode::default(),
        }
    }
}

/// Result of executing a stage graph.
#[derive(Debug)]
pub struct ExecutionReport {
    /// Terminal status per stage.
    pub statuses: HashMap<String, StageStatus>,
    /// Failure reason per failed stage.
    pub errors: HashMap<String, String>,
    /// True if no stage failed.
    pub success: bool,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
}

impl ExecutionReport {
    /// Returns the terminal status of a stage.
    #[must_use]
    pub fn status(&self, stage: &str) -> Option<StageStatus> {
        self.statuses.get(stage).copied()
    }
}

enum DepState {
    Ready,
    Waiting,
    Blocked(String),
}

/// A directed acyclic graph of stages, validated at construction.
pub struct StageGraph {
    name: String,
    stages: HashMap<String, StageSpec>,
    groups: HashMap<String, StageGroup>,
    /// Insertion order, for deterministic scheduling sweeps.
    order: Vec<String>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGraph")
            .field("name", &self.name)
            .field("stages", &self.order)
            .field("config", &self.config)
            .finish()
    }
}

impl StageGraph {
    /// Creates a validated stage graph.
    ///
    /// # Errors
    ///
    /// Returns a validation error for duplicate stage names, group/stage
    /// name collisions, unknown group members, unknown dependencies,
    /// self-dependencies, or dependency cycles.
    pub fn new(
        name: impl Into<String>,
        specs: Vec<StageSpec>,
        groups: Vec<StageGroup>,
        config: ExecutorConfig,
    ) -> Result<Self, PipelineValidationError> {
        let mut order = Vec::with_capacity(specs.len());
        let mut stages = HashMap::with_capacity(specs.len());

        for spec in specs {
            spec.validate()?;
            if stages.contains_key(&spec.name) {
                return Err(PipelineValidationError::new(format!(
                    "duplicate stage name '{}'",
                    spec.name
                ))
                .with_stages(vec![spec.name]));
            }
            order.push(spec.name.clone());
            stages.insert(spec.name.clone(), spec);
        }

        let mut group_map = HashMap::with_capacity(groups.len());
        for group in groups {
            if stages.contains_key(&group.name) {
                return Err(PipelineValidationError::new(format!(
                    "group '{}' collides with a stage of the same name",
                    group.name
                ))
                .with_stages(vec![group.name]));
            }
            for member in &group.members {
                if !stages.contains_key(member) {
                    return Err(PipelineValidationError::new(format!(
                        "group '{}' references unknown stage '{member}'",
                        group.name
                    ))
                    .with_stages(vec![member.clone()]));
                }
            }
            group_map.insert(group.name.clone(), group);
        }

        let graph = Self {
            name: name.into(),
            stages,
            groups: group_map,
            order,
            config,
        };

        graph.validate_dependencies()?;
        graph.validate_acyclic()?;
        Ok(graph)
    }

    /// Returns the graph name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn validate_dependencies(&self) -> Result<(), PipelineValidationError> {
        for spec in self.stages.values() {
            for dep in &spec.dependencies {
                if !self.stages.contains_key(dep) && !self.groups.contains_key(dep) {
                    return Err(PipelineValidationError::new(format!(
                        "stage '{}' depends on unknown stage or group '{dep}'",
                        spec.name
                    ))
                    .with_stages(vec![spec.name.clone(), dep.clone()]));
                }
            }
        }
        Ok(())
    }

    /// Expands a dependency name to the concrete stage names it covers.
    fn dep_stages<'a>(&'a self, dep: &'a str) -> Vec<&'a str> {
        self.groups.get(dep).map_or_else(
            || vec![dep],
            |group| group.members.iter().map(String::as_str).collect(),
        )
    }

    fn validate_acyclic(&self) -> Result<(), PipelineValidationError> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();

        for start in &self.order {
            if let Some(cycle) =
                self.visit(start.as_str(), &mut visited, &mut path, &mut on_path)
            {
                return Err(PipelineValidationError::new(format!(
                    "dependency cycle: {}",
                    cycle.join(" -> ")
                ))
                .with_stages(cycle));
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        on_path: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if visited.contains(node) {
            return None;
        }
        if on_path.contains(node) {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }

        path.push(node);
        on_path.insert(node);

        if let Some(spec) = self.stages.get(node) {
            for dep in &spec.dependencies {
                for member in self.dep_stages(dep) {
                    if let Some(cycle) = self.visit(member, visited, path, on_path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        on_path.remove(node);
        visited.insert(node);
        None
    }

    fn dependency_state(
        &self,
        name: &str,
        statuses: &HashMap<String, StageStatus>,
    ) -> DepState {
        let Some(spec) = self.stages.get(name) else {
            return DepState::Waiting;
        };

        let mut waiting = false;
        for dep in &spec.dependencies {
            for member in self.dep_stages(dep) {
                match statuses.get(member) {
                    Some(StageStatus::Succeeded) => {}
                    Some(status) if status.is_blocked() => {
                        return DepState::Blocked(dep.clone());
                    }
                    _ => waiting = true,
                }
            }
        }

        if waiting {
            DepState::Waiting
        } else {
            DepState::Ready
        }
    }

    fn spawn_stage(
        &self,
        name: String,
        ctx: Arc<RunContext>,
        semaphore: Arc<Semaphore>,
    ) -> tokio::task::JoinHandle<(String, StageOutcome)> {
        let runner = self.stages.get(&name).map(|spec| spec.runner.clone());

        tokio::spawn(async move {
            let Some(runner) = runner else {
                return (name, StageOutcome::fail("unknown stage"));
            };
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (name, StageOutcome::fail("worker pool closed"));
            };

            info!(stage = %name, "stage started");
            let outcome = runner.run(ctx.as_ref()).await;
            (name, outcome)
        })
    }

    /// Executes the graph to completion.
    ///
    /// Every stage reaches a terminal status; each terminal status is sealed
    /// into the run's artifact store so suspended readers resolve.
    ///
    /// # Errors
    ///
    /// Returns an internal error if a task panics or the graph deadlocks
    /// (the latter is prevented by construction-time validation).
    pub async fn execute(&self, ctx: Arc<RunContext>) -> Result<ExecutionReport, ShipflowError> {
        let start = Instant::now();

        let mut statuses: HashMap<String, StageStatus> = self
            .order
            .iter()
            .map(|name| (name.clone(), StageStatus::Pending))
            .collect();
        let mut errors: HashMap<String, String> = HashMap::new();

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut active: FuturesUnordered<tokio::task::JoinHandle<(String, StageOutcome)>> =
            FuturesUnordered::new();
        let mut halted = false;

        loop {
            // Sweep to a fixpoint: schedule every ready stage, skip every
            // blocked one. A single pass is not enough because one skip can
            // block further stages.
            loop {
                let mut progressed = false;

                for name in &self.order {
                    if !matches!(statuses.get(name), Some(StageStatus::Pending)) {
                        continue;
                    }

                    if halted {
                        debug!(stage = %name, "stage skipped: run halted after failure");
                        statuses.insert(name.clone(), StageStatus::Skipped);
                        ctx.artifacts().seal_stage(name, StageStatus::Skipped);
                        progressed = true;
                        continue;
                    }

                    match self.dependency_state(name, &statuses) {
                        DepState::Ready => {
                            statuses.insert(name.clone(), StageStatus::Running);
                            active.push(self.spawn_stage(
                                name.clone(),
                                ctx.clone(),
                                semaphore.clone(),
                            ));
                            progressed = true;
                        }
                        DepState::Blocked(dep) => {
                            debug!(stage = %name, dependency = %dep, "stage skipped: dependency did not succeed");
                            statuses.insert(name.clone(), StageStatus::Skipped);
                            ctx.artifacts().seal_stage(name, StageStatus::Skipped);
                            progressed = true;
                        }
                        DepState::Waiting => {}
                    }
                }

                if !progressed {
                    break;
                }
            }

            if statuses.values().all(StageStatus::is_terminal) {
                break;
            }

            if active.is_empty() {
                let remaining: Vec<&String> = self
                    .order
                    .iter()
                    .filter(|name| !matches!(statuses.get(*name), Some(s) if s.is_terminal()))
                    .collect();
                return Err(ShipflowError::Internal(format!(
                    "deadlocked stage graph; remaining stages: {remaining:?}"
                )));
            }

            if let Some(joined) = active.next().await {
                let (name, outcome) = joined
                    .map_err(|e| ShipflowError::Internal(format!("task join error: {e}")))?;

                match outcome {
                    StageOutcome::Succeeded => {
                        info!(stage = %name, "stage succeeded");
                        statuses.insert(name.clone(), StageStatus::Succeeded);
                        ctx.artifacts().seal_stage(&name, StageStatus::Succeeded);
                    }
                    StageOutcome::Failed(reason) => {
                        warn!(stage = %name, error = %reason, "stage failed");
                        statuses.insert(name.clone(), StageStatus::Failed);
                        ctx.artifacts().seal_stage(&name, StageStatus::Failed);
                        errors.insert(name, reason);

                        if self.config.failure_mode == FailureMode::FailFast {
                            halted = true;
                        }
                    }
                }
            }
        }

        let success = !statuses
            .values()
            .any(|status| *status == StageStatus::Failed);
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            graph = %self.name,
            success,
            duration_ms,
            "stage graph finished"
        );

        Ok(ExecutionReport {
            statuses,
            errors,
            success,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;
    use crate::stages::NoOpStage;
    use crate::testing::{run_context, ScriptedStage};
    use std::time::Duration;

    fn noop_spec(name: &str) -> StageSpec {
        StageSpec::new(name, StageKind::Build, Arc::new(NoOpStage::new(name)))
    }

    fn failing_spec(name: &str) -> StageSpec {
        StageSpec::new(
            name,
            StageKind::Build,
            Arc::new(ScriptedStage::failing(name, "scripted failure")),
        )
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let specs = vec![noop_spec("a").with_dependency("ghost")];
        let err =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let specs = vec![noop_spec("a"), noop_spec("a")];
        assert!(StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).is_err());
    }

    #[test]
    fn test_cycle_rejected() {
        let specs = vec![
            noop_spec("a").with_dependency("b"),
            noop_spec("b").with_dependency("a"),
        ];
        let err =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_group_member_must_exist() {
        let specs = vec![noop_spec("a")];
        let groups = vec![StageGroup::new("g", vec!["missing".to_string()])];
        assert!(StageGraph::new("t", specs, groups, ExecutorConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_linear_chain_executes_in_order() {
        let specs = vec![
            noop_spec("a"),
            noop_spec("b").with_dependency("a"),
            noop_spec("c").with_dependency("b"),
        ];
        let graph =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        assert!(report.success);
        assert_eq!(report.status("c"), Some(StageStatus::Succeeded));
    }

    #[tokio::test]
    async fn test_failure_skips_dependents() {
        let specs = vec![
            failing_spec("a"),
            noop_spec("b").with_dependency("a"),
            noop_spec("c").with_dependency("b"),
        ];
        let graph =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.status("a"), Some(StageStatus::Failed));
        assert_eq!(report.status("b"), Some(StageStatus::Skipped));
        assert_eq!(report.status("c"), Some(StageStatus::Skipped));
        assert!(report.errors.contains_key("a"));
    }

    #[tokio::test]
    async fn test_group_dependency_needs_all_members() {
        let specs = vec![
            failing_spec("g:one"),
            noop_spec("g:two"),
            noop_spec("after").with_dependency("g"),
        ];
        let groups = vec![StageGroup::new(
            "g",
            vec!["g:one".to_string(), "g:two".to_string()],
        )];
        let config = ExecutorConfig {
            failure_mode: FailureMode::FailIsolated,
            ..ExecutorConfig::default()
        };
        let graph = StageGraph::new("t", specs, groups, config).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        assert_eq!(report.status("g:two"), Some(StageStatus::Succeeded));
        assert_eq!(report.status("after"), Some(StageStatus::Skipped));
    }

    #[tokio::test]
    async fn test_fail_fast_halts_unstarted_branches() {
        let specs = vec![
            failing_spec("boom"),
            StageSpec::new(
                "slow",
                StageKind::Build,
                Arc::new(ScriptedStage::succeeding("slow").with_delay(Duration::from_millis(50))),
            ),
            noop_spec("late").with_dependency("slow"),
        ];
        let graph =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        // The running sibling finishes, but nothing new starts after the
        // failure.
        assert_eq!(report.status("slow"), Some(StageStatus::Succeeded));
        assert_eq!(report.status("late"), Some(StageStatus::Skipped));
    }

    #[tokio::test]
    async fn test_fail_isolated_keeps_independent_branches() {
        let specs = vec![
            failing_spec("boom"),
            StageSpec::new(
                "slow",
                StageKind::Build,
                Arc::new(ScriptedStage::succeeding("slow").with_delay(Duration::from_millis(50))),
            ),
            noop_spec("late").with_dependency("slow"),
        ];
        let config = ExecutorConfig {
            failure_mode: FailureMode::FailIsolated,
            ..ExecutorConfig::default()
        };
        let graph = StageGraph::new("t", specs, Vec::new(), config).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        assert_eq!(report.status("late"), Some(StageStatus::Succeeded));
        assert!(!report.success);
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let gauge = Arc::new(crate::testing::ConcurrencyGauge::new());
        let specs: Vec<StageSpec> = (0..6)
            .map(|i| {
                let name = format!("s{i}");
                StageSpec::new(
                    name.clone(),
                    StageKind::Build,
                    Arc::new(
                        ScriptedStage::succeeding(&name)
                            .with_delay(Duration::from_millis(10))
                            .with_gauge(gauge.clone()),
                    ),
                )
            })
            .collect();
        let config = ExecutorConfig {
            max_concurrency: 2,
            ..ExecutorConfig::default()
        };
        let graph = StageGraph::new("t", specs, Vec::new(), config).unwrap();
        let (ctx, _host) = run_context("app");

        let report = graph.execute(ctx).await.unwrap();
        assert!(report.success);
        assert!(gauge.peak() <= 2, "peak concurrency was {}", gauge.peak());
    }

    #[tokio::test]
    async fn test_terminal_statuses_are_sealed() {
        let specs = vec![failing_spec("producer")];
        let graph =
            StageGraph::new("t", specs, Vec::new(), ExecutorConfig::default()).unwrap();
        let (ctx, _host) = run_context("app");
        ctx.artifacts().expect("out", "producer").unwrap();

        graph.execute(ctx.clone()).await.unwrap();

        // A reader arriving after the run resolves instead of suspending.
        let err = ctx.artifacts().get("out").await.unwrap_err();
        assert!(err.reason.contains("failed"));
    }
}
