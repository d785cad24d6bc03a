//! Stage trait and the build/publish stage drivers.
//!
//! Stages are the units of orchestrated work: each has a name, declared
//! dependencies (held by its [`crate::pipeline::StageSpec`]), and produces a
//! terminal outcome. All side effects flow through the
//! [`crate::context::RunContext`] handed to `run`.

mod build;
mod publish;

pub use build::{BuildCommand, BuildInputs, BuildStage};
pub use publish::PublishStage;

use crate::context::RunContext;
use async_trait::async_trait;
use std::fmt::Debug;

/// The terminal outcome of one stage execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage completed its work.
    Succeeded,
    /// The stage failed with a reason.
    Failed(String),
}

impl StageOutcome {
    /// Creates a success outcome.
    #[must_use]
    pub fn ok() -> Self {
        Self::Succeeded
    }

    /// Creates a failure outcome with a reason.
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Collapses a fallible stage body into an outcome.
    #[must_use]
    pub fn from_result<T, E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns the failure reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Failed(reason) => Some(reason),
        }
    }
}

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage against the run context.
    async fn run(&self, ctx: &RunContext) -> StageOutcome;
}

/// A stage that does nothing and succeeds. Useful in tests.
#[derive(Debug, Clone)]
pub struct NoOpStage {
    name: String,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &RunContext) -> StageOutcome {
        StageOutcome::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        assert!(StageOutcome::ok().is_success());
        assert!(!StageOutcome::fail("boom").is_success());
        assert_eq!(StageOutcome::fail("boom").error(), Some("boom"));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Result<(), String> = Ok(());
        assert!(StageOutcome::from_result(ok).is_success());

        let err: Result<(), String> = Err("broken".to_string());
        assert_eq!(StageOutcome::from_result(err).error(), Some("broken"));
    }

    #[tokio::test]
    async fn test_noop_stage() {
        let stage = NoOpStage::new("noop");
        assert_eq!(stage.name(), "noop");

        let (ctx, _host) = crate::testing::run_context("app");
        let outcome = stage.run(&ctx).await;
        assert!(outcome.is_success());
    }
}
