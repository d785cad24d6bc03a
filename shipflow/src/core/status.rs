//! Stage status, stage kind, and run status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a stage performs within the release pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// A stage that compiles one target (a leg of the build matrix).
    Build,
    /// The release gate: creates the release record exactly once.
    Gate,
    /// A stage that packages and uploads one target's asset.
    Publish,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Gate => write!(f, "gate"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// The execution status of a stage.
///
/// Mutated only by the executor: `pending -> running -> {succeeded, failed}`,
/// or `pending -> skipped` when a transitive dependency failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started.
    Pending,
    /// Stage is currently running.
    Running,
    /// Stage completed successfully.
    Succeeded,
    /// Stage failed.
    Failed,
    /// Stage was skipped because a dependency failed or was skipped.
    Skipped,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if the stage ran and succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the stage can never deliver its outputs.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped)
    }
}

/// The terminal status of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every non-skipped stage succeeded.
    Succeeded,
    /// The run failed before a release was created.
    Failed,
    /// A release exists but one or more publish legs failed. The release
    /// carries a partial asset set; recovery is an operator decision.
    Partial,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Build.to_string(), "build");
        assert_eq!(StageKind::Gate.to_string(), "gate");
        assert_eq!(StageKind::Publish.to_string(), "publish");
    }

    #[test]
    fn test_stage_status_terminal() {
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_stage_status_blocked() {
        assert!(StageStatus::Failed.is_blocked());
        assert!(StageStatus::Skipped.is_blocked());
        assert!(!StageStatus::Succeeded.is_blocked());
        assert!(!StageStatus::Running.is_blocked());
    }

    #[test]
    fn test_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let back: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StageStatus::Succeeded);
    }

    #[test]
    fn test_run_status_display() {
        assert_eq!(RunStatus::Partial.to_string(), "partial");
    }
}
