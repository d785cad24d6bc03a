//! Error types for the shipflow orchestration core.
//!
//! The taxonomy follows the same pattern as the rest of the crate's API:
//! granular error structs for conditions callers match on, collected under
//! one top-level enum for propagation with `?`.

use thiserror::Error;

/// The main error type for shipflow operations.
#[derive(Debug, Error)]
pub enum ShipflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An artifact was written twice under the same name.
    #[error("{0}")]
    DuplicateArtifact(#[from] DuplicateArtifactError),

    /// An artifact could not be produced.
    #[error("{0}")]
    ArtifactUnavailable(#[from] ArtifactUnavailableError),

    /// No packaging rule is registered for a platform classifier.
    #[error("{0}")]
    UnknownPlatformPolicy(#[from] UnknownPlatformPolicyError),

    /// The external release-hosting collaborator failed.
    #[error("release host error: {0}")]
    ReleaseHost(String),

    /// An external build command failed.
    #[error("build command failed for target '{target}': {reason}")]
    Build {
        /// The target triple or bundle classifier being built.
        target: String,
        /// The failure reason reported by the command.
        reason: String,
    },

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShipflowError {
    /// Creates a build error for a target.
    #[must_use]
    pub fn build(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a second artifact is stored under an existing name.
///
/// Artifact names are unique within a run: every key has exactly one
/// producer, and the store rejects any attempt to write it again.
#[derive(Debug, Clone, Error)]
#[error("duplicate artifact '{name}' (already produced by stage '{producer}')")]
pub struct DuplicateArtifactError {
    /// The conflicting artifact name.
    pub name: String,
    /// The stage that already produced the artifact.
    pub producer: String,
}

impl DuplicateArtifactError {
    /// Creates a new duplicate artifact error.
    #[must_use]
    pub fn new(name: impl Into<String>, producer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            producer: producer.into(),
        }
    }
}

/// Error raised when a consumer asks for an artifact that will never arrive.
#[derive(Debug, Clone, Error)]
#[error("artifact '{name}' unavailable: {reason}")]
pub struct ArtifactUnavailableError {
    /// The requested artifact name.
    pub name: String,
    /// Why the artifact cannot be delivered.
    pub reason: String,
}

impl ArtifactUnavailableError {
    /// Creates a new artifact unavailable error.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when the packaging policy has no rule for a classifier.
///
/// Packaging fails fast on an unregistered classifier; assets are never
/// silently shipped unpackaged.
#[derive(Debug, Clone, Error)]
#[error("no packaging rule registered for platform classifier '{classifier}'")]
pub struct UnknownPlatformPolicyError {
    /// The unrecognized platform classifier.
    pub classifier: String,
}

impl UnknownPlatformPolicyError {
    /// Creates a new unknown platform policy error.
    #[must_use]
    pub fn new(classifier: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
        }
    }
}
