//! Stage specifications.

use crate::core::StageKind;
use crate::errors::PipelineValidationError;
use crate::stages::Stage;
use std::collections::HashSet;
use std::sync::Arc;

/// Specification for a single stage in a pipeline graph.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The kind of work the stage performs.
    pub kind: StageKind,
    /// The platform classifier for matrix-expanded stages.
    pub target: Option<String>,
    /// Names of stages or groups this stage depends on.
    pub dependencies: HashSet<String>,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: StageKind, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: None,
            dependencies: HashSet::new(),
            runner,
        }
    }

    /// Sets the platform classifier.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a dependency on a stage or group name.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(
        mut self,
        deps: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage depends on itself.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.dependencies.contains(&self.name) {
            return Err(PipelineValidationError::new(format!(
                "stage '{}' cannot depend on itself",
                self.name
            ))
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpStage;

    fn noop(name: &str) -> Arc<dyn Stage> {
        Arc::new(NoOpStage::new(name))
    }

    #[test]
    fn test_spec_creation() {
        let spec = StageSpec::new("build:x", StageKind::Build, noop("build:x"))
            .with_target("x86_64-unknown-linux-musl")
            .with_dependencies(["fetch"]);

        assert_eq!(spec.name, "build:x");
        assert_eq!(spec.kind, StageKind::Build);
        assert_eq!(spec.dependencies.len(), 1);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let spec = StageSpec::new("a", StageKind::Build, noop("a")).with_dependency("a");
        assert!(spec.validate().is_err());
    }
}
