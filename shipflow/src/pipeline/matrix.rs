//! Matrix expansion: one stage template, N parallel per-target instances.

use super::StageSpec;

/// A named set of matrix-expanded sibling stages.
///
/// When used as a dependency, a group is satisfied only when *all* members
/// succeeded; a single failing leg blocks every dependent. Siblings share no
/// state and have no ordering among themselves.
#[derive(Debug, Clone)]
pub struct StageGroup {
    /// The group name, usable as a dependency.
    pub name: String,
    /// The member stage names.
    pub members: Vec<String>,
}

impl StageGroup {
    /// Creates a group with the given members.
    #[must_use]
    pub fn new(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Returns true if the stage is a member of this group.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.members.iter().any(|m| m == stage)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// The conventional name of one matrix instance.
#[must_use]
pub fn instance_name(group: &str, classifier: &str) -> String {
    format!("{group}:{classifier}")
}

/// Expands a stage template into one instance per target classifier.
///
/// Each instance is parameterized only by its classifier; the factory
/// receives the instance name and the classifier and returns the spec.
pub fn expand<F>(group_name: &str, classifiers: &[String], make: F) -> (Vec<StageSpec>, StageGroup)
where
    F: Fn(&str, &str) -> StageSpec,
{
    let mut specs = Vec::with_capacity(classifiers.len());
    let mut members = Vec::with_capacity(classifiers.len());

    for classifier in classifiers {
        let name = instance_name(group_name, classifier);
        specs.push(make(&name, classifier));
        members.push(name);
    }

    (specs, StageGroup::new(group_name, members))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;
    use crate::stages::NoOpStage;
    use std::sync::Arc;

    #[test]
    fn test_expand_creates_one_instance_per_classifier() {
        let targets = vec![
            "x86_64-unknown-linux-musl".to_string(),
            "x86_64-pc-windows-gnu".to_string(),
        ];

        let (specs, group) = expand("build", &targets, |name, classifier| {
            StageSpec::new(name, StageKind::Build, Arc::new(NoOpStage::new(name)))
                .with_target(classifier)
        });

        assert_eq!(specs.len(), 2);
        assert_eq!(group.len(), 2);
        assert_eq!(specs[0].name, "build:x86_64-unknown-linux-musl");
        assert_eq!(specs[0].target.as_deref(), Some("x86_64-unknown-linux-musl"));
        assert!(group.contains("build:x86_64-pc-windows-gnu"));
    }

    #[test]
    fn test_empty_matrix() {
        let (specs, group) = expand("build", &[], |name, _| {
            StageSpec::new(name, StageKind::Build, Arc::new(NoOpStage::new(name)))
        });

        assert!(specs.is_empty());
        assert!(group.is_empty());
    }
}
