//! Trigger events that start a pipeline run.

use serde::{Deserialize, Serialize};

/// Git ref prefix used by hosted trigger events.
const TAG_REF_PREFIX: &str = "refs/tags/";

/// An event descriptor delivered when a ref is pushed.
///
/// The release pipeline activates only for version tags of the form `v*`;
/// every other ref is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// The pushed ref, either a bare tag (`v1.2.3`) or a full ref
    /// (`refs/tags/v1.2.3`).
    pub git_ref: String,
}

impl TriggerEvent {
    /// Creates a trigger event for a ref.
    #[must_use]
    pub fn new(git_ref: impl Into<String>) -> Self {
        Self {
            git_ref: git_ref.into(),
        }
    }

    /// Returns the bare tag name if the ref is a tag, full-ref or otherwise.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.git_ref
            .strip_prefix(TAG_REF_PREFIX)
            .or(Some(self.git_ref.as_str()))
            .filter(|tag| !tag.contains('/'))
    }

    /// Returns the tag name if this event should activate the release
    /// pipeline (a tag matching `v*`).
    #[must_use]
    pub fn release_tag(&self) -> Option<&str> {
        self.tag().filter(|tag| tag.starts_with('v') && tag.len() > 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_tag() {
        let event = TriggerEvent::new("v1.2.3");
        assert_eq!(event.tag(), Some("v1.2.3"));
        assert_eq!(event.release_tag(), Some("v1.2.3"));
    }

    #[test]
    fn test_full_ref_tag() {
        let event = TriggerEvent::new("refs/tags/v0.9.0");
        assert_eq!(event.release_tag(), Some("v0.9.0"));
    }

    #[test]
    fn test_branch_ref_does_not_activate() {
        let event = TriggerEvent::new("refs/heads/main");
        assert_eq!(event.release_tag(), None);
    }

    #[test]
    fn test_non_version_tag_does_not_activate() {
        assert_eq!(TriggerEvent::new("refs/tags/nightly").release_tag(), None);
        assert_eq!(TriggerEvent::new("refs/tags/v").release_tag(), None);
    }
}
