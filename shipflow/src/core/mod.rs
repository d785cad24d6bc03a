//! Core data model: statuses, artifacts, releases, assets, and triggers.

mod artifact;
mod asset;
mod release;
mod status;
mod trigger;

pub use artifact::Artifact;
pub use asset::PackagedAsset;
pub use release::{Release, ReleaseRequest};
pub use status::{RunStatus, StageKind, StageStatus};
pub use trigger::TriggerEvent;
