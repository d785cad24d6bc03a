//! # Shipflow
//!
//! A release-build orchestrator: a pushed version tag fans out into a
//! per-target build matrix, passes an idempotent release gate, and fans out
//! again into per-target publish stages.
//!
//! - **Stage-based execution**: build, gate, and publish stages run as a
//!   validated DAG with group dependencies and bounded parallelism
//! - **Artifact store**: write-once, suspend-on-read exchange between stages
//! - **Table-driven packaging**: one policy table maps platform classifiers
//!   to rename/compress/content-type rules
//! - **Idempotent releases**: a redelivered tag reuses the existing release
//!   instead of creating a duplicate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipflow::prelude::*;
//!
//! let pipeline = ReleasePipeline::builder()
//!     .product("app")
//!     .targets(["x86_64-unknown-linux-musl", "x86_64-pc-windows-gnu"])
//!     .build_command(build_command)
//!     .release_host(host)
//!     .build()?;
//!
//! let report = pipeline.handle(&trigger, commit).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod core;
pub mod errors;
pub mod pipeline;
pub mod policy;
pub mod release;
pub mod stages;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{CommitInfo, RunContext};
    pub use crate::core::{
        Artifact, PackagedAsset, Release, ReleaseRequest, RunStatus, StageKind,
        StageStatus, TriggerEvent,
    };
    pub use crate::errors::{
        ArtifactUnavailableError, DuplicateArtifactError, PipelineValidationError,
        ShipflowError, UnknownPlatformPolicyError,
    };
    pub use crate::pipeline::{
        ExecutorConfig, FailureMode, ReleasePipeline, ReleasePipelineBuilder,
        RunReport, StageGraph, StageGroup, StageSpec,
    };
    pub use crate::policy::{AssetRule, Compression, PackagingPolicy, PlatformFamily};
    pub use crate::release::{ReleaseGate, ReleaseHost};
    pub use crate::stages::{BuildCommand, BuildInputs, Stage, StageOutcome};
    pub use crate::store::ArtifactStore;
}
