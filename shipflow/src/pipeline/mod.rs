//! Pipeline assembly and execution.
//!
//! [`StageSpec`] declares a stage and its dependencies, [`matrix`] expands
//! per-target stage templates, [`StageGraph`] validates and executes the
//! resulting DAG, and [`ReleasePipeline`] wires the whole tag-to-release
//! flow together.

mod executor;
pub mod matrix;
mod release;
mod spec;


pub use executor::{
    ExecutionReport, ExecutorConfig, FailureMode, StageGraph, DEFAULT_WORKER_POOL,
};
pub use matrix::StageGroup;
pub use release::{
    ReleasePipeline, ReleasePipelineBuilder, RunReport, BUILD_GROUP, GATE_STAGE, PUBLISH_GROUP,
};
pub use spec::StageSpec;
