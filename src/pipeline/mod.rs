//! Per-query result accumulation and plugin execution.

pub mod context;
pub mod merge;
pub mod runner;

pub use context::{MergeOutcome, PipelineContext};
pub use merge::merge_into;
pub use runner::{ExecutionOutcome, PipelineRunner, PluginExecution};
