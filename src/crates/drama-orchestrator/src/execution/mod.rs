//! Task Execution Module
//!
//! Lifecycle control, pipeline execution and bounded scheduling of
//! background tasks.

pub mod controller;
pub mod engine;
pub mod pipeline;
pub mod scheduler;

pub use controller::TaskController;
pub use engine::TaskExecutionEngine;
pub use pipeline::{Phase, Pipeline, PipelineContext, PipelineOutcome};
pub use scheduler::{SchedulerConfig, TaskScheduler};
