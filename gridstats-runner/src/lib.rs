//! GridStats Runner: dispatch, batching and merging behind one request pipeline.
//!
//! This crate builds on `gridstats-core` to provide:
//! - Single-unit dispatcher with bounded retry and linear backoff
//! - Concurrent groups and fixed-width entity batches
//! - Row-concatenation and keyed result merges
//! - `Pipeline::process`, the classify → split → dispatch → merge entry point
//! - TOML configuration for the provider, retry policy and batch width

pub mod config;
pub mod dispatch;
pub mod executor;
pub mod merge;
pub mod pipeline;
pub mod result;

pub use config::{BatchConfig, ConfigError, PipelineConfig, RetryPolicy};
pub use dispatch::Dispatcher;
pub use executor::{entity_units, run_batches, run_group, BatchOutcome, TaggedResult, TaskPanic};
pub use merge::{merge_keyed, merge_rows, KeyedMerge, RowMerge};
pub use pipeline::{Pipeline, PipelineError};
pub use result::{
    DispatchError, FailureKind, PipelineResponse, ResponseData, ResponseMetadata, UnitMetadata,
    UnitResult,
};
