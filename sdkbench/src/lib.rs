//! Open-loop benchmark engine for comparing analytics client SDKs.
//!
//! A run drives one [`SdkHandler`] at a time through
//! `connect -> warmup -> measure -> drain -> analyze -> disconnect`:
//!
//! - **warmup** repeats the query as fast as the handler allows and discards the results,
//! - **measure** runs `threads` workers that each issue the query on a fixed cadence, independent
//!   of how long the previous query took (avoiding coordinated omission), and hands every
//!   [`ExecutionMetric`] to a [`MetricsWriter`] without ever blocking on it,
//! - **analyze** reads the results file back and computes [`LatencyStats`].
//!
//! ```no_run
//! use sdkbench::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(handler: Arc<dyn SdkHandler>) -> Result<(), BenchError> {
//! let config = RunConfig::new("couchbase://127.0.0.1", "SELECT 1", "results/{sdk_type}.jsonl");
//! let path = config.output_path(handler.sdk_type(), false);
//! let result = BenchmarkRunner::new(Arc::new(config)).run(handler, &path).await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
mod error;
pub mod handler;
pub mod report;
pub mod runner;
pub mod writer;

pub use analyzer::LatencyAnalyzer;
pub use error::{AnalyzeError, BenchError, WriterError};
pub use handler::SdkHandler;
pub use report::{ComparisonReport, Verdict};
pub use runner::{BenchmarkRunner, MeasureOutcome, PhaseCounts};
pub use writer::{MetricsSender, MetricsWriter, WriterReport};

pub use sdkbench_core as core;
pub use sdkbench_core::{
    AggregatedResult, ExecutionMetric, LatencyStats, QueryTimer, RunConfig, SdkVariant,
};

pub mod prelude {
    pub use crate::{
        AggregatedResult, BenchError, BenchmarkRunner, ComparisonReport, ExecutionMetric,
        LatencyStats, QueryTimer, RunConfig, SdkHandler, SdkVariant,
    };
    pub use async_trait::async_trait;
}
