use crate::{SdkVariant, NANOS_PER_MILLI};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

tokio::task_local! {
    /// Identifier of the benchmark worker driving the current task.
    pub static WORKER_ID: usize;
}

/// Worker id of the calling task, or `0` outside a worker scope.
pub fn current_worker() -> usize {
    WORKER_ID.try_with(|id| *id).unwrap_or(0)
}

/// Monotonic instants have no epoch, so they are persisted relative to a process-wide anchor.
fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

fn monotonic_nanos(instant: Instant) -> i64 {
    instant.saturating_duration_since(anchor()).as_nanos() as i64
}

/// Milliseconds since the Unix epoch.
pub fn wall_clock_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Timing and outcome of a single query attempt.
///
/// One line of the results file. Built only through [`QueryTimer`], which guarantees the
/// end instant is taken when the handler finishes (after it has consumed the rows) and that
/// `error_message` is present exactly when `success` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetric {
    #[serde(skip)]
    worker_id: usize,
    start_time: i64,
    end_time: i64,
    absolute_start_time_ms: i64,
    absolute_end_time_ms: i64,
    duration_nanos: i64,
    duration_ms: f64,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    row_count: u64,
    sdk_type: SdkVariant,
    query_name: String,
    sequence_number: u64,
    timestamp: i64,
}

impl ExecutionMetric {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn sdk_type(&self) -> SdkVariant {
        self.sdk_type
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn duration_nanos(&self) -> i64 {
        self.duration_nanos
    }

    pub fn duration(&self) -> Duration {
        Duration::from_nanos(self.duration_nanos.max(0) as u64)
    }

    pub fn absolute_start_time_ms(&self) -> i64 {
        self.absolute_start_time_ms
    }

    pub fn absolute_end_time_ms(&self) -> i64 {
        self.absolute_end_time_ms
    }
}

/// Captures the start of a query and turns it into an [`ExecutionMetric`] once finished.
///
/// ```
/// use sdkbench_core::{QueryTimer, SdkVariant};
///
/// let timer = QueryTimer::start(SdkVariant::Enterprise, "q1", 1);
/// // ... issue the query and consume every row ...
/// let metric = timer.success(42);
/// assert!(metric.success());
/// assert_eq!(metric.row_count(), 42);
/// ```
#[derive(Debug)]
pub struct QueryTimer {
    worker_id: usize,
    sdk_type: SdkVariant,
    query_name: String,
    sequence_number: u64,
    absolute_start_ms: i64,
    start: Instant,
}

impl QueryTimer {
    pub fn start(
        sdk_type: SdkVariant,
        query_name: impl Into<String>,
        sequence_number: u64,
    ) -> Self {
        let _ = anchor();
        let absolute_start_ms = wall_clock_ms();
        Self {
            worker_id: current_worker(),
            sdk_type,
            query_name: query_name.into(),
            sequence_number,
            absolute_start_ms,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn success(self, row_count: u64) -> ExecutionMetric {
        self.finish(None, row_count)
    }

    /// Rows consumed before the failure still count.
    pub fn failure(self, error: impl fmt::Display, row_count: u64) -> ExecutionMetric {
        let mut message = error.to_string();
        if message.is_empty() {
            message = "unknown error".to_string();
        }
        self.finish(Some(message), row_count)
    }

    fn finish(self, error_message: Option<String>, row_count: u64) -> ExecutionMetric {
        let end = Instant::now();
        let duration_nanos = end.saturating_duration_since(self.start).as_nanos() as i64;

        ExecutionMetric {
            worker_id: self.worker_id,
            start_time: monotonic_nanos(self.start),
            end_time: monotonic_nanos(end),
            absolute_start_time_ms: self.absolute_start_ms,
            absolute_end_time_ms: self.absolute_start_ms + duration_nanos / 1_000_000,
            duration_nanos,
            duration_ms: duration_nanos as f64 / NANOS_PER_MILLI,
            success: error_message.is_none(),
            error_message,
            row_count,
            sdk_type: self.sdk_type,
            query_name: self.query_name,
            sequence_number: self.sequence_number,
            timestamp: self.absolute_start_ms,
        }
    }
}
