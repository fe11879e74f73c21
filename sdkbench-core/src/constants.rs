use std::time::Duration;

/// Default capacity of the bounded queue between workers and the metrics writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000;

/// How long the metrics writer blocks on an empty queue before logging that it is idle.
pub const WRITER_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// The writer logs progress at least this often while records are flowing...
pub const WRITER_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// ...and every time this many records have been written.
pub const WRITER_LOG_BATCH: u64 = 1_000;

/// Bounded wait for the writer to drain after `stop()`.
pub const WRITER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Added on top of the warmup duration before warmup workers are aborted.
pub const WARMUP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Allowed past the measurement deadline for in-flight queries to finish.
pub const MEASURE_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub const SMOKE_TEST_QUERY: &str = "SELECT 1 AS test";
pub const SMOKE_TEST_QUERY_NAME: &str = "smoke-test";
pub const WARMUP_QUERY_NAME: &str = "warmup";

pub const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Per-query debug logging is sampled: the first few sequence numbers, then every Nth.
pub fn sampled_sequence(sequence_number: u64) -> bool {
    sequence_number <= 10 || sequence_number % 1_000 == 0
}
