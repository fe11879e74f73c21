use async_trait::async_trait;
use sdkbench_core::{ExecutionMetric, SdkVariant};

/// One client SDK under test.
///
/// Implementations own their connection (pool) and must tolerate concurrent calls from every
/// benchmark worker.
#[async_trait]
pub trait SdkHandler: Send + Sync {
    /// Issue `query`, consume the entire result set and report what happened.
    ///
    /// Never fails: connection errors, query errors, timeouts and errors while iterating rows
    /// are all recorded in the returned metric. Build the metric with
    /// [`QueryTimer`](sdkbench_core::QueryTimer) and finish it only after the last row has been
    /// read; consuming rows is part of the measured latency.
    async fn execute_query(
        &self,
        query: &str,
        query_name: &str,
        sequence_number: u64,
    ) -> ExecutionMetric;

    fn sdk_type(&self) -> SdkVariant;

    /// Release the connection. Idempotent.
    async fn close(&self);
}
