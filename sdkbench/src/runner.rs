use crate::analyzer::LatencyAnalyzer;
use crate::error::BenchError;
use crate::handler::SdkHandler;
use crate::writer::{MetricsSender, MetricsWriter, WriterReport};
use sdkbench_core::{
    AggregatedResult, RunConfig, SMOKE_TEST_QUERY, SMOKE_TEST_QUERY_NAME, WRITER_JOIN_TIMEOUT,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

mod atomics;
mod measure;
mod monitor;
mod pacer;
mod warmup;

pub use atomics::PhaseCounts;
pub use measure::MeasureOutcome;

/// Drives one [`SdkHandler`] through a complete benchmark run.
#[derive(Clone)]
pub struct BenchmarkRunner {
    config: Arc<RunConfig>,
}

impl BenchmarkRunner {
    pub fn new(config: Arc<RunConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Smoke test, warmup, measurement into `output`, drain, then latency analysis.
    ///
    /// The handler is closed exactly once on every path, including failures.
    #[instrument(name = "variant", skip_all, fields(sdk_type = %handler.sdk_type()))]
    pub async fn run(
        &self,
        handler: Arc<dyn SdkHandler>,
        output: &Path,
    ) -> Result<AggregatedResult, BenchError> {
        let measured = self.run_phases(handler.clone(), output).await;

        info!("Disconnecting {} SDK", handler.sdk_type());
        handler.close().await;

        let (outcome, report) = measured?;
        let analysis = LatencyAnalyzer::analyze_file(output).await?;

        let result = AggregatedResult {
            sdk_type: handler.sdk_type(),
            total_requests: outcome.counts.requests,
            total_successes: outcome.counts.successes,
            success_rate: outcome.counts.success_rate(),
            throughput: outcome.throughput(),
            elapsed: outcome.elapsed,
            start_time_ms: outcome.start_time_ms,
            end_time_ms: outcome.end_time_ms,
            written: report.written,
            dropped: report.dropped,
            latency: analysis.stats,
        };
        info!("{result}");
        Ok(result)
    }

    async fn run_phases(
        &self,
        handler: Arc<dyn SdkHandler>,
        output: &Path,
    ) -> Result<(MeasureOutcome, WriterReport), BenchError> {
        self.connect(handler.as_ref()).await?;
        self.warmup(handler.clone()).await;

        let writer = MetricsWriter::create(output, self.config.queue_capacity).await?;
        let outcome = self.measure(handler, writer.sender()).await;

        let report = writer.finish(WRITER_JOIN_TIMEOUT).await;
        if report.dropped > 0 || report.failed > 0 {
            warn!(
                "{} results dropped and {} failed to write; latency stats only cover the {} persisted",
                report.dropped, report.failed, report.written
            );
        }
        Ok((outcome, report))
    }

    /// Issue the smoke test query once, bounded by the connection timeout.
    pub async fn connect(&self, handler: &dyn SdkHandler) -> Result<Duration, BenchError> {
        let timeout = self.config.connection_timeout;
        info!("Running smoke test against {}", self.config.connection_string);

        let metric = tokio::time::timeout(
            timeout,
            handler.execute_query(SMOKE_TEST_QUERY, SMOKE_TEST_QUERY_NAME, 0),
        )
        .await
        .map_err(|_| BenchError::SmokeTestTimeout(timeout))?;

        if !metric.success() {
            let reason = metric.error_message().unwrap_or("unknown error");
            error!("Smoke test failed: {reason}");
            return Err(BenchError::SmokeTestFailed(reason.to_string()));
        }

        info!("Connected, smoke test took {:?}", metric.duration());
        Ok(metric.duration())
    }

    pub async fn warmup(&self, handler: Arc<dyn SdkHandler>) -> PhaseCounts {
        warmup::run_warmup(handler, &self.config).await
    }

    /// Paced measurement; every metric goes to `sink`.
    pub async fn measure(
        &self,
        handler: Arc<dyn SdkHandler>,
        sink: MetricsSender,
    ) -> MeasureOutcome {
        measure::run_measurement(handler, &self.config, sink).await
    }
}

/// Await every worker until `until`, then abort the stragglers. Returns how many were aborted.
pub(crate) async fn join_workers(
    mut workers: Vec<JoinHandle<()>>,
    until: Instant,
    phase: &str,
) -> usize {
    let mut aborted = 0;
    for handle in workers.iter_mut() {
        match tokio::time::timeout_at(until, &mut *handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.is_cancelled() => {}
            Ok(Err(err)) => error!("A {phase} worker failed: {err}"),
            Err(_) => {
                handle.abort();
                aborted += 1;
            }
        }
    }

    if aborted > 0 {
        warn!("Cancelled {aborted} {phase} workers still running after the grace period");
    }
    aborted
}
