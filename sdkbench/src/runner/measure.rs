use super::atomics::{PhaseAtomics, PhaseCounts};
use super::join_workers;
use super::monitor::monitor_progress;
use super::pacer::Pacer;
use crate::handler::SdkHandler;
use crate::writer::MetricsSender;
use futures_util::FutureExt;
use sdkbench_core::{
    current_worker, sampled_sequence, wall_clock_ms, RunConfig, MEASURE_SHUTDOWN_GRACE,
    WORKER_ID,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// What the measurement phase observed, before latency analysis.
#[derive(Debug, Clone, Copy)]
pub struct MeasureOutcome {
    pub counts: PhaseCounts,
    pub elapsed: Duration,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
}

impl MeasureOutcome {
    pub fn throughput(&self) -> f64 {
        self.counts.throughput(self.elapsed)
    }
}

struct Worker {
    handler: Arc<dyn SdkHandler>,
    query: String,
    query_name: String,
    interval: Duration,
    atomics: PhaseAtomics,
    sink: MetricsSender,
    deadline: Instant,
}

#[instrument(name = "measure", skip_all, fields(sdk_type = %handler.sdk_type()))]
pub(crate) async fn run_measurement(
    handler: Arc<dyn SdkHandler>,
    config: &RunConfig,
    sink: MetricsSender,
) -> MeasureOutcome {
    let sdk_type = handler.sdk_type();
    info!(
        "Running measurement for {} with {} workers, {}",
        humantime::format_duration(config.duration),
        config.threads,
        if config.request_interval.is_zero() {
            "closed loop".to_string()
        } else {
            format!(
                "one query every {} per worker",
                humantime::format_duration(config.request_interval)
            )
        }
    );

    let atomics = PhaseAtomics::new();
    let start_time_ms = wall_clock_ms();
    let start = Instant::now();
    let deadline = start + config.duration;

    let worker = Arc::new(Worker {
        handler,
        query: config.query.clone(),
        query_name: config.query_name.clone(),
        interval: config.request_interval,
        atomics: atomics.clone(),
        sink,
        deadline,
    });

    let monitor = tokio::spawn(monitor_progress(
        atomics.clone(),
        sdk_type,
        start,
        deadline,
        config.progress_interval,
    ));

    let workers = (0..config.threads)
        .map(|id| tokio::spawn(WORKER_ID.scope(id, measure_worker(worker.clone()))))
        .collect();
    join_workers(workers, deadline + MEASURE_SHUTDOWN_GRACE, "measurement").await;
    monitor.abort();

    let elapsed = start.elapsed();
    let outcome = MeasureOutcome {
        counts: atomics.snapshot(),
        elapsed,
        start_time_ms,
        end_time_ms: wall_clock_ms(),
    };
    info!(
        "Measurement complete: {} requests, {} successes in {} ({:.2} RPS)",
        outcome.counts.requests,
        outcome.counts.successes,
        humantime::format_duration(Duration::from_millis(elapsed.as_millis() as u64)),
        outcome.throughput()
    );
    outcome
}

async fn measure_worker(worker: Arc<Worker>) {
    let mut pacer = Pacer::new(worker.interval);
    trace!("Worker {} started, pacing {pacer}", current_worker());

    while Instant::now() < worker.deadline {
        worker.atomics.record_request();
        let seq = worker.atomics.next_sequence();

        let outcome = AssertUnwindSafe(worker.handler.execute_query(
            &worker.query,
            &worker.query_name,
            seq,
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(metric) => {
                if metric.success() {
                    worker.atomics.record_success();
                } else if sampled_sequence(seq) {
                    warn!(
                        "Query #{seq} failed: {}",
                        metric.error_message().unwrap_or_default()
                    );
                } else {
                    trace!("Query #{seq} failed");
                }
                #[cfg(feature = "metrics")]
                export_metric(&metric);
                worker.sink.submit(metric);
            }
            Err(_) => error!(
                "Handler panicked in worker {} during query #{seq}, continuing",
                current_worker()
            ),
        }

        pacer.wait(worker.deadline).await;
    }
}

#[cfg(feature = "metrics")]
fn export_metric(metric: &sdkbench_core::ExecutionMetric) {
    let sdk_type = metric.sdk_type().as_str();
    metrics::counter!("sdkbench_requests", "sdk_type" => sdk_type).increment(1);
    if metric.success() {
        metrics::counter!("sdkbench_successes", "sdk_type" => sdk_type).increment(1);
    }
    metrics::histogram!("sdkbench_query_latency", "sdk_type" => sdk_type)
        .record(metric.duration_nanos() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::{Call, ScriptedHandler};
    use crate::writer::MetricsWriter;
    use async_trait::async_trait;
    use sdkbench_core::{ExecutionMetric, QueryTimer, SdkVariant};

    /// Completes every query without ever suspending.
    struct ReadyHandler;

    #[async_trait]
    impl SdkHandler for ReadyHandler {
        async fn execute_query(
            &self,
            _query: &str,
            query_name: &str,
            sequence_number: u64,
        ) -> ExecutionMetric {
            QueryTimer::start(SdkVariant::Operational, query_name, sequence_number).success(1)
        }

        fn sdk_type(&self) -> SdkVariant {
            SdkVariant::Operational
        }

        async fn close(&self) {}
    }

    fn config(duration_ms: u64, interval_ms: u64, threads: usize) -> RunConfig {
        let mut config = RunConfig::new("couchbase://localhost", "SELECT 1", "out.jsonl");
        config.duration = Duration::from_millis(duration_ms);
        config.request_interval = Duration::from_millis(interval_ms);
        config.threads = threads;
        config.query_name = "q".to_string();
        config
    }

    async fn measure(handler: Arc<ScriptedHandler>, config: &RunConfig) -> MeasureOutcome {
        let writer = MetricsWriter::spawn(tokio::io::sink(), 10_000);
        let outcome = run_measurement(handler, config, writer.sender()).await;
        let report = writer.finish(Duration::from_secs(5)).await;
        // Aborted workers never hand over their last metric.
        assert!(report.written <= outcome.counts.requests);
        assert_eq!(report.dropped, 0);
        outcome
    }

    fn offsets(calls: &[Call], start: Instant) -> Vec<u64> {
        calls
            .iter()
            .map(|c| (c.started - start).as_millis() as u64)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn fast_queries_follow_the_interval() {
        let handler = Arc::new(ScriptedHandler::fixed(Duration::from_millis(10)));
        let start = Instant::now();

        let outcome = measure(handler.clone(), &config(1_000, 100, 1)).await;

        assert_eq!(outcome.counts.requests, 10);
        assert_eq!(outcome.counts.successes, 10);
        assert_eq!(
            offsets(&handler.calls(), start),
            vec![0, 100, 200, 300, 400, 500, 600, 700, 800, 900]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_queries_run_back_to_back() {
        let handler = Arc::new(ScriptedHandler::fixed(Duration::from_millis(150)));
        let start = Instant::now();

        measure(handler.clone(), &config(1_000, 100, 1)).await;

        assert_eq!(
            offsets(&handler.calls(), start),
            vec![0, 150, 300, 450, 600, 750, 900]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_burst_after_a_stall() {
        let handler = Arc::new(ScriptedHandler::scripted(|i| {
            Duration::from_millis(if i == 0 { 450 } else { 10 })
        }));
        let start = Instant::now();

        measure(handler.clone(), &config(1_000, 100, 1)).await;

        assert_eq!(
            offsets(&handler.calls(), start),
            vec![0, 450, 550, 650, 750, 850, 950]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_closed_loop() {
        let handler = Arc::new(ScriptedHandler::fixed(Duration::from_millis(10)));

        let outcome = measure(handler, &config(100, 0, 1)).await;

        assert_eq!(outcome.counts.requests, 10);
    }

    #[tokio::test]
    #[ntest::timeout(10_000)]
    async fn closed_loop_leaves_room_for_the_writer() {
        let writer = MetricsWriter::spawn(tokio::io::sink(), 64);
        let outcome =
            run_measurement(Arc::new(ReadyHandler), &config(200, 0, 1), writer.sender()).await;
        let report = writer.finish(Duration::from_secs(5)).await;

        assert!(outcome.counts.requests > 64, "{:?}", outcome.counts);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.written, outcome.counts.requests);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_keep_independent_schedules() {
        let handler = Arc::new(ScriptedHandler::fixed(Duration::from_millis(10)));

        let outcome = measure(handler, &config(1_000, 500, 2)).await;

        assert_eq!(outcome.counts.requests, 4);
        assert_eq!(outcome.elapsed, Duration::from_millis(1_000));
        assert_eq!(outcome.throughput(), 4.);
    }

    #[tokio::test(start_paused = true)]
    async fn sequence_numbers_are_contiguous() {
        let handler =
            Arc::new(ScriptedHandler::fixed(Duration::from_millis(5)).failing(|i| i % 3 == 0));

        let outcome = measure(handler.clone(), &config(1_000, 50, 4)).await;

        let mut seqs: Vec<u64> = handler.calls().iter().map(|c| c.sequence_number).collect();
        seqs.sort_unstable();
        let expected: Vec<u64> = (1..=outcome.counts.requests).collect();
        assert_eq!(seqs, expected);

        assert!(outcome.counts.successes <= outcome.counts.requests);
        assert_eq!(
            outcome.counts.requests - outcome.counts.successes,
            outcome.counts.requests.div_ceil(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_long_sleeps() {
        let handler = Arc::new(ScriptedHandler::fixed(Duration::from_millis(10)));

        let outcome = measure(handler, &config(1_000, 60_000, 1)).await;

        assert_eq!(outcome.counts.requests, 1);
        assert_eq!(outcome.elapsed, Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_queries_get_a_grace_period() {
        let handler = Arc::new(ScriptedHandler::scripted(|i| {
            Duration::from_millis(if i == 0 { 1_500 } else { 3_600_000 })
        }));

        let outcome = measure(handler.clone(), &config(1_000, 100, 2)).await;

        // Worker A finishes its 1.5s query after the deadline and exits; worker B is aborted.
        assert_eq!(outcome.counts.requests, 2);
        assert_eq!(outcome.counts.successes, 1);
        assert_eq!(
            outcome.elapsed,
            Duration::from_millis(1_000) + MEASURE_SHUTDOWN_GRACE
        );
    }
}
