use super::atomics::{PhaseAtomics, PhaseCounts};
use super::join_workers;
use crate::handler::SdkHandler;
use futures_util::FutureExt;
use sdkbench_core::{
    sampled_sequence, RunConfig, WARMUP_QUERY_NAME, WARMUP_SHUTDOWN_GRACE, WORKER_ID,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// Unpaced load that brings connection pools and server caches to steady state.
///
/// Results are counted but never persisted, and failures never abort the run.
#[instrument(name = "warmup", skip_all, fields(sdk_type = %handler.sdk_type()))]
pub(crate) async fn run_warmup(handler: Arc<dyn SdkHandler>, config: &RunConfig) -> PhaseCounts {
    if config.warmup.is_zero() {
        info!("Warmup disabled");
        return PhaseCounts::default();
    }

    info!(
        "Running warmup for {} with {} workers",
        humantime::format_duration(config.warmup),
        config.threads
    );

    let atomics = PhaseAtomics::new();
    let deadline = Instant::now() + config.warmup;
    let query: Arc<str> = config.query.as_str().into();

    let workers = (0..config.threads)
        .map(|id| {
            tokio::spawn(WORKER_ID.scope(
                id,
                warmup_worker(handler.clone(), query.clone(), atomics.clone(), deadline),
            ))
        })
        .collect();
    join_workers(workers, deadline + WARMUP_SHUTDOWN_GRACE, "warmup").await;

    let counts = atomics.snapshot();
    info!(
        "Warmup complete: {} queries, {} failed",
        counts.requests,
        counts.requests - counts.successes
    );
    counts
}

async fn warmup_worker(
    handler: Arc<dyn SdkHandler>,
    query: Arc<str>,
    atomics: PhaseAtomics,
    deadline: Instant,
) {
    while Instant::now() < deadline {
        let seq = atomics.next_sequence();
        atomics.record_request();

        let outcome = AssertUnwindSafe(handler.execute_query(&query, WARMUP_QUERY_NAME, seq))
            .catch_unwind()
            .await;
        match outcome {
            Ok(metric) if metric.success() => atomics.record_success(),
            Ok(metric) => {
                if sampled_sequence(seq) {
                    debug!(
                        "Warmup query #{seq} failed: {}",
                        metric.error_message().unwrap_or_default()
                    );
                }
            }
            Err(_) => error!("Handler panicked during warmup query #{seq}"),
        }

        // Handlers that complete without suspending must not starve the runtime.
        tokio::task::yield_now().await;
    }
}
