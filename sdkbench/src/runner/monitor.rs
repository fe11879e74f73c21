use super::atomics::{PhaseAtomics, PhaseCounts};
use sdkbench_core::SdkVariant;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

/// Logs phase progress every `every` until `deadline`. Aborted by the runner once workers join.
pub(crate) async fn monitor_progress(
    atomics: PhaseAtomics,
    sdk_type: SdkVariant,
    start: Instant,
    deadline: Instant,
    every: Duration,
) {
    if every.is_zero() {
        return;
    }

    let mut interval = tokio::time::interval_at(start + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if Instant::now() > deadline {
            break;
        }

        info!("{}", progress_line(sdk_type, atomics.snapshot(), start.elapsed()));
    }
}

pub(crate) fn progress_line(
    sdk_type: SdkVariant,
    counts: PhaseCounts,
    elapsed: Duration,
) -> String {
    let shown = Duration::from_millis(elapsed.as_millis() as u64);
    format!(
        "{sdk_type} progress: {} elapsed, {} requests, {} successes ({:.2}%), {:.2} RPS",
        humantime::format_duration(shown),
        counts.requests,
        counts.successes,
        counts.success_rate(),
        counts.throughput(elapsed)
    )
}
