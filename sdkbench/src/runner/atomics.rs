use sdkbench_core::AggregatedResult;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters shared by every worker of one phase. Workers only ever increment them.
#[derive(Clone, Default)]
pub(crate) struct PhaseAtomics {
    requests: Arc<AtomicU64>,
    successes: Arc<AtomicU64>,
    sequence: Arc<AtomicU64>,
}

impl PhaseAtomics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next sequence number of the phase; the first call returns 1.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PhaseCounts {
        // Successes are read first so a concurrent increment can never make them exceed
        // the request count in the snapshot.
        let successes = self.successes.load(Ordering::Acquire);
        let requests = self.requests.load(Ordering::Acquire);
        PhaseCounts {
            requests: requests.max(successes),
            successes,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    pub requests: u64,
    pub successes: u64,
}

impl PhaseCounts {
    pub fn success_rate(&self) -> f64 {
        AggregatedResult::success_rate(self.successes, self.requests)
    }

    /// Successful requests per second. Attempts are not counted: failures and in-flight work
    /// must not inflate throughput.
    pub fn throughput(&self, elapsed: Duration) -> f64 {
        AggregatedResult::throughput(self.successes, elapsed)
    }
}
