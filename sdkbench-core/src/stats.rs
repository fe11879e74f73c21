use crate::SdkVariant;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::fmt;
use std::time::Duration;

/// Latency percentiles of one measurement phase, in milliseconds.
///
/// All zero when the phase produced no records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub p999: f64,
    pub max: f64,
}

impl LatencyStats {
    pub fn as_array(&self) -> [f64; 6] {
        [self.p50, self.p90, self.p95, self.p99, self.p999, self.max]
    }
}

impl fmt::Display for LatencyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p50={:.2}, p90={:.2}, p95={:.2}, p99={:.2}, p99.9={:.2}, max={:.2} (ms)",
            self.p50, self.p90, self.p95, self.p99, self.p999, self.max
        )
    }
}

/// Outcome of one SDK variant's measurement phase.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub sdk_type: SdkVariant,
    pub total_requests: u64,
    pub total_successes: u64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    /// Successful requests per second of actual elapsed time.
    pub throughput: f64,
    #[serde_as(as = "DurationMilliSeconds")]
    pub elapsed: Duration,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub written: u64,
    pub dropped: u64,
    pub latency: LatencyStats,
}

impl AggregatedResult {
    pub fn success_rate(successes: u64, requests: u64) -> f64 {
        if requests == 0 {
            0.
        } else {
            successes as f64 * 100. / requests as f64
        }
    }

    pub fn throughput(successes: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0. {
            successes as f64 / secs
        } else {
            0.
        }
    }
}

impl fmt::Display for AggregatedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} SDK: requests={}, successes={}, success_rate={:.2}%, throughput={:.2} rps, elapsed={:?}, {}",
            self.sdk_type,
            self.total_requests,
            self.total_successes,
            self.success_rate,
            self.throughput,
            self.elapsed,
            self.latency,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_handle_zero_denominators() {
        assert_eq!(AggregatedResult::success_rate(0, 0), 0.);
        assert_eq!(AggregatedResult::success_rate(3, 4), 75.);
        assert_eq!(AggregatedResult::throughput(10, Duration::ZERO), 0.);
        assert_eq!(AggregatedResult::throughput(10, Duration::from_secs(2)), 5.);
    }
}
