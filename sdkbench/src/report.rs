use sdkbench_core::{AggregatedResult, SdkVariant};
use std::fmt;
use tracing::info;

const RULE: &str =
    "--------------------------------------------------------------------------------------------";
const COLUMNS: [&str; 6] = ["p50", "p90", "p95", "p99", "p99.9", "max"];

/// Throughput of a contender relative to the baseline (the first variant run).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Faster { variant: SdkVariant, percent: f64 },
    Slower { variant: SdkVariant, percent: f64 },
}

impl Verdict {
    pub fn compare(baseline: &AggregatedResult, contender: &AggregatedResult) -> Option<Self> {
        if baseline.throughput <= 0. {
            return None;
        }

        let percent =
            (contender.throughput - baseline.throughput).abs() / baseline.throughput * 100.;
        let variant = contender.sdk_type;
        Some(if contender.throughput > baseline.throughput {
            Verdict::Faster { variant, percent }
        } else {
            Verdict::Slower { variant, percent }
        })
    }
}

/// Side-by-side summary of every variant that completed.
#[derive(Debug, Clone, Default)]
pub struct ComparisonReport {
    results: Vec<AggregatedResult>,
}

impl ComparisonReport {
    pub fn new(results: Vec<AggregatedResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: AggregatedResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[AggregatedResult] {
        &self.results
    }

    /// The second variant against the first; `None` with fewer than two results or an idle
    /// baseline.
    pub fn verdict(&self) -> Option<Verdict> {
        match self.results.as_slice() {
            [baseline, contender, ..] => Verdict::compare(baseline, contender),
            _ => None,
        }
    }

    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{line}");
        }
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PERFORMANCE COMPARISON REPORT")?;
        writeln!(f, "{}", "=".repeat(37))?;
        for r in &self.results {
            writeln!(
                f,
                "{:<12} {} requests, {:.2}% success, {:.2} RPS",
                format!("{} SDK:", r.sdk_type),
                r.total_requests,
                r.success_rate,
                r.throughput
            )?;
        }

        writeln!(f, "{RULE}")?;
        write!(f, "{:<15}", "SDK")?;
        for column in COLUMNS {
            write!(f, " | {:<10}", format!("{column} (ms)"))?;
        }
        writeln!(f)?;
        writeln!(f, "{RULE}")?;
        for r in &self.results {
            write!(f, "{:<15}", r.sdk_type)?;
            for value in r.latency.as_array() {
                write!(f, " | {value:<10.2}")?;
            }
            writeln!(f)?;
        }
        write!(f, "{RULE}")?;

        match self.verdict() {
            Some(Verdict::Faster { variant, percent }) => {
                write!(f, "\n{variant} SDK is {percent:.2}% FASTER")
            }
            Some(Verdict::Slower { variant, percent }) => {
                write!(f, "\n{variant} SDK is {percent:.2}% slower")
            }
            None => Ok(()),
        }
    }
}
