//! Post-hoc latency percentiles over a persisted results file.
use crate::error::AnalyzeError;
use sdkbench_core::{LatencyStats, NANOS_PER_MILLI};
use serde::Deserialize;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
#[allow(unused_imports)]
use tracing::{debug, info, instrument, warn};

/// The only field the analyzer needs from a results line.
#[derive(Deserialize)]
struct DurationLine {
    duration_nanos: u64,
}

/// Result of analyzing one results stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub stats: LatencyStats,
    /// Records that contributed a duration.
    pub records: usize,
    /// Non-blank lines that could not be parsed.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct LatencyAnalyzer {
    durations: Vec<u64>,
    lines: usize,
    skipped: usize,
}

impl LatencyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(name = "analyze", skip_all, fields(path = %path.display()))]
    pub async fn analyze_file(path: &Path) -> Result<Analysis, AnalyzeError> {
        info!("Calculating latency percentiles");
        let io_err = |source| AnalyzeError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let mut lines = BufReader::new(file).lines();

        let mut analyzer = Self::new();
        while let Some(line) = lines.next_line().await.map_err(io_err)? {
            analyzer.push_line(&line);
        }

        let analysis = analyzer.finish();
        info!("Latency stats calculated: {}", analysis.stats);
        Ok(analysis)
    }

    pub fn analyze_lines<I, S>(lines: I) -> Analysis
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut analyzer = Self::new();
        for line in lines {
            analyzer.push_line(line.as_ref());
        }
        analyzer.finish()
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.lines += 1;

        match serde_json::from_str::<DurationLine>(line) {
            Ok(parsed) => self.durations.push(parsed.duration_nanos),
            Err(err) => {
                self.skipped += 1;
                debug!("Skipping unparseable line {}: {err}", self.lines);
            }
        }
    }

    pub fn push_duration(&mut self, nanos: u64) {
        self.lines += 1;
        self.durations.push(nanos);
    }

    pub fn finish(mut self) -> Analysis {
        if self.skipped > 0 {
            warn!(
                "Failed to parse {} out of {} lines ({:.2}%)",
                self.skipped,
                self.lines,
                self.skipped as f64 * 100. / self.lines as f64
            );
        }
        if self.durations.is_empty() {
            warn!("No duration data found, latency stats are all zero");
        }

        let records = self.durations.len();
        Analysis {
            stats: latency_stats(&mut self.durations),
            records,
            skipped: self.skipped,
        }
    }
}

/// Sorts `durations` (nanoseconds) in place and derives the percentile summary.
pub fn latency_stats(durations: &mut [u64]) -> LatencyStats {
    if durations.is_empty() {
        return LatencyStats::default();
    }
    durations.sort_unstable();

    let ms = |nanos: f64| nanos / NANOS_PER_MILLI;
    LatencyStats {
        p50: ms(percentile(durations, 50.)),
        p90: ms(percentile(durations, 90.)),
        p95: ms(percentile(durations, 95.)),
        p99: ms(percentile(durations, 99.)),
        p999: ms(percentile(durations, 99.9)),
        max: ms(durations[durations.len() - 1] as f64),
    }
}

/// Percentile `p` (0-100) of an ascending slice, interpolating linearly between the two
/// closest ranks. Zero for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.;
    }

    let index = (p / 100.) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted[lower] as f64;
    }

    let weight = index - lower as f64;
    let (lo, hi) = (sorted[lower] as f64, sorted[upper] as f64);
    lo + weight * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdkbench_core::{QueryTimer, SdkVariant};
    use std::io::Write;

    const MS: u64 = 1_000_000;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn interpolates_between_ranks() {
        let mut durations = vec![50 * MS, 10 * MS, 40 * MS, 30 * MS, 20 * MS];
        let stats = latency_stats(&mut durations);

        assert!(close(stats.p50, 30.));
        assert!(close(stats.p90, 46.));
        assert!(close(stats.p95, 48.));
        assert!(close(stats.p99, 49.6));
        assert!(close(stats.max, 50.));
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(latency_stats(&mut []), LatencyStats::default());
        let analysis = LatencyAnalyzer::analyze_lines(Vec::<String>::new());
        assert_eq!(analysis.records, 0);
        assert_eq!(analysis.stats.as_array(), [0.; 6]);
    }

    #[test]
    fn single_value_is_every_percentile() {
        let stats = latency_stats(&mut [7 * MS]);
        assert_eq!(stats.as_array(), [7.; 6]);
    }

    #[test]
    fn percentiles_are_monotonic() {
        // Deterministic but irregular spread with heavy tail and duplicates.
        let mut durations: Vec<u64> = (0..2_000u64)
            .map(|i| (i * 7_919 % 1_013) * 1_000 + if i % 97 == 0 { 900 * MS } else { 0 })
            .collect();
        let stats = latency_stats(&mut durations);

        let values = stats.as_array();
        assert!(values.windows(2).all(|w| w[0] <= w[1]), "{stats:?}");
        assert!(stats.p50 > 0.);
    }

    #[tracing_test::traced_test]
    #[test]
    fn malformed_lines_are_skipped_and_reported() {
        let good = serde_json::to_string(
            &QueryTimer::start(SdkVariant::Operational, "q", 1).success(1),
        )
        .unwrap();
        let lines = vec![
            good.clone(),
            "{not json".to_string(),
            String::new(),
            r#"{"success": true}"#.to_string(),
            r#"{"duration_nanos": 20000000}"#.to_string(),
        ];

        let analysis = LatencyAnalyzer::analyze_lines(&lines);
        assert_eq!(analysis.records, 2);
        assert_eq!(analysis.skipped, 2);
        assert!(close(analysis.stats.max, 20.));
        assert!(logs_contain("Failed to parse 2 out of 4 lines"));
    }

    #[tokio::test]
    async fn reads_results_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for ms in [10u64, 20, 30, 40, 50] {
            writeln!(file, r#"{{"duration_nanos": {}, "success": true}}"#, ms * MS).unwrap();
        }
        file.flush().unwrap();

        let analysis = LatencyAnalyzer::analyze_file(file.path()).await.unwrap();
        assert_eq!(analysis.records, 5);
        assert!(close(analysis.stats.p90, 46.));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = LatencyAnalyzer::analyze_file(&dir.path().join("absent.jsonl")).await;
        assert!(matches!(res, Err(AnalyzeError::Io { .. })));
    }
}
