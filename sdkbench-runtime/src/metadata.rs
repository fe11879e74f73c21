use crate::error::RuntimeError;
use sdkbench::core::{AggregatedResult, LatencyStats, RunConfig, SdkVariant};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Description of one variant's run, written next to its results for later comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub sdk_type: SdkVariant,
    pub test_start_time_ms: i64,
    pub test_end_time_ms: i64,
    pub configured_duration_ms: u64,
    pub actual_duration_ms: u64,
    pub warmup_ms: u64,
    pub threads: usize,
    pub request_interval_ms: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub query_name: String,
    pub throughput_rps: f64,
    pub run_timestamp: String,
    pub success_rate: f64,
    pub os_name: String,
    pub tool_version: String,
    pub latency: LatencyStats,
    pub written_records: u64,
    pub dropped_records: u64,
}

impl RunMetadata {
    pub fn new(config: &RunConfig, result: &AggregatedResult) -> Self {
        Self {
            sdk_type: result.sdk_type,
            test_start_time_ms: result.start_time_ms,
            test_end_time_ms: result.end_time_ms,
            configured_duration_ms: config.duration.as_millis() as u64,
            actual_duration_ms: result.elapsed.as_millis() as u64,
            warmup_ms: config.warmup.as_millis() as u64,
            threads: config.threads,
            request_interval_ms: config.request_interval.as_millis() as u64,
            total_requests: result.total_requests,
            successful_requests: result.total_successes,
            query_name: config.query_name.clone(),
            throughput_rps: result.throughput,
            run_timestamp: config.run_timestamp.clone(),
            success_rate: result.success_rate,
            os_name: std::env::consts::OS.to_string(),
            tool_version: concat!("sdkbench ", env!("CARGO_PKG_VERSION")).to_string(),
            latency: result.latency,
            written_records: result.written,
            dropped_records: result.dropped,
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub async fn write(&self, path: &Path) -> Result<(), RuntimeError> {
        let io_err = |source: std::io::Error| RuntimeError::Metadata {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_vec_pretty(self).map_err(|err| io_err(err.into()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, json).await.map_err(io_err)?;

        info!("Run metadata written to {}", path.display());
        Ok(())
    }
}
