//! Default sdkbench runtime
//!
//! Runs every requested SDK variant one after another against the same service, each with its
//! own results file, then logs a comparison. A failed variant does not prevent the next one from
//! running, but makes the overall run fail.
use crate::error::RuntimeError;
use crate::handlers;
use crate::metadata::RunMetadata;
use clap::Parser;
use sdkbench::core::{per_variant_path, DEFAULT_QUEUE_CAPACITY};
use sdkbench::{
    AggregatedResult, BenchError, BenchmarkRunner, ComparisonReport, RunConfig, SdkVariant,
};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Open-loop latency benchmark for two analytics client SDKs")]
pub struct BenchCli {
    /// Measurement phase length.
    #[arg(long, env = "BENCHMARK_DURATION_MS", default_value_t = 60_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub duration_ms: u64,

    /// Unpaced warmup before measuring; 0 disables it.
    #[arg(long, env = "BENCHMARK_WARMUP_MS", default_value_t = 5_000)]
    pub warmup_ms: u64,

    /// Concurrent workers.
    #[arg(short, long, env = "BENCHMARK_THREADS", default_value = "1")]
    pub threads: NonZeroUsize,

    /// Per-worker query cadence; 0 or negative runs closed loop.
    #[arg(long, env = "BENCHMARK_REQUEST_INTERVAL_MS", default_value_t = 1_000,
          allow_negative_numbers = true)]
    pub request_interval_ms: i64,

    #[arg(long, env = "BENCHMARK_PROGRESS_INTERVAL_MS", default_value_t = 10_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub progress_report_interval_ms: u64,

    /// Per-query timeout.
    #[arg(long, env = "BENCHMARK_ANALYTICS_TIMEOUT_S", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub analytics_timeout_s: u64,

    /// Connect timeout, also bounding the smoke test.
    #[arg(long, env = "BENCHMARK_CONNECTION_TIMEOUT_S", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub connection_timeout_s: u64,

    #[arg(short, long, env = "CLUSTER_CONNECTION_STRING")]
    pub connection_string: String,

    #[arg(short, long, env = "CLUSTER_USERNAME", default_value = "")]
    pub username: String,

    #[arg(short, long, env = "CLUSTER_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(short, long, env = "BENCHMARK_QUERY")]
    pub query: String,

    #[arg(long, env = "BENCHMARK_QUERY_NAME", default_value = "query")]
    pub query_name: String,

    /// Results file; `{sdk_type}` is replaced by the variant.
    #[arg(short, long, env = "BENCHMARK_OUTPUT_FILE")]
    pub output_file: PathBuf,

    /// Free-form label recorded in the run metadata.
    #[arg(long, env = "BENCHMARK_RUN_TIMESTAMP", default_value = "")]
    pub run_timestamp: String,

    /// Variants to run, in order; the first one is the comparison baseline.
    #[arg(short, long, env = "BENCHMARK_SDK_TYPE", value_delimiter = ',',
          default_value = "operational")]
    pub sdk_type: Vec<SdkVariant>,

    #[arg(long, env = "BENCHMARK_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Per-variant run metadata (JSON); `{sdk_type}` is replaced by the variant.
    #[arg(long, env = "BENCHMARK_METADATA_FILE")]
    pub metadata_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this address while running.
    #[arg(long, env = "BENCHMARK_METRICS_LISTEN")]
    pub metrics_listen: Option<SocketAddr>,
}

impl BenchCli {
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.connection_string, &self.query, &self.output_file);
        config.duration = Duration::from_millis(self.duration_ms);
        config.warmup = Duration::from_millis(self.warmup_ms);
        config.threads = self.threads.get();
        config.request_interval = Duration::from_millis(self.request_interval_ms.max(0) as u64);
        config.progress_interval = Duration::from_millis(self.progress_report_interval_ms);
        config.username = self.username.clone();
        config.password = self.password.clone();
        config.analytics_timeout = Duration::from_secs(self.analytics_timeout_s);
        config.connection_timeout = Duration::from_secs(self.connection_timeout_s);
        config.query_name = self.query_name.clone();
        config.run_timestamp = self.run_timestamp.clone();
        config.queue_capacity = self.queue_capacity;
        config
    }
}

/// Default sdkbench runtime.
///
/// # Example
///
/// ```no_run
/// use sdkbench_runtime::BenchRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     let report = BenchRuntime::with_args().run().await;
///     std::process::exit(if report.is_ok() { 0 } else { 1 });
/// }
/// ```
pub struct BenchRuntime {
    config: Arc<RunConfig>,
    variants: Vec<SdkVariant>,
    metadata_file: Option<PathBuf>,
    metrics_listen: Option<SocketAddr>,
}

impl BenchRuntime {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
            variants: vec![SdkVariant::Operational],
            metadata_file: None,
            metrics_listen: None,
        }
    }

    /// Configure from command line flags and `BENCHMARK_*` / `CLUSTER_*` environment variables.
    ///
    /// Exits the process with usage information on invalid input.
    pub fn with_args() -> Self {
        Self::from_cli(BenchCli::parse())
    }

    pub fn from_cli(cli: BenchCli) -> Self {
        Self::new(cli.run_config())
            .variants(&cli.sdk_type)
            .metadata_file(cli.metadata_file)
            .metrics_listen(cli.metrics_listen)
    }

    /// Variants to run in order. Duplicates are ignored.
    pub fn variants(mut self, variants: &[SdkVariant]) -> Self {
        self.variants.clear();
        for variant in variants {
            if !self.variants.contains(variant) {
                self.variants.push(*variant);
            }
        }
        self
    }

    pub fn metadata_file(mut self, path: Option<PathBuf>) -> Self {
        self.metadata_file = path;
        self
    }

    pub fn metrics_listen(mut self, addr: Option<SocketAddr>) -> Self {
        self.metrics_listen = addr;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[instrument(name = "sdkbench", skip_all)]
    pub async fn run(self) -> Result<ComparisonReport, RuntimeError> {
        info!("Benchmark configuration: {:?}", self.config);
        if let Some(addr) = self.metrics_listen {
            install_exporter(addr)?;
        }

        let total = self.variants.len();
        let multi_variant = total > 1;
        let mut report = ComparisonReport::default();
        let mut failed = 0;

        for &variant in &self.variants {
            let output = self.config.output_path(variant, multi_variant);
            info!("Running {variant} SDK, results in {}", output.display());

            let result = match self.run_variant(variant, &output).await {
                Ok(result) => result,
                Err(err) => {
                    error!("{variant} SDK run failed: {err}");
                    failed += 1;
                    continue;
                }
            };

            if let Some(path) = &self.metadata_file {
                let path = per_variant_path(path, variant, multi_variant);
                if let Err(err) = RunMetadata::new(&self.config, &result).write(&path).await {
                    error!("{err}");
                    failed += 1;
                }
            }
            report.push(result);
        }

        if !report.results().is_empty() {
            report.log();
        }

        if failed > 0 {
            Err(RuntimeError::VariantsFailed { failed, total })
        } else {
            Ok(report)
        }
    }

    async fn run_variant(
        &self,
        variant: SdkVariant,
        output: &Path,
    ) -> Result<AggregatedResult, BenchError> {
        let handler = handlers::connect(variant, &self.config)
            .map_err(|err| BenchError::Connect(err.to_string()))?;
        BenchmarkRunner::new(self.config.clone())
            .run(handler, output)
            .await
    }
}

#[cfg(feature = "metrics")]
fn install_exporter(addr: SocketAddr) -> Result<(), RuntimeError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| RuntimeError::Exporter(err.to_string()))?;
    info!("Serving Prometheus metrics on {addr}");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_exporter(addr: SocketAddr) -> Result<(), RuntimeError> {
    warn!("Built without the `metrics` feature, not serving metrics on {addr}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<BenchCli, clap::Error> {
        let base = [
            "sdkbench",
            "--connection-string",
            "couchbase://db",
            "--query",
            "SELECT 1",
            "--output-file",
            "out/{sdk_type}.jsonl",
        ];
        BenchCli::try_parse_from(base.iter().chain(args))
    }

    #[test]
    fn flags_become_run_config() {
        let cli = parse(&[
            "--duration-ms",
            "1500",
            "--threads",
            "4",
            "--request-interval-ms",
            "250",
            "--password",
            "secret",
        ])
        .unwrap();

        let config = cli.run_config();
        assert_eq!(config.duration, Duration::from_millis(1_500));
        assert_eq!(config.threads, 4);
        assert_eq!(config.request_interval, Duration::from_millis(250));
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn negative_interval_means_closed_loop() {
        let cli = parse(&["--request-interval-ms", "-5"]).unwrap();
        assert_eq!(cli.run_config().request_interval, Duration::ZERO);
    }

    #[test]
    fn variant_list_is_comma_separated() {
        let cli = parse(&["--sdk-type", "enterprise,operational,enterprise"]).unwrap();
        let runtime = BenchRuntime::from_cli(cli);
        assert_eq!(
            runtime.variants,
            vec![SdkVariant::Enterprise, SdkVariant::Operational]
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse(&["--threads", "0"]).is_err());
        assert!(parse(&["--duration-ms", "0"]).is_err());
        assert!(parse(&["--duration-ms", "soon"]).is_err());
        assert!(parse(&["--sdk-type", "legacy"]).is_err());
        assert!(BenchCli::try_parse_from(["sdkbench", "--query", "SELECT 1"]).is_err());
    }
}
