use mock_service::MockConfig;
use sdkbench::RunConfig;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new(
                "sdkbench=debug,sdkbench_runtime=debug,mock_service=info",
            ))
            .with_test_writer()
            .try_init();
    });
}

/// Start a mock service and return a connection string pointing at it.
#[allow(unused)]
pub async fn mock(config: MockConfig) -> (String, Arc<AtomicU64>) {
    let (addr, queries) = mock_service::spawn(config).await.unwrap();
    (format!("http://{addr}"), queries)
}

/// Short run suitable for tests.
#[allow(unused)]
pub fn run_config(connection_string: &str, output: &Path) -> RunConfig {
    let mut config = RunConfig::new(connection_string, "SELECT n FROM numbers", output);
    config.duration = Duration::from_millis(1_000);
    config.warmup = Duration::from_millis(200);
    config.threads = 2;
    config.request_interval = Duration::from_millis(100);
    config.progress_interval = Duration::from_millis(400);
    config.connection_timeout = Duration::from_secs(2);
    config.analytics_timeout = Duration::from_secs(2);
    config.query_name = "numbers".to_string();
    config.username = "bench".to_string();
    config.password = "secret".to_string();
    config
}
