use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{qps_report_task, router, MockConfig, ANALYTICS_PORT};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(version, about = "Mock analytics service for local benchmark runs")]
struct MockCli {
    #[arg(short, long, default_value_t = ANALYTICS_PORT)]
    port: u16,

    /// Server-side latency per query.
    #[arg(long, default_value_t = 5)]
    delay_ms: u64,

    #[arg(long, default_value_t = 10)]
    rows: u64,

    /// Fail every n-th query.
    #[arg(long)]
    fail_every: Option<u64>,

    /// Reject queries above this rate with 503.
    #[arg(long)]
    max_qps: Option<NonZeroU32>,

    #[arg(long)]
    metrics_listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    let args = MockCli::parse();
    if let Some(addr) = args.metrics_listen {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
    }

    let (app, queries) = router(MockConfig {
        delay: Duration::from_millis(args.delay_ms),
        rows: args.rows,
        fail_every: args.fail_every,
        max_qps: args.max_qps,
    });
    tokio::spawn(qps_report_task(queries));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Mock analytics service listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
