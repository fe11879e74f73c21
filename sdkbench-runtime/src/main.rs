use sdkbench_runtime::BenchRuntime;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sdkbench=info,sdkbench_runtime=info")),
        )
        .init();

    match BenchRuntime::with_args().run().await {
        Ok(_) => {
            info!("Benchmark completed successfully");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Benchmark failed: {err}");
            ExitCode::FAILURE
        }
    }
}
