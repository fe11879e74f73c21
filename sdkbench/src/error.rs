use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Smoke test did not complete within {0:?}")]
    SmokeTestTimeout(Duration),

    #[error("Smoke test query failed: {0}")]
    SmokeTestFailed(String),

    #[error("No results persisted: {0}")]
    Writer(#[from] WriterError),

    #[error("Latency analysis failed: {0}")]
    Analyze(#[from] AnalyzeError),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Unable to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to open output file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Unable to read results file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
