use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid connection string {0:?}: expected couchbase://, couchbases:// or http(s)://")]
    InvalidConnectionString(String),

    #[error("Unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("{failed} of {total} SDK runs failed")]
    VariantsFailed { failed: usize, total: usize },

    #[error("Unable to write run metadata {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to start metrics exporter: {0}")]
    Exporter(String),
}
