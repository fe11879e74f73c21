use crate::{SdkVariant, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SDK_TYPE_PLACEHOLDER: &str = "{sdk_type}";

/// Everything one benchmark run needs. Read once at startup and never mutated afterwards.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde_as(as = "DurationMilliSeconds")]
    pub duration: Duration,
    #[serde_as(as = "DurationMilliSeconds")]
    pub warmup: Duration,
    pub threads: usize,
    /// Zero means closed loop: the next request is issued as soon as the previous one returns.
    #[serde_as(as = "DurationMilliSeconds")]
    pub request_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds")]
    pub progress_interval: Duration,

    pub connection_string: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde_as(as = "DurationSeconds")]
    pub analytics_timeout: Duration,
    #[serde_as(as = "DurationSeconds")]
    pub connection_timeout: Duration,

    pub query: String,
    pub query_name: String,
    pub output_file: PathBuf,
    pub run_timestamp: String,
    pub queue_capacity: usize,
}

impl RunConfig {
    pub fn new(connection_string: &str, query: &str, output_file: impl Into<PathBuf>) -> Self {
        Self {
            duration: Duration::from_secs(60),
            warmup: Duration::from_secs(5),
            threads: 1,
            request_interval: Duration::from_millis(1_000),
            progress_interval: Duration::from_secs(10),
            connection_string: connection_string.to_string(),
            username: String::new(),
            password: String::new(),
            analytics_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            query: query.to_string(),
            query_name: "query".to_string(),
            output_file: output_file.into(),
            run_timestamp: String::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Results file for one variant.
    ///
    /// `{sdk_type}` in the configured path is replaced by the variant tag. Without the
    /// placeholder, a run that covers several variants gets `_<sdk_type>` inserted before the
    /// extension so variants never append to the same file.
    pub fn output_path(&self, variant: SdkVariant, multi_variant: bool) -> PathBuf {
        per_variant_path(&self.output_file, variant, multi_variant)
    }
}

pub fn per_variant_path(path: &Path, variant: SdkVariant, multi_variant: bool) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.contains(SDK_TYPE_PLACEHOLDER) {
        return PathBuf::from(raw.replace(SDK_TYPE_PLACEHOLDER, variant.as_str()));
    }
    if !multi_variant {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}_{variant}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{variant}"),
    };
    path.with_file_name(file_name)
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("duration", &self.duration)
            .field("warmup", &self.warmup)
            .field("threads", &self.threads)
            .field("request_interval", &self.request_interval)
            .field("progress_interval", &self.progress_interval)
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("analytics_timeout", &self.analytics_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .field("query", &self.query)
            .field("query_name", &self.query_name)
            .field("output_file", &self.output_file)
            .field("run_timestamp", &self.run_timestamp)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}
