//! HTTP implementations of [`SdkHandler`] for both client protocols.
//!
//! Both talk to the analytics service REST API; they differ in endpoint and request encoding the
//! same way the two client SDKs do. Every row of a response is deserialized before the metric is
//! finished, so result consumption is part of the measured latency.
use crate::error::RuntimeError;
use sdkbench::core::{ExecutionMetric, QueryTimer, RunConfig};
use sdkbench::{SdkHandler, SdkVariant};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

mod enterprise;
mod operational;
mod response;

pub use enterprise::EnterpriseHandler;
pub use operational::OperationalHandler;

/// Analytics service port on plain connections.
pub const ANALYTICS_PORT: u16 = 8095;
/// Analytics service port on TLS connections.
pub const ANALYTICS_TLS_PORT: u16 = 18095;

/// Build the handler for `variant`. No request is made; connectivity is checked by the smoke test.
pub fn connect(
    variant: SdkVariant,
    config: &RunConfig,
) -> Result<Arc<dyn SdkHandler>, RuntimeError> {
    let handler: Arc<dyn SdkHandler> = match variant {
        SdkVariant::Operational => Arc::new(OperationalHandler::connect(config)?),
        SdkVariant::Enterprise => Arc::new(EnterpriseHandler::connect(config)?),
    };
    Ok(handler)
}

/// Base URL of the analytics service for a connection string.
///
/// `http(s)://` strings are used as given. `couchbase://` and `couchbases://` strings (and bare
/// host names) resolve to the first listed host on the analytics port; any port in the string
/// belongs to another service and is ignored.
pub fn analytics_base_url(connection_string: &str) -> Result<Url, RuntimeError> {
    let invalid = || RuntimeError::InvalidConnectionString(connection_string.to_string());

    let trimmed = connection_string.trim();
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => ("couchbase".to_string(), trimmed),
    };

    let (http_scheme, port) = match scheme.as_str() {
        "http" | "https" => return Url::parse(trimmed).map_err(|_| invalid()),
        "couchbase" => ("http", ANALYTICS_PORT),
        "couchbases" => ("https", ANALYTICS_TLS_PORT),
        _ => return Err(invalid()),
    };

    let first = rest.split([',', '/', '?']).next().unwrap_or_default();
    let host = match first.strip_prefix('[') {
        Some(v6) => v6
            .split_once(']')
            .map(|(addr, _)| format!("[{addr}]"))
            .ok_or_else(invalid)?,
        None => first.split(':').next().unwrap_or_default().to_string(),
    };
    if host.is_empty() {
        return Err(invalid());
    }

    let mut url = Url::parse(&format!("{http_scheme}://{host}")).map_err(|_| invalid())?;
    url.set_port(Some(port)).map_err(|_| invalid())?;
    Ok(url)
}

/// Connection state shared by both handlers.
pub(crate) struct AnalyticsClient {
    client: reqwest::Client,
    endpoint: Url,
    username: String,
    password: String,
    /// Server-side timeout sent with every request, e.g. `30000ms`.
    server_timeout: String,
    closed: AtomicBool,
}

impl AnalyticsClient {
    pub fn new(config: &RunConfig, path: &str) -> Result<Self, RuntimeError> {
        let endpoint = analytics_base_url(&config.connection_string)?
            .join(path)
            .map_err(|_| RuntimeError::InvalidConnectionString(config.connection_string.clone()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connection_timeout)
            .timeout(config.analytics_timeout)
            .pool_max_idle_per_host(config.threads.max(1))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
            server_timeout: timeout_param(config.analytics_timeout),
            closed: AtomicBool::new(false),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn server_timeout(&self) -> &str {
        &self.server_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Authenticated POST to the query endpoint.
    pub fn post(&self) -> reqwest::RequestBuilder {
        let request = self.client.post(self.endpoint.clone());
        if self.username.is_empty() {
            request
        } else {
            request.basic_auth(&self.username, Some(&self.password))
        }
    }

    /// Send `request` and consume the response into a metric.
    pub async fn execute(
        &self,
        timer: QueryTimer,
        request: reqwest::RequestBuilder,
    ) -> ExecutionMetric {
        if self.is_closed() {
            return timer.failure("connection closed", 0);
        }
        response::consume(timer, request.send().await).await
    }

    pub fn close(&self, variant: SdkVariant) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closed {variant} connection to {}", self.endpoint);
        }
    }
}

fn timeout_param(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis())
}
