//! In-process stand-in for the analytics service, serving both client protocols.
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Form, Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Port the real analytics service listens on.
pub const ANALYTICS_PORT: u16 = 8095;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Server-side latency of every query.
    pub delay: Duration,
    /// Rows returned by a successful query.
    pub rows: u64,
    /// Every n-th query (1-based) fails with a query error and half the rows.
    pub fail_every: Option<u64>,
    /// Queries above this rate are rejected with 503.
    pub max_qps: Option<NonZeroU32>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5),
            rows: 10,
            fail_every: None,
            max_qps: None,
        }
    }
}

#[derive(Clone)]
struct MockState {
    config: Arc<MockConfig>,
    queries: Arc<AtomicU64>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

#[derive(Deserialize)]
struct FormRequest {
    statement: String,
}

#[derive(Deserialize)]
struct JsonRequest {
    statement: String,
    #[serde(default)]
    timeout: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub status: String,
    pub results: Vec<Row>,
    pub errors: Vec<QueryError>,
    pub metrics: ResponseMetrics,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Row {
    pub n: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryError {
    pub code: u32,
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetrics {
    pub result_count: u64,
    pub elapsed_time: String,
}

/// Routes for both endpoints plus the shared query counter.
pub fn router(config: MockConfig) -> (Router, Arc<AtomicU64>) {
    let queries = Arc::new(AtomicU64::new(0));
    let state = MockState {
        limiter: config.max_qps.map(|qps| Arc::new(rate_limiter(qps))),
        config: Arc::new(config),
        queries: queries.clone(),
    };

    let app = Router::new()
        .route("/analytics/service", post(analytics_service))
        .route("/api/v1/request", post(api_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    (app, queries)
}

/// Serve on an ephemeral localhost port in the background.
pub async fn spawn(config: MockConfig) -> anyhow::Result<(SocketAddr, Arc<AtomicU64>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (app, queries) = router(config);

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!("Mock service stopped: {err}");
        }
    });
    debug!("Mock analytics service listening on {addr}");
    Ok((addr, queries))
}

async fn analytics_service(
    State(state): State<MockState>,
    Form(req): Form<FormRequest>,
) -> Result<Json<QueryResponse>, StatusCode> {
    execute(&state, &req.statement).await
}

async fn api_request(
    State(state): State<MockState>,
    Json(req): Json<JsonRequest>,
) -> Result<Json<QueryResponse>, StatusCode> {
    if let Some(timeout) = &req.timeout {
        debug!("Client timeout {timeout}");
    }
    execute(&state, &req.statement).await
}

async fn execute(state: &MockState, statement: &str) -> Result<Json<QueryResponse>, StatusCode> {
    let id = state.queries.fetch_add(1, Ordering::Relaxed) + 1;
    counter!("mock_service_queries").increment(1);

    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            counter!("mock_service_rejected").increment(1);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    }

    debug!("Query {id}: {statement}");
    tokio::time::sleep(state.config.delay).await;

    let failed = state.config.fail_every.is_some_and(|n| n > 0 && id % n == 0);
    let rows = if failed {
        state.config.rows / 2
    } else {
        state.config.rows
    };

    Ok(Json(QueryResponse {
        request_id: id.to_string(),
        status: if failed { "errors" } else { "success" }.to_string(),
        results: (0..rows).map(|n| Row { n }).collect(),
        errors: if failed {
            vec![QueryError {
                code: 23_000,
                msg: format!("Injected failure for query {id}"),
            }]
        } else {
            vec![]
        },
        metrics: ResponseMetrics {
            result_count: rows,
            elapsed_time: format!("{:?}", state.config.delay),
        },
    }))
}

pub fn rate_limiter(qps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(qps))
}

/// Logs the number of queries served in each second.
pub async fn qps_report_task(queries: Arc<AtomicU64>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let total = queries.load(Ordering::Relaxed);
        if total != last {
            info!("{} QPS", total - last);
        }
        last = total;
    }
}
