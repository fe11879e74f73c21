use sdkbench::core::{ExecutionMetric, QueryTimer};
use serde::Deserialize;

/// Longest slice of an error body quoted in a failure message.
const BODY_SNIPPET: usize = 200;

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    /// Rows are fully deserialized: decoding them is part of consuming the result.
    #[serde(default)]
    results: Vec<serde_json::Value>,
    #[serde(default)]
    errors: Vec<ServiceError>,
}

#[derive(Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: String,
}

/// Turn a sent request into a finished metric.
///
/// Transport errors and non-2xx statuses are failures with zero rows. A readable response is a
/// success only with status `success` and no errors; otherwise the rows received so far are
/// still counted.
pub(crate) async fn consume(
    timer: QueryTimer,
    sent: Result<reqwest::Response, reqwest::Error>,
) -> ExecutionMetric {
    let response = match sent {
        Ok(response) => response,
        Err(err) => return timer.failure(describe(&err), 0),
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => return timer.failure(describe(&err), 0),
    };

    if !status.is_success() {
        return timer.failure(format!("HTTP {status}: {}", snippet(&body)), 0);
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(err) => return timer.failure(format!("Malformed response: {err}"), 0),
    };

    let rows = envelope.results.len() as u64;

    let succeeded = envelope.status.as_deref().unwrap_or("success") == "success";
    if succeeded && envelope.errors.is_empty() {
        return timer.success(rows);
    }

    let message = if envelope.errors.is_empty() {
        format!("Query status {}", envelope.status.as_deref().unwrap_or_default())
    } else {
        envelope
            .errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{code}: {}", e.msg),
                None => e.msg.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    };
    timer.failure(message, rows)
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Timed out: {err}")
    } else if err.is_connect() {
        format!("Connection failed: {err}")
    } else {
        format!("Request failed: {err}")
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(BODY_SNIPPET) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
