mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use sdkbench::{SdkHandler, SdkVariant};
use sdkbench_runtime::handlers;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn quick(rows: u64) -> MockConfig {
    MockConfig {
        delay: Duration::from_millis(1),
        rows,
        fail_every: None,
        max_qps: None,
    }
}

#[tokio::test]
async fn both_variants_consume_every_row() {
    init();
    let (conn, queries) = mock(quick(25)).await;
    let config = run_config(&conn, Path::new("unused.jsonl"));

    for variant in SdkVariant::ALL {
        let handler = handlers::connect(variant, &config).unwrap();
        let metric = handler.execute_query("SELECT n", "numbers", 7).await;

        assert!(metric.success(), "{variant}: {:?}", metric.error_message());
        assert_eq!(metric.row_count(), 25);
        assert_eq!(metric.sdk_type(), variant);
        assert_eq!(metric.sequence_number(), 7);
        assert!(metric.duration() >= Duration::from_millis(1));
    }
    assert_eq!(queries.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn query_errors_keep_partial_rows() {
    init();
    let (conn, _) = mock(MockConfig {
        fail_every: Some(1),
        ..quick(10)
    })
    .await;
    let config = run_config(&conn, Path::new("unused.jsonl"));

    for variant in SdkVariant::ALL {
        let handler = handlers::connect(variant, &config).unwrap();
        let metric = handler.execute_query("SELECT n", "numbers", 1).await;

        assert!(!metric.success());
        assert_eq!(metric.row_count(), 5);
        assert!(metric.error_message().unwrap().contains("Injected failure"));
    }
}

#[tokio::test]
async fn rejected_requests_have_no_rows() {
    init();
    let (conn, _) = mock(MockConfig {
        max_qps: NonZeroU32::new(1),
        ..quick(10)
    })
    .await;
    let config = run_config(&conn, Path::new("unused.jsonl"));
    let handler = handlers::connect(SdkVariant::Enterprise, &config).unwrap();

    assert!(handler.execute_query("SELECT n", "numbers", 1).await.success());
    let rejected = handler.execute_query("SELECT n", "numbers", 2).await;

    assert!(!rejected.success());
    assert_eq!(rejected.row_count(), 0);
    assert!(rejected.error_message().unwrap().contains("503"));
}

#[tokio::test]
#[ntest::timeout(10_000)]
async fn unreachable_service_is_a_failed_metric() {
    init();
    // Bind and drop to find a port nothing listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let config = run_config(&format!("http://{addr}"), Path::new("unused.jsonl"));
    let handler = handlers::connect(SdkVariant::Operational, &config).unwrap();

    let metric = handler.execute_query("SELECT 1", "numbers", 1).await;

    assert!(!metric.success());
    assert_eq!(metric.row_count(), 0);
    assert!(metric.error_message().is_some());
}

#[tokio::test]
async fn closed_handler_fails_fast() {
    init();
    let (conn, queries) = mock(quick(1)).await;
    let config = run_config(&conn, Path::new("unused.jsonl"));
    let handler = handlers::connect(SdkVariant::Operational, &config).unwrap();

    handler.close().await;
    handler.close().await;
    let metric = handler.execute_query("SELECT 1", "numbers", 1).await;

    assert!(!metric.success());
    assert_eq!(metric.error_message(), Some("connection closed"));
    assert_eq!(queries.load(Ordering::Relaxed), 0);
}

#[test]
fn invalid_connection_string_is_rejected() {
    let config = run_config("ftp://db", Path::new("unused.jsonl"));
    assert!(handlers::connect(SdkVariant::Enterprise, &config).is_err());
}
