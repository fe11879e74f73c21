mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use sdkbench::SdkVariant;
use sdkbench_runtime::{BenchRuntime, RuntimeError};
use std::path::Path;
use std::time::Duration;

fn read_lines(path: &Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30_000)]
async fn compares_both_variants() {
    init();
    let (conn, _) = mock(MockConfig {
        delay: Duration::from_millis(2),
        rows: 20,
        fail_every: None,
        max_qps: None,
    })
    .await;
    let dir = tempfile::tempdir().unwrap();

    let config = run_config(&conn, &dir.path().join("results.jsonl"));
    let report = BenchRuntime::new(config)
        .variants(&SdkVariant::ALL)
        .metadata_file(Some(dir.path().join("meta").join("{sdk_type}.json")))
        .run()
        .await
        .unwrap();

    assert_eq!(report.results().len(), 2);
    for (result, variant) in report.results().iter().zip(SdkVariant::ALL) {
        assert_eq!(result.sdk_type, variant);
        // 2 workers, one query every 100ms for 1s.
        assert!((18..=22).contains(&result.total_requests), "{result}");
        assert_eq!(result.total_successes, result.total_requests);
        assert_eq!(result.success_rate, 100.);
        assert_eq!(result.dropped, 0);
        assert!(result.latency.p50 >= 2.);
        assert!(result.latency.max >= result.latency.p99);

        let lines = read_lines(&dir.path().join(format!("results_{variant}.jsonl")));
        assert_eq!(lines.len() as u64, result.total_requests);
        for line in &lines {
            assert_eq!(line["sdk_type"], variant.as_str());
            assert_eq!(line["query_name"], "numbers");
            assert_eq!(line["success"], true);
            assert!(line.get("error_message").is_none());
            assert_eq!(line["row_count"], 20);
            assert!(line["duration_nanos"].as_u64().unwrap() >= 2_000_000);
        }

        let meta: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("meta").join(format!("{variant}.json")))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(meta["total_requests"], result.total_requests);
        assert_eq!(meta["configured_duration_ms"], 1_000);
    }

    assert!(report.verdict().is_some());
    assert!(report.to_string().contains("p99.9 (ms)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(30_000)]
async fn failed_variant_fails_the_run() {
    init();
    let (conn, queries) = mock(MockConfig {
        fail_every: Some(1),
        ..MockConfig::default()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("{sdk_type}.jsonl");

    let err = BenchRuntime::new(run_config(&conn, &output))
        .variants(&SdkVariant::ALL)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::VariantsFailed {
            failed: 2,
            total: 2
        }
    ));
    // Only the two smoke tests ran.
    assert_eq!(queries.load(std::sync::atomic::Ordering::Relaxed), 2);
    assert!(!dir.path().join("operational.jsonl").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ntest::timeout(30_000)]
async fn unreachable_service_fails_the_smoke_test() {
    init();
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let res = BenchRuntime::new(run_config(
        &format!("http://{addr}"),
        &dir.path().join("out.jsonl"),
    ))
    .run()
    .await;

    assert!(matches!(
        res,
        Err(RuntimeError::VariantsFailed { failed: 1, .. })
    ));
}
