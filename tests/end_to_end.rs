//! End-to-end scenarios from spec.md §8, exercised against a mocked
//! metrics backend (wiremock) and scratch run directories (tempfile).
//!
//! Each test wires the real query -> compact -> duration -> correlate
//! chain together exactly as `pipeline::run_once` does, but drives the
//! orchestrator directly so each scenario can script the backend's
//! responses precisely.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use alertmagnet::compactor;
use alertmagnet::correlation::{self, CorrelationConfig};
use alertmagnet::duration;
use alertmagnet::query::executor::Executor;
use alertmagnet::query::orchestrator::Orchestrator;
use alertmagnet::query::types::QuerySpec;

fn success_body(series: Vec<(&str, &str, Vec<(u64, &str)>)>) -> serde_json::Value {
    let result: Vec<_> = series
        .into_iter()
        .map(|(alertname, cluster, points)| {
            let values: Vec<_> = points
                .into_iter()
                .map(|(ts, state)| json!([ts as f64, state]))
                .collect();
            json!({
                "metric": {"alertname": alertname, "cluster": cluster},
                "values": values,
            })
        })
        .collect();

    json!({
        "status": "success",
        "data": {"resultType": "matrix", "result": result},
    })
}

/// Scenario 1: two small chunks, no halving. A tiny two-hour window split
/// into two 3600s chunks; each returns one series. The compactor should
/// merge them into a single series in `finalData.json`.
#[tokio::test]
async fn two_small_chunks_merge_into_one_final_series() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(vec![(
            "HighCPU",
            "clusterA",
            vec![(0, "1"), (60, "1")],
        )])))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let executor = Executor::with_client(reqwest::Client::new());
    let orchestrator = Orchestrator::new(
        executor,
        tmp.path().to_path_buf(),
        4,
        Duration::from_millis(0),
    );

    // A two-day window with no threshold split lands entirely in the
    // recent tier, whose 86400s separator naturally yields two day-long
    // chunks (group0, group1).
    let spec = QuerySpec::new(server.uri() + "/", 0, 172_800, 60, "0s");
    let tier_runs = orchestrator
        .run(spec, None, 172_800)
        .await
        .expect("orchestrator run");
    let run = tier_runs[0].run_dir.clone();

    assert!(run.join("group0").exists());
    assert!(run.join("group1").exists());

    compactor::compact(&run, 60).unwrap();
    let final_data_path = run.join(compactor::FINAL_DATA_FILE);
    assert!(final_data_path.exists());

    let final_data: compactor::FinalData =
        serde_json::from_str(&std::fs::read_to_string(&final_data_path).unwrap()).unwrap();
    assert_eq!(final_data.data.result.len(), 1);
    assert_eq!(final_data.data.result[0].metric["alertname"], "HighCPU");

    // compaction deletes the groupN working directories once merged.
    assert!(!run.join("group0").exists());
    assert!(!run.join("group1").exists());
}

/// Scenario 2: one chunk exceeds once. A 2h request fails with the
/// `bad_data` / "exceeded maximum resolution" sentinel; each 1h half
/// succeeds, leaving two `dataK.json` files in the one group directory.
#[tokio::test]
async fn exceeded_max_halves_into_two_data_files() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(wiremock::matchers::query_param("start", "0"))
        .and(wiremock::matchers::query_param("end", "7200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "exceeded maximum resolution of 11,000 points per timeseries",
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(wiremock::matchers::query_param("end", "3600"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(vec![(
            "HighCPU",
            "clusterA",
            vec![(0, "1")],
        )])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(wiremock::matchers::query_param("start", "3600"))
        .and(wiremock::matchers::query_param("end", "7200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body(vec![(
            "HighCPU",
            "clusterA",
            vec![(3600, "1")],
        )])))
        .mount(&server)
        .await;

    let tmp = tempfile::tempdir().unwrap();
    let executor = Executor::with_client(reqwest::Client::new());
    let orchestrator = Orchestrator::new(
        executor,
        tmp.path().to_path_buf(),
        4,
        Duration::from_millis(0),
    );

    // A 2h window fits inside the recent tier's 86400s separator as a
    // single chunk, which the executor must halve once after the
    // EXCEEDED_MAX sentinel.
    let spec = QuerySpec::new(server.uri() + "/", 0, 7200, 60, "0s");
    let tier_runs = orchestrator
        .run(spec, None, 7200)
        .await
        .expect("orchestrator run");
    let run = tier_runs[0].run_dir.clone();

    let group_dir = run.join("group0");
    assert!(group_dir.join("data0.json").exists());
    assert!(group_dir.join("data1.json").exists());
}

/// Scenario 4: duration means. A final series for alertname `X` with
/// ranges `[(100,30),(500,10)]` yields `alertMeanDurations.json["X"] == 20`.
#[tokio::test]
async fn duration_means_match_literal_example() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path();

    let final_data = json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [{
                "metric": {"alertname": "X", "cluster": "a"},
                "values": [[100.0, 30.0], [500.0, 10.0]],
            }],
        },
    });
    std::fs::write(
        run_dir.join(compactor::FINAL_DATA_FILE),
        serde_json::to_string(&final_data).unwrap(),
    )
    .unwrap();

    duration::analyze(run_dir).unwrap();

    let means: std::collections::BTreeMap<String, f64> = serde_json::from_str(
        &std::fs::read_to_string(run_dir.join(duration::ALERT_MEAN_DURATIONS_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(means["X"], 20.0);
}

/// Scenario 5: correlation across two clusters. Cluster A: x=[1,1,0,0],
/// y=[1,1,0,0] => r=1. Cluster B: x=[1,0,1,0], y=[0,1,0,1] => r=-1.
/// The averaged matrix entry for (x,y) must be 0.
#[tokio::test]
async fn correlation_averages_opposite_signs_to_zero() {
    let tmp = tempfile::tempdir().unwrap();
    let run_dir = tmp.path();

    // Grid ticks at 0, 60, 120, 180 (gap=60). A presence range (start, d)
    // occupies start, start+gap, ..., start+d*gap, so a lone tick at
    // position i is range (i*60, 0).
    let final_data = json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [
                series("x", "a", vec![(0, 0), (60, 0)]),
                series("y", "a", vec![(0, 0), (60, 0)]),
                series("x", "b", vec![(0, 0), (120, 0)]),
                series("y", "b", vec![(60, 0), (180, 0)]),
            ],
        },
    });
    std::fs::write(
        run_dir.join(compactor::FINAL_DATA_FILE),
        serde_json::to_string(&final_data).unwrap(),
    )
    .unwrap();

    let config = CorrelationConfig {
        gap: 60,
        cores: 4,
        delay: Duration::from_millis(0),
        retain_threshold: -1.0,
    };
    correlation::analyze(run_dir, &config, 0, 240).await.unwrap();

    let matrix: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(run_dir.join("corrcoefficient_matrix.json")).unwrap(),
    )
    .unwrap();
    let alerts: Vec<String> = serde_json::from_value(matrix["alerts"].clone()).unwrap();
    let x_idx = alerts.iter().position(|a| a == "x").unwrap();
    let y_idx = alerts.iter().position(|a| a == "y").unwrap();

    let rows: Vec<Vec<f64>> = serde_json::from_value(matrix["matrix"].clone()).unwrap();
    assert!((rows[x_idx][y_idx]).abs() < 1e-9);
    assert!((rows[y_idx][x_idx]).abs() < 1e-9);
}

fn series(alertname: &str, cluster: &str, points: Vec<(u64, u64)>) -> serde_json::Value {
    // Ranges are (start, duration_in_grid_ticks); stored in finalData.json
    // as (start, duration) pairs, the same shape the compactor produces.
    let values: Vec<_> = points
        .into_iter()
        .map(|(start, dur)| json!([start as f64, dur as f64]))
        .collect();
    json!({
        "metric": {"alertname": alertname, "cluster": cluster},
        "values": values,
    })
}
