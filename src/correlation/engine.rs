//! Correlation engine (§4.8): clusters `finalData.json` series by cluster
//! label, samples each alertname onto a binary tick grid, and accumulates
//! pairwise Pearson coefficients into a global matrix.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compactor::{FINAL_DATA_FILE, FinalData};
use crate::correlation::grid::sample_ranges;
use crate::correlation::pearson::pearson;
use crate::error::{AlertMagnetError, Result};
use crate::limiter::Limiter;

pub const FILTERED_DATA_FILE: &str = "filteredData.json";
pub const MATRIX_FILE: &str = "corrcoefficient_matrix.json";
pub const CORRELATING_ALERTS_FILE: &str = "correlating_alerts.json";

pub struct CorrelationConfig {
    pub gap: u32,
    pub cores: usize,
    pub delay: Duration,
    /// Minimum coefficient retained in `correlating_alerts.json`. Default
    /// 0.0 keeps every non-negative off-diagonal pair.
    pub retain_threshold: f64,
}

/// `cluster -> alertname -> ranges`.
type FilteredData = BTreeMap<String, BTreeMap<String, Vec<(f64, f64)>>>;

#[derive(Debug, Serialize, Deserialize)]
struct MatrixArtifact {
    alerts: Vec<String>,
    matrix: Vec<Vec<f64>>,
}

/// Runs the full correlation pipeline over `run_dir`'s `finalData.json`
/// (producing `filteredData.json` along the way if absent), writing
/// `corrcoefficient_matrix.json` and `correlating_alerts.json`. A no-op if
/// `correlating_alerts.json` already exists (recovery contract, §6).
pub async fn analyze(
    run_dir: &Path,
    config: &CorrelationConfig,
    start: u64,
    end: u64,
) -> Result<()> {
    let correlating_path = run_dir.join(CORRELATING_ALERTS_FILE);
    if correlating_path.exists() {
        info!(path = %correlating_path.display(), "correlating_alerts.json already present, skipping");
        return Ok(());
    }

    let filtered = load_or_build_filtered(run_dir)?;
    if filtered.is_empty() {
        return Ok(());
    }

    let mut alerts: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for alertnames in filtered.values() {
        alerts.extend(alertnames.keys().cloned());
    }
    let alerts: Vec<String> = alerts.into_iter().collect();
    let index: BTreeMap<String, usize> = alerts
        .iter()
        .cloned()
        .enumerate()
        .map(|(i, a)| (a, i))
        .collect();

    let n = alerts.len();
    let matrix: Arc<Mutex<Vec<Vec<(f64, usize)>>>> =
        Arc::new(Mutex::new(vec![vec![(0.0, 0usize); n]; n]));

    let limiter = Limiter::new(config.cores, config.delay);
    let gap = f64::from(config.gap);
    let start_f = start as f64;
    let end_f = end as f64;

    for (_cluster, alertname_ranges) in filtered {
        let matrix = matrix.clone();
        let index = index.clone();
        limiter.submit(async move {
            correlate_cluster(&alertname_ranges, &index, start_f, end_f, gap, &matrix);
            Ok(())
        })?;
    }
    limiter.run_all().await?;

    let matrix = Arc::try_unwrap(matrix)
        .expect("no outstanding references after run_all completes")
        .into_inner()
        .expect("correlation matrix mutex poisoned");

    let collapsed = collapse(&matrix);
    write_artifacts(run_dir, &alerts, &collapsed, config.retain_threshold)?;

    Ok(())
}

fn load_or_build_filtered(run_dir: &Path) -> Result<FilteredData> {
    let filtered_path = run_dir.join(FILTERED_DATA_FILE);
    if filtered_path.exists() {
        let body = std::fs::read_to_string(&filtered_path)
            .map_err(|e| AlertMagnetError::filesystem(filtered_path.display().to_string(), e))?;
        return Ok(serde_json::from_str(&body)?);
    }

    let final_path = run_dir.join(FINAL_DATA_FILE);
    if !final_path.exists() {
        return Ok(BTreeMap::new());
    }
    let body = std::fs::read_to_string(&final_path)
        .map_err(|e| AlertMagnetError::filesystem(final_path.display().to_string(), e))?;
    let final_data: FinalData = serde_json::from_str(&body)?;

    let filtered = filter_by_cluster(&final_data);

    let out_body = serde_json::to_string(&filtered)?;
    std::fs::write(&filtered_path, out_body)
        .map_err(|e| AlertMagnetError::filesystem(filtered_path.display().to_string(), e))?;

    Ok(filtered)
}

/// Groups series by `cluster`, dropping `alertstate == "pending"` entries
/// and any series missing a `cluster` or `alertname` label (§4.8 step 1).
fn filter_by_cluster(final_data: &FinalData) -> FilteredData {
    let mut out: FilteredData = BTreeMap::new();

    for series in &final_data.data.result {
        if series.metric.get("alertstate").map(String::as_str) == Some("pending") {
            continue;
        }
        let Some(cluster) = series.metric.get("cluster") else {
            continue;
        };
        let Some(alertname) = series.metric.get("alertname") else {
            continue;
        };

        out.entry(cluster.clone())
            .or_default()
            .entry(alertname.clone())
            .or_default()
            .extend(series.values.iter().copied());
    }

    out
}

fn correlate_cluster(
    alertname_ranges: &BTreeMap<String, Vec<(f64, f64)>>,
    index: &BTreeMap<String, usize>,
    start: f64,
    end: f64,
    gap: f64,
    matrix: &Mutex<Vec<Vec<(f64, usize)>>>,
) {
    let names: Vec<&String> = alertname_ranges.keys().collect();
    let samples: BTreeMap<&String, Vec<u8>> = names
        .iter()
        .map(|&name| (name, sample_ranges(&alertname_ranges[name], start, end, gap)))
        .collect();

    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let a = names[i];
            let b = names[j];
            let r = pearson(&samples[a], &samples[b]);
            let ia = index[a];
            let ib = index[b];

            let mut guard = matrix.lock().expect("correlation matrix mutex poisoned");
            let cell = &mut guard[ia][ib];
            cell.0 += r;
            cell.1 += 1;
        }
    }
}

/// Collapses accumulated `(sum, count)` cells to `sum/count`, `0` when
/// `count == 0`, and mirrors the upper triangle onto the lower one (§4.8
/// step 6).
fn collapse(matrix: &[Vec<(f64, usize)>]) -> Vec<Vec<f64>> {
    let n = matrix.len();
    let mut out = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            let (sum, count) = matrix[i][j];
            if count > 0 {
                out[i][j] = sum / count as f64;
            }
        }
    }
    for i in 0..n {
        for j in (i + 1)..n {
            let v = out[i][j];
            if out[j][i] == 0.0 {
                out[j][i] = v;
            }
        }
    }
    out
}

fn write_artifacts(
    run_dir: &Path,
    alerts: &[String],
    matrix: &[Vec<f64>],
    retain_threshold: f64,
) -> Result<()> {
    let matrix_artifact = MatrixArtifact {
        alerts: alerts.to_vec(),
        matrix: matrix.to_vec(),
    };
    let matrix_path = run_dir.join(MATRIX_FILE);
    std::fs::write(&matrix_path, serde_json::to_string_pretty(&matrix_artifact)?)
        .map_err(|e| AlertMagnetError::filesystem(matrix_path.display().to_string(), e))?;

    let mut correlating: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for (i, a) in alerts.iter().enumerate() {
        for (j, b) in alerts.iter().enumerate() {
            if i == j {
                continue;
            }
            let coefficient = matrix[i][j];
            if coefficient >= retain_threshold {
                correlating
                    .entry(a.clone())
                    .or_default()
                    .insert(b.clone(), coefficient);
            }
        }
    }

    let correlating_path = run_dir.join(CORRELATING_ALERTS_FILE);
    std::fs::write(&correlating_path, serde_json::to_string_pretty(&correlating)?)
        .map_err(|e| AlertMagnetError::filesystem(correlating_path.display().to_string(), e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactor::{FinalPayload, FinalSeries};

    fn metric(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn filter_drops_pending_and_groups_by_cluster() {
        let final_data = FinalData {
            status: "success".to_string(),
            data: FinalPayload {
                result_type: "matrix".to_string(),
                result: vec![
                    FinalSeries {
                        metric: metric(&[
                            ("cluster", "a"),
                            ("alertname", "X"),
                            ("alertstate", "firing"),
                        ]),
                        values: vec![(0.0, 1.0)],
                    },
                    FinalSeries {
                        metric: metric(&[
                            ("cluster", "a"),
                            ("alertname", "Y"),
                            ("alertstate", "pending"),
                        ]),
                        values: vec![(10.0, 1.0)],
                    },
                ],
            },
        };

        let filtered = filter_by_cluster(&final_data);
        assert_eq!(filtered.len(), 1);
        let cluster = &filtered["a"];
        assert_eq!(cluster.len(), 1);
        assert!(cluster.contains_key("X"));
    }

    #[tokio::test]
    async fn two_cluster_average_matches_expected_coefficient() {
        let dir = tempfile::tempdir().unwrap();

        // Both clusters give X and Y the identical range set (0,0),(120,0),
        // which on a [0,240) grid with gap=60 samples to [1,0,1,0] for
        // both series — a clean r=1 per cluster, so the averaged result
        // must also be exactly 1.
        let ranges = vec![(0.0, 0.0), (120.0, 0.0)];
        let final_data = FinalData {
            status: "success".to_string(),
            data: FinalPayload {
                result_type: "matrix".to_string(),
                result: vec![
                    FinalSeries {
                        metric: metric(&[("cluster", "a"), ("alertname", "X")]),
                        values: ranges.clone(),
                    },
                    FinalSeries {
                        metric: metric(&[("cluster", "a"), ("alertname", "Y")]),
                        values: ranges.clone(),
                    },
                    FinalSeries {
                        metric: metric(&[("cluster", "b"), ("alertname", "X")]),
                        values: ranges.clone(),
                    },
                    FinalSeries {
                        metric: metric(&[("cluster", "b"), ("alertname", "Y")]),
                        values: ranges,
                    },
                ],
            },
        };
        std::fs::write(
            dir.path().join(FINAL_DATA_FILE),
            serde_json::to_string(&final_data).unwrap(),
        )
        .unwrap();

        let config = CorrelationConfig {
            gap: 60,
            cores: 2,
            delay: Duration::from_millis(0),
            retain_threshold: -2.0,
        };
        analyze(dir.path(), &config, 0, 240).await.unwrap();

        let correlating: BTreeMap<String, BTreeMap<String, f64>> = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(CORRELATING_ALERTS_FILE)).unwrap(),
        )
        .unwrap();
        let r = correlating["X"]["Y"];
        assert!((r - 1.0).abs() < 1e-9, "expected perfect correlation, got {r}");
    }

    #[tokio::test]
    async fn analyze_is_idempotent_when_output_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CORRELATING_ALERTS_FILE);
        std::fs::write(&path, "{}").unwrap();

        let config = CorrelationConfig {
            gap: 60,
            cores: 1,
            delay: Duration::from_millis(0),
            retain_threshold: 0.0,
        };
        analyze(dir.path(), &config, 0, 100).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }
}
