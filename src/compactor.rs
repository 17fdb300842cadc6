//! Result compactor (§4.6): merges chunked JSON result files per tier into
//! one per-series stream, deduplicates sample timestamps, and compresses
//! contiguous runs into `(start, duration)` ranges.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AlertMagnetError, Result};
use crate::query::types::CleanedResponse;

pub const FINAL_DATA_FILE: &str = "finalData.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalSeries {
    pub metric: BTreeMap<String, String>,
    pub values: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalData {
    pub status: String,
    pub data: FinalPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalPayload {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<FinalSeries>,
}

/// Canonical fingerprint of a metric label map: since the map is a
/// `BTreeMap`, serializing it is already a stable, sorted-key encoding —
/// two maps with identical key/value sets always collide.
fn fingerprint(metric: &BTreeMap<String, String>) -> String {
    serde_json::to_string(metric).expect("BTreeMap<String,String> always serializes")
}

/// Runs the compactor over `run_dir`. A no-op if `finalData.json` already
/// exists (the recovery/resume contract from §6).
pub fn compact(run_dir: &Path, step: u32) -> Result<()> {
    let final_path = run_dir.join(FINAL_DATA_FILE);
    if final_path.exists() {
        info!(path = %final_path.display(), "finalData.json already present, skipping compaction");
        return Ok(());
    }

    let files = enumerate_chunk_files(run_dir)?;
    if files.is_empty() {
        return Ok(());
    }

    let mut series: Vec<FinalSeries> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();

    for (i, file) in files.iter().enumerate() {
        let body = std::fs::read_to_string(file)
            .map_err(|e| AlertMagnetError::filesystem(file.display().to_string(), e))?;
        let response: CleanedResponse = serde_json::from_str(&body)?;

        if response.status == "error" {
            continue;
        }
        let Some(data) = response.data else { continue };

        if i == 0 {
            for entry in data.result {
                let fp = fingerprint(&entry.metric);
                index.insert(fp, series.len());
                series.push(FinalSeries {
                    metric: entry.metric,
                    values: entry.values.into_iter().map(|v| (v, 0.0)).collect(),
                });
            }
            continue;
        }

        for entry in data.result {
            let fp = fingerprint(&entry.metric);
            if let Some(&idx) = index.get(&fp) {
                series[idx]
                    .values
                    .extend(entry.values.into_iter().map(|v| (v, 0.0)));
            } else {
                index.insert(fp, series.len());
                series.push(FinalSeries {
                    metric: entry.metric,
                    values: entry.values.into_iter().map(|v| (v, 0.0)).collect(),
                });
            }
        }
    }

    for s in &mut series {
        let mut timestamps: Vec<f64> = s.values.iter().map(|(t, _)| *t).collect();
        timestamps.sort_by(|a, b| a.partial_cmp(b).expect("timestamps are never NaN"));
        s.values = time_range_encode(&timestamps, f64::from(step));
    }

    let final_data = FinalData {
        status: "success".to_string(),
        data: FinalPayload {
            result_type: "matrix".to_string(),
            result: series,
        },
    };

    let body = serde_json::to_string_pretty(&final_data)?;
    std::fs::write(&final_path, body)
        .map_err(|e| AlertMagnetError::filesystem(final_path.display().to_string(), e))?;

    for entry in std::fs::read_dir(run_dir)
        .map_err(|e| AlertMagnetError::filesystem(run_dir.display().to_string(), e))?
    {
        let entry = entry.map_err(|e| AlertMagnetError::filesystem(run_dir.display().to_string(), e))?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("group") {
            std::fs::remove_dir_all(entry.path())
                .map_err(|e| AlertMagnetError::filesystem(entry.path().display().to_string(), e))?;
        }
    }

    Ok(())
}

/// Enumerates `group*/data*.json` files in deterministic lexicographic
/// order — the only order guarantee the compactor relies on, since chunk
/// completion order across groups is arbitrary (§5).
fn enumerate_chunk_files(run_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut groups: Vec<std::path::PathBuf> = std::fs::read_dir(run_dir)
        .map_err(|e| AlertMagnetError::filesystem(run_dir.display().to_string(), e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("group"))
        })
        .collect();
    groups.sort();

    let mut files = Vec::new();
    for group in groups {
        let mut group_files: Vec<_> = std::fs::read_dir(&group)
            .map_err(|e| AlertMagnetError::filesystem(group.display().to_string(), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("data") && n.ends_with(".json"))
            })
            .collect();
        group_files.sort();
        files.extend(group_files);
    }

    Ok(files)
}

/// Time-range encoder over a sorted sequence of timestamps with grid step
/// `step`. Folds maximal runs where `t[i+1] == t[i] + step` into
/// `(start, end - start)`; isolated timestamps emit `(t, 0)`; duplicate
/// adjacent timestamps collapse with no effect on the output.
pub fn time_range_encode(sorted_timestamps: &[f64], step: f64) -> Vec<(f64, f64)> {
    if sorted_timestamps.is_empty() {
        return Vec::new();
    }

    let mut dedup: Vec<f64> = Vec::with_capacity(sorted_timestamps.len());
    for &t in sorted_timestamps {
        if dedup.last() != Some(&t) {
            dedup.push(t);
        }
    }

    let mut out = Vec::new();
    let mut run_start = dedup[0];
    let mut run_prev = dedup[0];

    for &t in &dedup[1..] {
        if t == run_prev + step {
            run_prev = t;
        } else {
            out.push((run_start, run_prev - run_start));
            run_start = t;
            run_prev = t;
        }
    }
    out.push((run_start, run_prev - run_start));

    out
}
