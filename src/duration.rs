//! Duration analyzer (§4.7): mean alert duration per alertname, computed
//! from the compactor's `finalData.json`.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::compactor::{FINAL_DATA_FILE, FinalData};
use crate::error::{AlertMagnetError, Result};

pub const ALERT_MEAN_DURATIONS_FILE: &str = "alertMeanDurations.json";

/// Computes the mean duration (summed across all ranges, across all
/// series sharing an `alertname` label) per alertname, and writes
/// `alertMeanDurations.json` into `run_dir`. A no-op if that file already
/// exists or `finalData.json` is absent (recovery contract, §6).
pub fn analyze(run_dir: &Path) -> Result<()> {
    let output_path = run_dir.join(ALERT_MEAN_DURATIONS_FILE);
    if output_path.exists() {
        info!(path = %output_path.display(), "alertMeanDurations.json already present, skipping");
        return Ok(());
    }

    let final_path = run_dir.join(FINAL_DATA_FILE);
    if !final_path.exists() {
        return Ok(());
    }

    let body = std::fs::read_to_string(&final_path)
        .map_err(|e| AlertMagnetError::filesystem(final_path.display().to_string(), e))?;
    let final_data: FinalData = serde_json::from_str(&body)?;

    let means = mean_duration_per_alertname(&final_data);

    let output = serde_json::to_string_pretty(&means)?;
    std::fs::write(&output_path, output)
        .map_err(|e| AlertMagnetError::filesystem(output_path.display().to_string(), e))?;

    Ok(())
}

fn mean_duration_per_alertname(final_data: &FinalData) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for series in &final_data.data.result {
        let Some(alertname) = series.metric.get("alertname") else {
            continue;
        };
        let entry = sums.entry(alertname.clone()).or_insert((0.0, 0));
        for &(_, duration) in &series.values {
            entry.0 += duration;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}
