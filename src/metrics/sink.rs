//! Metrics sink (§4.9): polls the most recent run directories for
//! `alertMeanDurations.json` and `correlating_alerts.json`, republishing
//! their contents as Prometheus gauges whenever the file's mtime changes.
//!
//! Stale label combinations from a prior cycle are never cleared — a
//! `GaugeVec` write only ever adds or overwrites a label set, it never
//! forgets one (§9's documented caveat, not a bug to silently fix).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use prometheus::{GaugeVec, IntCounter, Opts, Registry};
use tracing::info;

use crate::correlation::CORRELATING_ALERTS_FILE;
use crate::duration::ALERT_MEAN_DURATIONS_FILE;
use crate::error::{AlertMagnetError, Result};

pub struct MetricsSink {
    registry: Registry,
    important_true: GaugeVec,
    correlation_coefficient: GaugeVec,
    analyzing_count: IntCounter,
    duration_mtimes: Mutex<BTreeMap<PathBuf, SystemTime>>,
    correlation_mtimes: Mutex<BTreeMap<PathBuf, SystemTime>>,
}

impl MetricsSink {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let important_true = GaugeVec::new(
            Opts::new(
                "alertmagnet_important_true",
                "Indicates whether an alert is important (1) or unimportant (0)",
            ),
            &["alertname"],
        )?;
        let correlation_coefficient = GaugeVec::new(
            Opts::new(
                "alertmagnet_correlation_coefficient",
                "Correlation coefficient between two alerts",
            ),
            &["alertname", "correlating_alert"],
        )?;
        let analyzing_count = IntCounter::new(
            "alertmagnet_analyzing_count",
            "Number of completed analysis cycles",
        )?;

        registry.register(Box::new(important_true.clone()))?;
        registry.register(Box::new(correlation_coefficient.clone()))?;
        registry.register(Box::new(analyzing_count.clone()))?;

        Ok(Self {
            registry,
            important_true,
            correlation_coefficient,
            analyzing_count,
            duration_mtimes: Mutex::new(BTreeMap::new()),
            correlation_mtimes: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    pub fn increment_analyzing_count(&self) {
        self.analyzing_count.inc();
    }

    /// Polls every directory in `run_dirs` for the two analysis artifacts.
    /// Each directory's mtime is tracked independently, so a change in one
    /// run doesn't mask an unrelated change in the other.
    pub fn poll(&self, run_dirs: &[PathBuf]) -> Result<()> {
        self.poll_important_true(run_dirs)?;
        self.poll_correlation_coefficient(run_dirs)?;
        Ok(())
    }

    fn poll_important_true(&self, run_dirs: &[PathBuf]) -> Result<()> {
        let mut seen = self.duration_mtimes.lock().expect("mtime map poisoned");
        for dir in run_dirs {
            let file = dir.join(ALERT_MEAN_DURATIONS_FILE);
            if !file.is_file() {
                continue;
            }
            let Some(mtime) = mtime_of(&file)? else { continue };
            if seen.get(dir) == Some(&mtime) {
                continue;
            }

            let body = std::fs::read_to_string(&file)
                .map_err(|e| AlertMagnetError::filesystem(file.display().to_string(), e))?;
            let data: BTreeMap<String, f64> = serde_json::from_str(&body)?;

            for (alertname, value) in data {
                self.important_true
                    .with_label_values(&[&alertname])
                    .set(value);
            }
            seen.insert(dir.clone(), mtime);
            info!(dir = %dir.display(), "refreshed alertmagnet_important_true");
        }
        Ok(())
    }

    fn poll_correlation_coefficient(&self, run_dirs: &[PathBuf]) -> Result<()> {
        let mut seen = self.correlation_mtimes.lock().expect("mtime map poisoned");
        for dir in run_dirs {
            let file = dir.join(CORRELATING_ALERTS_FILE);
            if !file.is_file() {
                continue;
            }
            let Some(mtime) = mtime_of(&file)? else { continue };
            if seen.get(dir) == Some(&mtime) {
                continue;
            }

            let body = std::fs::read_to_string(&file)
                .map_err(|e| AlertMagnetError::filesystem(file.display().to_string(), e))?;
            let data: BTreeMap<String, BTreeMap<String, f64>> = serde_json::from_str(&body)?;

            for (alertname, correlations) in data {
                for (correlating_alert, value) in correlations {
                    self.correlation_coefficient
                        .with_label_values(&[&alertname, &correlating_alert])
                        .set(value);
                }
            }
            seen.insert(dir.clone(), mtime);
            info!(dir = %dir.display(), "refreshed alertmagnet_correlation_coefficient");
        }
        Ok(())
    }
}

fn mtime_of(path: &Path) -> Result<Option<SystemTime>> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(
            meta.modified()
                .map_err(|e| AlertMagnetError::filesystem(path.display().to_string(), e))?,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AlertMagnetError::filesystem(path.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_publishes_gauge_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().to_path_buf();
        std::fs::write(
            run_dir.join(ALERT_MEAN_DURATIONS_FILE),
            r#"{"HighCpu": 42.0}"#,
        )
        .unwrap();

        let sink = MetricsSink::new().unwrap();
        sink.poll(&[run_dir]).unwrap();

        let families = sink.registry().gather();
        let family = families
            .iter()
            .find(|f| f.name() == "alertmagnet_important_true")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_gauge().value(), 42.0);
    }

    #[test]
    fn poll_is_a_noop_when_mtime_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().to_path_buf();
        let file = run_dir.join(ALERT_MEAN_DURATIONS_FILE);
        std::fs::write(&file, r#"{"A": 1.0}"#).unwrap();

        let sink = MetricsSink::new().unwrap();
        sink.poll(&[run_dir.clone()]).unwrap();
        sink.important_true.with_label_values(&["A"]).set(99.0);
        sink.poll(&[run_dir]).unwrap();

        assert_eq!(sink.important_true.with_label_values(&["A"]).get(), 99.0);
    }

    #[test]
    fn missing_files_are_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MetricsSink::new().unwrap();
        sink.poll(&[dir.path().to_path_buf()]).unwrap();
    }

    #[test]
    fn analyzing_count_increments() {
        let sink = MetricsSink::new().unwrap();
        sink.increment_analyzing_count();
        sink.increment_analyzing_count();
        let families = sink.registry().gather();
        let family = families
            .iter()
            .find(|f| f.name() == "alertmagnet_analyzing_count")
            .unwrap();
        assert_eq!(family.get_metric()[0].get_counter().value(), 2.0);
    }
}
