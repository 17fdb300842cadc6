//! Pipeline wiring (§6 recovery contract, §5 outer loop): one query ->
//! compact -> duration -> correlate cycle, and the daily `serve` loop
//! that repeats it while exposing `/metrics`.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, info};

use crate::compactor;
use crate::config::AppConfig;
use crate::correlation::{self, CorrelationConfig};
use crate::duration;
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::paths;
use crate::query::executor::Executor;
use crate::query::orchestrator::Orchestrator;
use crate::query::types::{QuerySpec, TierIndex};
use crate::time::compute_start;

/// Runs one full cycle: query, compact, analyze durations, correlate.
/// Returns the run directories produced (for the metrics sink to poll).
pub async fn run_once(config: &AppConfig) -> Result<Vec<PathBuf>> {
    let now = unix_now();
    let start = compute_start(now, &config.max_long_term_storage)?;

    let executor = Executor::new(config.cert.as_deref())?;
    let orchestrator = Orchestrator::new(
        executor,
        config.directory_path.clone(),
        config.cores,
        config.delay,
    );

    let spec = QuerySpec::new(config.api_endpoint.clone(), start, now, 60, "0s");
    let tier_runs = orchestrator.run(spec, config.threshold_days, now).await?;

    let mut run_dirs = Vec::with_capacity(tier_runs.len());
    for tier_run in &tier_runs {
        info!(dir = %tier_run.run_dir.display(), tier = ?tier_run.tier, "compacting tier");
        compactor::compact(&tier_run.run_dir, tier_run.step)?;
        duration::analyze(&tier_run.run_dir)?;

        if tier_run.tier == TierIndex::Recent {
            let corr_config = CorrelationConfig {
                gap: tier_run.step,
                cores: config.cores,
                delay: config.delay,
                retain_threshold: 0.0,
            };
            correlation::analyze(&tier_run.run_dir, &corr_config, tier_run.start, tier_run.end)
                .await?;
        }

        run_dirs.push(tier_run.run_dir.clone());
    }

    Ok(run_dirs)
}

/// Runs `run_once` repeatedly, sleeping `naptime_seconds` between
/// cycles, purging all but the two most recent run directories, and
/// refreshing the metrics sink after every cycle. Runs until the process
/// is terminated.
pub async fn serve_loop(config: AppConfig, metrics: &MetricsSink) -> Result<()> {
    let mut last_run_dirs: Vec<PathBuf> = Vec::new();

    loop {
        match run_once(&config).await {
            Ok(run_dirs) => {
                last_run_dirs = run_dirs;
                metrics.increment_analyzing_count();
            }
            Err(e) => {
                error!(error = %e, "analysis cycle failed, will retry next cycle");
            }
        }

        if let Err(e) = paths::purge_old_runs(&config.directory_path, 2) {
            error!(error = %e, "failed to purge old run directories");
        }

        if let Err(e) = metrics.poll(&last_run_dirs) {
            error!(error = %e, "failed to refresh metrics sink");
        }

        tokio::time::sleep(Duration::from_secs(config.naptime_seconds)).await;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
