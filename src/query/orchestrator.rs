//! Query orchestrator (§4.5): builds the two-tier plan, creates per-chunk
//! storage, and schedules chunk execution through the concurrency limiter.
//!
//! Each resolution tier gets its own run directory (mirroring the source's
//! one-queue-per-tier layout), so a caller ends up with up to two
//! `TierRun`s: `[directory_path]/[run-uuid]/group{nr}/data{k}.json`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AlertMagnetError, Result};
use crate::limiter::Limiter;
use crate::query::executor::Executor;
use crate::query::splitter::{halve, split_by_separator, split_by_threshold};
use crate::query::types::{CleanedResponse, QuerySpec, Tier, TierIndex};

pub struct TierRun {
    pub tier: TierIndex,
    pub run_dir: PathBuf,
    pub step: u32,
    /// The window actually dispatched for this tier (post-threshold-split),
    /// not the overall pipeline window — the recent tier's range can be
    /// much narrower than `[global_start, now]` whenever `threshold_days`
    /// is configured.
    pub start: u64,
    pub end: u64,
}

pub struct Orchestrator {
    executor: Arc<Executor>,
    directory_path: PathBuf,
    cores: usize,
    delay: Duration,
}

impl Orchestrator {
    pub fn new(executor: Executor, directory_path: PathBuf, cores: usize, delay: Duration) -> Self {
        Self {
            executor: Arc::new(executor),
            directory_path,
            cores,
            delay,
        }
    }

    /// Runs the full plan (§4.5 steps 1-4) for one top-level `QuerySpec`,
    /// returning one `TierRun` per non-empty tier.
    pub async fn run(
        &self,
        spec: QuerySpec,
        threshold_days: Option<u64>,
        now: u64,
    ) -> Result<Vec<TierRun>> {
        let (recent, long_term) = split_by_threshold(&spec, threshold_days, now);
        let mut runs = Vec::new();

        if let Some(recent_spec) = recent {
            info!("running recent tier (step={})", Tier::RECENT_STEP);
            let (start, end) = (recent_spec.global_start(), recent_spec.global_end());
            let run_dir = self
                .run_tier(recent_spec, Tier::RECENT_SEPARATOR)
                .await?;
            runs.push(TierRun {
                tier: TierIndex::Recent,
                run_dir,
                step: Tier::RECENT_STEP,
                start,
                end,
            });
        }

        if let Some(long_term_spec) = long_term {
            info!("running long-term tier (step={})", Tier::LONG_TERM_STEP);
            let (start, end) = (long_term_spec.global_start(), long_term_spec.global_end());
            let run_dir = self
                .run_tier(long_term_spec, Tier::LONG_TERM_SEPARATOR)
                .await?;
            runs.push(TierRun {
                tier: TierIndex::LongTerm,
                run_dir,
                step: Tier::LONG_TERM_STEP,
                start,
                end,
            });
        }

        Ok(runs)
    }

    async fn run_tier(&self, spec: QuerySpec, separator: u64) -> Result<PathBuf> {
        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = self.directory_path.join(&run_id);
        std::fs::create_dir_all(&run_dir)
            .map_err(|e| AlertMagnetError::filesystem(run_dir.display().to_string(), e))?;

        let chunks = split_by_separator(&spec, separator);
        if chunks.is_empty() {
            return Ok(run_dir);
        }

        let limiter = Limiter::new(self.cores, self.delay);

        for chunk in chunks {
            let group_dir = run_dir.join(format!("group{}", chunk.nr));
            std::fs::create_dir_all(&group_dir)
                .map_err(|e| AlertMagnetError::filesystem(group_dir.display().to_string(), e))?;

            let executor = self.executor.clone();
            let counter = Arc::new(AtomicUsize::new(0));
            limiter.submit(async move {
                execute_chunk(executor, chunk.spec, group_dir, counter).await
            })?;
        }

        limiter.run_all().await?;
        Ok(run_dir)
    }
}

/// Executes one chunk, recursively halving on `EXCEEDED_MAX` (§4.4
/// "Adaptive halving"). Boxed because async fns can't recurse directly.
fn execute_chunk(
    executor: Arc<Executor>,
    spec: QuerySpec,
    group_dir: PathBuf,
    counter: Arc<AtomicUsize>,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
    Box::pin(async move {
        match executor.execute(&spec).await {
            crate::query::types::RawResult::Success(response) => {
                write_data_file(&group_dir, &counter, &response)?;
                Ok(())
            }
            crate::query::types::RawResult::ExceededMax => {
                let start = spec.global_start();
                let end = spec.global_end();
                let mid = halve(start, end);
                warn!(start, end, mid, "chunk exceeded maximum resolution, halving");

                let mut first = spec.clone();
                first.set_end(mid);
                let mut second = spec;
                second.set_start(mid);

                execute_chunk(executor.clone(), first, group_dir.clone(), counter.clone()).await?;
                execute_chunk(executor, second, group_dir, counter).await
            }
            crate::query::types::RawResult::Empty => {
                warn!("chunk returned EMPTY, no file written");
                Ok(())
            }
        }
    })
}

fn write_data_file(
    group_dir: &Path,
    counter: &AtomicUsize,
    response: &CleanedResponse,
) -> Result<()> {
    let k = counter.fetch_add(1, Ordering::SeqCst);
    let path = group_dir.join(format!("data{k}.json"));
    let body = serde_json::to_string_pretty(response)?;
    std::fs::write(&path, body).map_err(|e| AlertMagnetError::filesystem(path.display().to_string(), e))
}
