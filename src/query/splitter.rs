//! Range splitter (§4.4): threshold split across resolution tiers,
//! separator split into chunks, and the midpoint helper used by adaptive
//! halving in the orchestrator.

use crate::query::types::{Chunk, QuerySpec, Tier};

/// Splits `spec` into a recent-tier spec and a long-term-tier spec at
/// `now - threshold_days`. Returns `(recent, long_term)`; either side is
/// `None` when its interval is empty.
///
/// `threshold_days = None` means "no split": everything goes to the
/// recent tier, matching the original's "no threshold configured" path.
pub fn split_by_threshold(
    spec: &QuerySpec,
    threshold_days: Option<u64>,
    now: u64,
) -> (Option<QuerySpec>, Option<QuerySpec>) {
    let Some(threshold_days) = threshold_days else {
        return (Some(spec.clone()), None);
    };

    let start = spec.global_start();
    let end = spec.global_end();
    let split = now.saturating_sub(threshold_days.saturating_mul(86_400));

    if end > split && split > start {
        let mut recent = spec.clone();
        recent.set_start(split);
        recent.set_end(end);
        recent.params.step = Tier::RECENT_STEP.to_string();
        recent.params.max_source_resolution = "0s".to_string();

        let mut long_term = spec.clone();
        long_term.set_start(start);
        long_term.set_end(split);
        long_term.params.step = Tier::LONG_TERM_STEP.to_string();
        long_term.params.max_source_resolution = "1h".to_string();

        (Some(recent), Some(long_term))
    } else if split > end {
        (None, Some(spec.clone()))
    } else if start > split {
        (Some(spec.clone()), None)
    } else {
        (None, None)
    }
}

/// Walks `[global_start, global_end)` in steps of `separator`, producing
/// dense, contiguous chunks. The final chunk's end is forced to exactly
/// `global_end` (the remainder is folded into the tail chunk rather than
/// creating a short trailing one).
pub fn split_by_separator(spec: &QuerySpec, separator: u64) -> Vec<Chunk> {
    assert!(separator > 0, "separator must be positive");

    let global_start = spec.global_start();
    let global_end = spec.global_end();

    let mut chunks = Vec::new();
    let mut start = global_start;
    let mut nr = 0usize;

    loop {
        let end = start + separator;
        if end < global_end {
            chunks.push(make_chunk(spec, nr, start, end));
            nr += 1;
            start = end;
        } else {
            chunks.push(make_chunk(spec, nr, start, global_end));
            break;
        }
    }

    chunks
}

fn make_chunk(spec: &QuerySpec, nr: usize, start: u64, end: u64) -> Chunk {
    let mut chunk_spec = spec.clone();
    chunk_spec.set_start(start);
    chunk_spec.set_end(end);
    Chunk {
        nr,
        start,
        end,
        spec: chunk_spec,
    }
}

/// Midpoint used by adaptive halving (§4.4) when the executor reports
/// `EXCEEDED_MAX` for a chunk.
pub fn halve(start: u64, end: u64) -> u64 {
    start + (end - start) / 2
}
