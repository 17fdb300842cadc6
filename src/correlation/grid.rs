//! Binary presence grid (§4.8 step 3): samples an alertname's `(start,
//! duration)` ranges onto the tick grid `start, start+G, ..., <end`.
//!
//! `duration` here is a count of gaps, not seconds — a range `(s, d)`
//! occupies exactly the ticks `s, s+G, ..., s+d*G`.

/// Produces the binary sequence for one alertname's ranges. `ranges` need
/// not be pre-sorted; this sorts a copy by ascending start (ties broken by
/// duration) before sampling.
pub fn sample_ranges(ranges: &[(f64, f64)], start: f64, end: f64, gap: f64) -> Vec<u8> {
    assert!(gap > 0.0, "gap must be positive");

    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .expect("range start is never NaN")
            .then(a.1.partial_cmp(&b.1).expect("range duration is never NaN"))
    });

    let num_ticks = if end <= start {
        0
    } else {
        ((end - start) / gap).ceil() as usize
    };

    (0..num_ticks)
        .map(|k| {
            let tick = start + k as f64 * gap;
            let occupied = sorted.iter().any(|&(s, d)| {
                if tick < s {
                    return false;
                }
                let span_end = s + d * gap;
                if tick > span_end {
                    return false;
                }
                let steps = (tick - s) / gap;
                (steps - steps.round()).abs() < 1e-6
            });
            u8::from(occupied)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ranges_yield_all_zero_grid() {
        let samples = sample_ranges(&[], 0.0, 300.0, 60.0);
        assert_eq!(samples, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn single_range_marks_occupied_ticks() {
        let samples = sample_ranges(&[(60.0, 2.0)], 0.0, 300.0, 60.0);
        assert_eq!(samples, vec![0, 1, 1, 1, 0]);
    }

    #[test]
    fn unsorted_input_is_sorted_before_sampling() {
        let a = sample_ranges(&[(180.0, 0.0), (0.0, 1.0)], 0.0, 300.0, 60.0);
        let b = sample_ranges(&[(0.0, 1.0), (180.0, 0.0)], 0.0, 300.0, 60.0);
        assert_eq!(a, b);
    }

    #[test]
    fn sequence_length_depends_only_on_window_not_ranges() {
        let a = sample_ranges(&[(60.0, 1.0)], 0.0, 300.0, 60.0);
        let b = sample_ranges(&[], 0.0, 300.0, 60.0);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn isolated_zero_duration_range_marks_one_tick() {
        let samples = sample_ranges(&[(120.0, 0.0)], 0.0, 300.0, 60.0);
        assert_eq!(samples, vec![0, 0, 1, 0, 0]);
    }
}
