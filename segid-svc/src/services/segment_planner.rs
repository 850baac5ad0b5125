//! Segment planning
//!
//! Maps an asset duration to a short, deterministic list of windows worth
//! sampling. Priority order, stopping as soon as the target count is reached:
//!
//! 1. Assets no longer than one window are sampled whole.
//! 2. The first minute is densely packed (short clips often sit at the start).
//! 3. Windows centred at 25%, 50% and 85% of the duration.
//! 4. Evenly spaced centres across the asset, at most `2 × count` candidates.
//!
//! Windows shorter than [`MIN_WINDOW_SECS`] or overlapping an already planned
//! window are skipped.

use thiserror::Error;

use crate::models::SegmentWindow;

/// Shortest window worth submitting for recognition
pub const MIN_WINDOW_SECS: f64 = 5.0;

/// Length of the densely sampled prefix
pub const DENSE_PREFIX_SECS: f64 = 60.0;

/// Fractional positions sampled after the dense prefix
pub const SAMPLE_POSITIONS: [f64; 3] = [0.25, 0.50, 0.85];

/// Planning input rejected before any I/O
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(f64),

    #[error("Invalid window length: {0} seconds")]
    InvalidWindowLength(f64),

    #[error("Window count must be at least 1")]
    InvalidWindowCount,
}

/// Window planner with fixed length and count
#[derive(Debug, Clone, Copy)]
pub struct SegmentPlanner {
    window_length: f64,
    window_count: usize,
}

impl SegmentPlanner {
    pub fn new(window_length: f64, window_count: usize) -> Self {
        Self {
            window_length,
            window_count,
        }
    }

    pub fn window_length(&self) -> f64 {
        self.window_length
    }

    pub fn plan(&self, duration: f64) -> Result<Vec<SegmentWindow>, PlanError> {
        plan_windows(duration, self.window_length, self.window_count)
    }
}

/// Plan up to `window_count` windows of `window_length` seconds over `[0, duration]`
pub fn plan_windows(
    duration: f64,
    window_length: f64,
    window_count: usize,
) -> Result<Vec<SegmentWindow>, PlanError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(PlanError::InvalidDuration(duration));
    }
    if !window_length.is_finite() || window_length <= 0.0 {
        return Err(PlanError::InvalidWindowLength(window_length));
    }
    if window_count == 0 {
        return Err(PlanError::InvalidWindowCount);
    }

    if duration <= window_length {
        return Ok(vec![SegmentWindow::new(0, 0.0, duration)]);
    }

    let mut plan = Plan {
        windows: Vec::with_capacity(window_count),
        duration,
        window_length,
        target: window_count,
    };

    // Dense prefix
    let dense_end = duration.min(DENSE_PREFIX_SECS);
    let mut slot = 0usize;
    loop {
        let start = slot as f64 * window_length;
        if start >= dense_end || plan.is_full() {
            break;
        }
        plan.try_push(start, (start + window_length).min(dense_end));
        slot += 1;
    }

    // Representative positions
    for position in SAMPLE_POSITIONS {
        if plan.is_full() {
            break;
        }
        plan.try_push_centered(duration * position);
    }

    // Even spread
    let candidates = window_count * 2;
    for k in 0..candidates {
        if plan.is_full() {
            break;
        }
        let center = duration * (2 * k + 1) as f64 / (2 * candidates) as f64;
        plan.try_push_centered(center);
    }

    Ok(plan.windows)
}

struct Plan {
    windows: Vec<SegmentWindow>,
    duration: f64,
    window_length: f64,
    target: usize,
}

impl Plan {
    fn is_full(&self) -> bool {
        self.windows.len() >= self.target
    }

    fn try_push_centered(&mut self, center: f64) {
        let half = self.window_length / 2.0;
        self.try_push(center - half, center + half);
    }

    fn try_push(&mut self, start: f64, end: f64) {
        let start = start.max(0.0);
        let end = end.min(self.duration);
        if end - start < MIN_WINDOW_SECS {
            return;
        }

        let candidate = SegmentWindow::new(self.windows.len(), start, end);
        if self.windows.iter().any(|w| w.overlaps(&candidate)) {
            return;
        }
        self.windows.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(windows: &[SegmentWindow]) -> Vec<(f64, f64)> {
        windows.iter().map(|w| (w.start, w.end)).collect()
    }

    #[test]
    fn test_ten_minute_asset_plan() {
        let windows = plan_windows(600.0, 15.0, 6).unwrap();
        assert_eq!(
            ranges(&windows),
            vec![
                (0.0, 15.0),
                (15.0, 30.0),
                (30.0, 45.0),
                (45.0, 60.0),
                (142.5, 157.5),
                (292.5, 307.5),
            ]
        );
        let indices: Vec<_> = windows.iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_short_asset_is_single_window() {
        let windows = plan_windows(12.0, 15.0, 6).unwrap();
        assert_eq!(ranges(&windows), vec![(0.0, 12.0)]);

        // Tiny assets are still sampled whole
        let windows = plan_windows(2.0, 15.0, 6).unwrap();
        assert_eq!(ranges(&windows), vec![(0.0, 2.0)]);
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert_eq!(plan_windows(0.0, 15.0, 6), Err(PlanError::InvalidDuration(0.0)));
        assert!(plan_windows(-3.0, 15.0, 6).is_err());
        assert!(plan_windows(f64::NAN, 15.0, 6).is_err());
        assert!(plan_windows(100.0, 0.0, 6).is_err());
        assert_eq!(plan_windows(100.0, 15.0, 0), Err(PlanError::InvalidWindowCount));
    }

    #[test]
    fn test_dense_prefix_drops_short_tail() {
        // 0-15, 15-30, 30-45; the 2s tail is dropped and later candidates all overlap
        let windows = plan_windows(47.0, 15.0, 6).unwrap();
        assert_eq!(ranges(&windows), vec![(0.0, 15.0), (15.0, 30.0), (30.0, 45.0)]);
    }

    #[test]
    fn test_large_count_uses_even_spread() {
        let windows = plan_windows(3600.0, 15.0, 10).unwrap();
        assert_eq!(windows.len(), 10);
        // Four dense + three positional + three spread
        assert!(windows[7..].iter().all(|w| w.start >= 60.0));
    }

    #[test]
    fn test_plan_invariants_over_many_durations() {
        for tenth_seconds in (1..20_000).step_by(37) {
            let duration = tenth_seconds as f64 / 10.0;
            for (length, count) in [(15.0, 6), (10.0, 3), (30.0, 12), (7.0, 1)] {
                let windows = plan_windows(duration, length, count).unwrap();
                assert!(!windows.is_empty(), "D={} produced no windows", duration);
                assert!(windows.len() <= count);

                for (i, w) in windows.iter().enumerate() {
                    assert_eq!(w.index, i);
                    assert!(0.0 <= w.start && w.start < w.end && w.end <= duration);
                    if duration > length {
                        assert!(w.length() >= MIN_WINDOW_SECS, "D={} window {:?}", duration, w);
                    }
                    for other in &windows[i + 1..] {
                        assert!(!w.overlaps(other), "D={} {:?} overlaps {:?}", duration, w, other);
                    }
                }
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        for duration in [16.0, 75.5, 600.0, 7200.0] {
            let planner = SegmentPlanner::new(15.0, 6);
            assert_eq!(planner.plan(duration), planner.plan(duration));
        }
    }
}
