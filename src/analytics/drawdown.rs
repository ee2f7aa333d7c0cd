//! Underwater-streak drawdown distribution
//!
//! A path's drawdown length is the longest run of consecutive steps it
//! trades below the reference price. Step 0 is never scanned.

use serde::Serialize;

use crate::simulation::PathEnsemble;

/// Bucket labels, in order
pub const DRAWDOWN_LABELS: [&str; 5] = ["0-10d", "11-20d", "21-30d", "31-40d", "41d+"];

/// Lower bounds of the half-open buckets `[0,10) [10,20) [20,30) [30,40) [40,inf)`
const BUCKET_FLOORS: [usize; 5] = [0, 10, 20, 30, 40];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownDistribution {
    pub average_drawdown_days: f64,
    pub bin_labels: Vec<String>,
    /// Per-bucket path counts, summing to the number of paths
    pub counts: Vec<usize>,
}

/// Longest run of steps `1..` with `price < s0`
pub fn max_underwater_streak(path: &[f32], s0: f32) -> usize {
    let mut streak = 0usize;
    let mut max_streak = 0usize;
    for &price in path.iter().skip(1) {
        if price < s0 {
            streak += 1;
            max_streak = max_streak.max(streak);
        } else {
            streak = 0;
        }
    }
    max_streak
}

pub fn bucket_index(streak: usize) -> usize {
    BUCKET_FLOORS
        .iter()
        .rposition(|&floor| streak >= floor)
        .unwrap_or(0)
}

/// Streak statistics for every path. Prices are compared against `s0` at
/// the grid's own f32 precision.
pub fn drawdown_distribution(ensemble: &PathEnsemble, s0: f64) -> DrawdownDistribution {
    let threshold = s0 as f32;
    let mut counts = vec![0usize; DRAWDOWN_LABELS.len()];
    let mut total = 0usize;

    for path in ensemble.paths() {
        let streak = max_underwater_streak(path, threshold);
        counts[bucket_index(streak)] += 1;
        total += streak;
    }

    DrawdownDistribution {
        average_drawdown_days: total as f64 / ensemble.n_paths() as f64,
        bin_labels: DRAWDOWN_LABELS.iter().map(|s| s.to_string()).collect(),
        counts,
    }
}
