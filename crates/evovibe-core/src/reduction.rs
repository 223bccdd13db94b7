//! Reduce a candidate's per-trial scores to its fitness.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Average,
    /// Drop the single best and single worst trial, average the rest.
    TrimmedAverage,
    /// Mean scaled by `1 − (best − worst) / expected_range`, floored at zero.
    WeightedAverage,
}

impl Reduction {
    /// Smallest number of trials the reduction is defined for.
    pub fn min_trials(self) -> usize {
        match self {
            Reduction::TrimmedAverage => 3,
            Reduction::Average | Reduction::WeightedAverage => 1,
        }
    }

    /// `expected_range` is the largest spread a trial score can show
    /// (the number of analysed frames for frame-count scores).
    pub fn reduce(self, scores: &[f64], expected_range: f64) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }
        let n = scores.len() as f64;
        let sum: f64 = scores.iter().sum();
        let best = scores.iter().copied().fold(f64::MIN, f64::max);
        let worst = scores.iter().copied().fold(f64::MAX, f64::min);
        match self {
            Reduction::Average => sum / n,
            Reduction::TrimmedAverage if scores.len() >= 3 => (sum - best - worst) / (n - 2.0),
            Reduction::TrimmedAverage => sum / n,
            Reduction::WeightedAverage => {
                if expected_range <= 0.0 {
                    return sum / n;
                }
                let weight = (1.0 - (best - worst) / expected_range).clamp(0.0, 1.0);
                sum / n * weight
            }
        }
    }
}
