//! Arena usability and roulette-wheel selection.

use serde::{Deserialize, Serialize};

/// Temperature band an arena must sit in before it may run a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperaturePolicy {
    /// Set-point every worker heats to, °C
    #[serde(default = "default_target")]
    pub target: f64,
    /// Allowed distance of each member from the target, inclusive
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Largest allowed difference between any two members
    #[serde(default = "default_max_spread")]
    pub max_spread: f64,
}

fn default_target() -> f64 {
    28.0
}

fn default_tolerance() -> f64 {
    1.0
}

fn default_max_spread() -> f64 {
    1.0
}

impl Default for TemperaturePolicy {
    fn default() -> Self {
        Self {
            target: default_target(),
            tolerance: default_tolerance(),
            max_spread: default_max_spread(),
        }
    }
}

impl TemperaturePolicy {
    /// Every member inside the band and no two members further apart than `max_spread`.
    pub fn is_usable(&self, temperatures: &[f64]) -> bool {
        if temperatures.is_empty() {
            return false;
        }
        let in_band = temperatures
            .iter()
            .all(|t| (t - self.target).abs() <= self.tolerance);
        if !in_band {
            return false;
        }
        let max = temperatures.iter().copied().fold(f64::MIN, f64::max);
        let min = temperatures.iter().copied().fold(f64::MAX, f64::min);
        max - min <= self.max_spread
    }

    /// Selection weight of an arena: `Σ(target + tolerance − t)` when usable, else 0.
    ///
    /// Cooler arenas weigh more, since a trial warms the wax.
    pub fn usability_score(&self, temperatures: &[f64]) -> f64 {
        if !self.is_usable(temperatures) {
            return 0.0;
        }
        temperatures
            .iter()
            .map(|t| self.target + self.tolerance - t)
            .sum()
    }
}

/// Pick the index `i` with `Σ_{j<i} s_j ≤ draw < Σ_{j≤i} s_j`.
///
/// Returns `None` when no score is positive or `draw` lies outside
/// `[0, Σ s)`. Non-positive scores are never selected.
pub fn roulette_select(scores: &[f64], draw: f64) -> Option<usize> {
    let total: f64 = scores.iter().filter(|s| **s > 0.0).sum();
    if total <= 0.0 || !(0.0..total).contains(&draw) {
        return None;
    }
    let mut cumulative = 0.0;
    for (i, &score) in scores.iter().enumerate() {
        if score <= 0.0 {
            continue;
        }
        cumulative += score;
        if draw < cumulative {
            return Some(i);
        }
    }
    // rounding can leave `draw` a hair above the final partial sum
    scores.iter().rposition(|s| *s > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_sums_headroom_when_usable() {
        let policy = TemperaturePolicy::default();
        assert_eq!(policy.usability_score(&[28.0, 28.5]), 1.0 + 0.5);
        assert_eq!(policy.usability_score(&[27.0]), 2.0);
    }

    #[test]
    fn band_edges_are_inclusive() {
        let policy = TemperaturePolicy::default();
        assert!(policy.is_usable(&[27.0, 28.0]));
        assert!(policy.is_usable(&[29.0, 28.0]));
        assert_eq!(policy.usability_score(&[29.0, 29.0]), 0.0);
        assert!(!policy.is_usable(&[29.01, 28.5]));
        assert!(!policy.is_usable(&[26.99]));
    }

    #[test]
    fn member_disagreement_makes_arena_unusable() {
        let policy = TemperaturePolicy::default();
        // both inside the band, but 1.5 apart
        assert!(!policy.is_usable(&[27.2, 28.7]));
        assert_eq!(policy.usability_score(&[27.2, 28.7]), 0.0);
    }

    #[test]
    fn tighter_spread_policy() {
        let policy = TemperaturePolicy {
            max_spread: 0.25,
            ..TemperaturePolicy::default()
        };
        assert!(policy.is_usable(&[28.0, 28.2]));
        assert!(!policy.is_usable(&[28.0, 28.3]));
    }

    #[test]
    fn empty_arena_is_never_usable() {
        assert_eq!(TemperaturePolicy::default().usability_score(&[]), 0.0);
    }

    #[test]
    fn roulette_walks_cumulative_scores() {
        let scores = [1.0, 2.0, 0.5];
        assert_eq!(roulette_select(&scores, 0.0), Some(0));
        assert_eq!(roulette_select(&scores, 0.999), Some(0));
        assert_eq!(roulette_select(&scores, 1.0), Some(1));
        assert_eq!(roulette_select(&scores, 2.999), Some(1));
        assert_eq!(roulette_select(&scores, 3.0), Some(2));
        assert_eq!(roulette_select(&scores, 3.4), Some(2));
    }

    #[test]
    fn roulette_skips_zero_scores() {
        let scores = [0.0, 1.5, 0.0, 1.0];
        assert_eq!(roulette_select(&scores, 0.0), Some(1));
        assert_eq!(roulette_select(&scores, 1.5), Some(3));
    }

    #[test]
    fn roulette_rejects_out_of_range_draws() {
        assert_eq!(roulette_select(&[0.0, 0.0], 0.0), None);
        assert_eq!(roulette_select(&[1.0, 1.0], 2.0), None);
        assert_eq!(roulette_select(&[1.0], -0.1), None);
    }
}
