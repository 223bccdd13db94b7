//! Semantic checks on parsed configuration.
//!
//! Validation collects every violation before returning, so the operator
//! sees the whole list at once.

use std::collections::HashSet;

use super::{ExperimentConfig, WorkersConfig};

/// Errors from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error in {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated path, e.g. `timing.frame_rate`
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_experiment(config: &ExperimentConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let search = &config.search;
    let timing = &config.timing;

    // ── Search ───────────────────────────────────────────────────────
    if search.population_size == 0 {
        errors.push(invalid("search.population_size", 0, "must be at least 1"));
    }
    if search.evaluations_per_episode < 2 {
        errors.push(invalid(
            "search.evaluations_per_episode",
            search.evaluations_per_episode,
            "must be at least 2",
        ));
    }
    let min_trials = search.reduction.min_trials();
    if search.evaluations_per_candidate < min_trials {
        errors.push(invalid(
            "search.evaluations_per_candidate",
            search.evaluations_per_candidate,
            &format!("{:?} reduction needs at least {min_trials} trials", search.reduction),
        ));
    }
    if search.subjects_per_arena == 0 {
        errors.push(invalid("search.subjects_per_arena", 0, "must be at least 1"));
    }

    // ── Timing ───────────────────────────────────────────────────────
    for (field, value) in [
        ("timing.stimulus_secs", timing.stimulus_secs),
        ("timing.no_stimulus_secs", timing.no_stimulus_secs),
        ("timing.spread_secs", timing.spread_secs),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(invalid(field, value, "must be a non-negative number"));
        }
    }
    if timing.stimulus_secs == 0.0 {
        errors.push(invalid("timing.stimulus_secs", 0, "must be positive"));
    }
    if timing.frame_rate == 0 {
        errors.push(invalid("timing.frame_rate", 0, "must be positive"));
    }
    if let Some(interval) = timing.previous_frame_interval {
        if interval == 0 || interval > timing.frame_rate {
            errors.push(invalid(
                "timing.previous_frame_interval",
                interval,
                "must be between 1 and frame_rate",
            ));
        }
    }

    // ── Image ────────────────────────────────────────────────────────
    if config.image.width == 0 || config.image.height == 0 {
        errors.push(invalid(
            "image",
            format!("{}x{}", config.image.width, config.image.height),
            "width and height must be positive",
        ));
    }
    if config.image.fuzz_percent > 100 {
        errors.push(invalid(
            "image.fuzz_percent",
            config.image.fuzz_percent,
            "must be at most 100",
        ));
    }

    // ── Temperature ──────────────────────────────────────────────────
    let t = &config.temperature;
    if !t.target.is_finite() {
        errors.push(invalid("temperature.target", t.target, "must be a number"));
    }
    if !(t.tolerance.is_finite() && t.tolerance >= 0.0) {
        errors.push(invalid("temperature.tolerance", t.tolerance, "must be non-negative"));
    }
    if !(t.max_spread.is_finite() && t.max_spread >= 0.0) {
        errors.push(invalid("temperature.max_spread", t.max_spread, "must be non-negative"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_workers(config: &WorkersConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    if config.workers.is_empty() {
        errors.push(invalid("workers", "[]", "at least one worker is required"));
    }
    let mut numbers = HashSet::new();
    let mut addresses = HashSet::new();
    for entry in &config.workers {
        if !numbers.insert(entry.casu_number) {
            errors.push(invalid("workers.casu_number", entry.casu_number, "listed twice"));
        }
        if entry.address.trim().is_empty() {
            errors.push(invalid(
                "workers.address",
                format!("casu {}", entry.casu_number),
                "must not be empty",
            ));
        } else if !addresses.insert(entry.address.as_str()) {
            errors.push(invalid("workers.address", &entry.address, "listed twice"));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
