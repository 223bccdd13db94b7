//! Validated worker configuration.

use std::time::Duration;

use evovibe_link::{ChromosomeKind, WorkerParams};

use crate::error::{WorkerError, WorkerResult};

/// Wax temperature the device is held at between trials.
pub const BASELINE_TEMPERATURE: f64 = 28.0;

/// Timing and encoding a worker runs with once initialised.
///
/// Built only through [`WorkerConfig::from_params`], so every duration is
/// finite and non-negative and the frame rate is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    params: WorkerParams,
}

impl WorkerConfig {
    pub fn from_params(params: WorkerParams) -> WorkerResult<Self> {
        let mut problems = Vec::new();

        for (name, value) in [
            ("stimulus_secs", params.stimulus_secs),
            ("no_stimulus_secs", params.no_stimulus_secs),
            ("spread_secs", params.spread_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if params.stimulus_secs == 0.0 {
            problems.push("stimulus_secs must be positive".to_string());
        }
        if params.frame_rate == 0 {
            problems.push("frame_rate must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(Self { params })
        } else {
            Err(WorkerError::InvalidParams(problems.join("; ")))
        }
    }

    pub fn params(&self) -> &WorkerParams {
        &self.params
    }

    pub fn chromosome(&self) -> ChromosomeKind {
        self.params.chromosome
    }

    pub fn repetitions(&self) -> u32 {
        self.params.repetitions
    }

    pub fn stimulus(&self) -> Duration {
        Duration::from_secs_f64(self.params.stimulus_secs)
    }

    pub fn no_stimulus(&self) -> Duration {
        Duration::from_secs_f64(self.params.no_stimulus_secs)
    }

    pub fn spread(&self) -> Duration {
        Duration::from_secs_f64(self.params.spread_secs)
    }

    pub fn blip(&self) -> Duration {
        Duration::from_secs_f64(self.params.blip_secs())
    }

    pub fn evaluation_run(&self) -> Duration {
        Duration::from_secs_f64(self.params.evaluation_run_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> WorkerParams {
        WorkerParams {
            stimulus_secs: 4.0,
            no_stimulus_secs: 2.0,
            repetitions: 1,
            spread_secs: 3.0,
            frame_rate: 8,
            chromosome: ChromosomeKind::SinglePulseGenesPulse,
        }
    }

    #[test]
    fn valid_params_build_config() {
        let cfg = WorkerConfig::from_params(params()).unwrap();
        assert_eq!(cfg.blip(), Duration::from_millis(250));
        assert_eq!(cfg.evaluation_run(), Duration::from_secs(10));
        assert_eq!(cfg.chromosome(), ChromosomeKind::SinglePulseGenesPulse);
    }

    #[test]
    fn zero_frame_rate_is_rejected() {
        let mut p = params();
        p.frame_rate = 0;
        let err = WorkerConfig::from_params(p).unwrap_err();
        assert!(err.to_string().contains("frame_rate"));
    }

    #[test]
    fn all_problems_are_reported() {
        let mut p = params();
        p.spread_secs = -1.0;
        p.no_stimulus_secs = f64::NAN;
        let msg = WorkerConfig::from_params(p).unwrap_err().to_string();
        assert!(msg.contains("spread_secs"));
        assert!(msg.contains("no_stimulus_secs"));
    }
}
