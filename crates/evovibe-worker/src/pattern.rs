//! Decoding candidates into speaker vibration patterns.

pub use evovibe_link::message::VIBE_PERIOD_MIN_MS;
use evovibe_link::{Candidate, ChromosomeKind};

use crate::error::{WorkerError, WorkerResult};

const FIXED_FREQUENCY_HZ: u32 = 440;
const FIXED_PULSE_MS: u32 = 1000;
const AMPLITUDE: u8 = 50;

/// Cyclic pattern: the speaker walks through the periods in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VibrationPattern {
    pub periods_ms: Vec<u32>,
    pub frequencies_hz: Vec<u32>,
    pub amplitudes: Vec<u8>,
}

impl VibrationPattern {
    /// A pulse followed by a silent pause; a pause too short for the
    /// driver collapses into a continuous tone.
    pub fn pulse(frequency_hz: u32, pulse_ms: u32, pause_ms: u32) -> Self {
        if pause_ms < VIBE_PERIOD_MIN_MS {
            Self {
                periods_ms: vec![pulse_ms],
                frequencies_hz: vec![frequency_hz],
                amplitudes: vec![AMPLITUDE],
            }
        } else {
            Self {
                periods_ms: vec![pulse_ms, pause_ms],
                frequencies_hz: vec![frequency_hz, 0],
                amplitudes: vec![AMPLITUDE, 0],
            }
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.periods_ms.len() == 1
    }

    /// Decode `candidate` according to `kind`.
    pub fn decode(kind: ChromosomeKind, candidate: &Candidate) -> WorkerResult<Self> {
        let genes = candidate.genes();
        if genes.len() != kind.gene_count() {
            return Err(WorkerError::CandidateEncoding {
                kind: kind.to_string(),
                expected: kind.gene_count(),
                got: genes.len(),
            });
        }
        let as_u32 = |g: f64| -> WorkerResult<u32> {
            if g.is_finite() && g >= 0.0 && g <= f64::from(u32::MAX) {
                Ok(g.round() as u32)
            } else {
                Err(WorkerError::CandidateEncoding {
                    kind: kind.to_string(),
                    expected: kind.gene_count(),
                    got: genes.len(),
                })
            }
        };
        match kind {
            ChromosomeKind::SinglePulseGenePause => Ok(Self::pulse(
                FIXED_FREQUENCY_HZ,
                FIXED_PULSE_MS,
                as_u32(genes[0])?,
            )),
            ChromosomeKind::SinglePulseGenesPulse => Ok(Self::pulse(
                as_u32(genes[0])?,
                as_u32(genes[1])?,
                as_u32(genes[2])?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_gene_uses_fixed_pulse() {
        let p = VibrationPattern::decode(
            ChromosomeKind::SinglePulseGenePause,
            &Candidate::new(vec![250.0]),
        )
        .unwrap();
        assert_eq!(p.periods_ms, vec![1000, 250]);
        assert_eq!(p.frequencies_hz, vec![440, 0]);
        assert_eq!(p.amplitudes, vec![50, 0]);
    }

    #[test]
    fn short_pause_is_continuous() {
        let p = VibrationPattern::decode(
            ChromosomeKind::SinglePulseGenesPulse,
            &Candidate::new(vec![900.0, 300.0, 40.0]),
        )
        .unwrap();
        assert!(p.is_continuous());
        assert_eq!(p.frequencies_hz, vec![900]);
    }

    #[test]
    fn wrong_gene_count_is_an_encoding_error() {
        let err = VibrationPattern::decode(
            ChromosomeKind::SinglePulseGenesPulse,
            &Candidate::new(vec![900.0]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WorkerError::CandidateEncoding {
                expected: 3,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn negative_gene_is_rejected() {
        assert!(VibrationPattern::decode(
            ChromosomeKind::SinglePulseGenePause,
            &Candidate::new(vec![-5.0]),
        )
        .is_err());
    }
}
