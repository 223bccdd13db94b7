//! Wire messages exchanged between the master and a device worker.
//!
//! The command set is closed: a worker matches every [`Command`] variant
//! against its current state, so there is no "unknown opcode" path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LinkError, LinkResult};

// ============================================================================
// Candidate
// ============================================================================

/// Parameter vector under evolutionary search.
///
/// The master treats the genes as opaque; only the worker decodes them,
/// according to the [`ChromosomeKind`] it was initialised with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(pub Vec<f64>);

impl Candidate {
    pub fn new(genes: Vec<f64>) -> Self {
        Self(genes)
    }

    pub fn genes(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for Candidate {
    fn from(genes: Vec<f64>) -> Self {
        Self(genes)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, gene) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{gene}")?;
        }
        write!(f, "]")
    }
}

/// Shortest period the speaker driver accepts, milliseconds.
pub const VIBE_PERIOD_MIN_MS: u32 = 100;

/// How a candidate's genes map onto a vibration pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromosomeKind {
    /// One gene: the pause between fixed 440 Hz, 1000 ms pulses.
    SinglePulseGenePause,
    /// Three genes: frequency, pulse length, pause length.
    SinglePulseGenesPulse,
}

impl ChromosomeKind {
    /// Number of genes a candidate of this kind carries.
    pub fn gene_count(self) -> usize {
        match self {
            ChromosomeKind::SinglePulseGenePause => 1,
            ChromosomeKind::SinglePulseGenesPulse => 3,
        }
    }
}

impl fmt::Display for ChromosomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromosomeKind::SinglePulseGenePause => write!(f, "single_pulse_gene_pause"),
            ChromosomeKind::SinglePulseGenesPulse => write!(f, "single_pulse_genes_pulse"),
        }
    }
}

// ============================================================================
// Initialise parameters
// ============================================================================

/// Timing and encoding parameters sent once with `Initialise`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerParams {
    /// Length of one stimulus burst, seconds
    pub stimulus_secs: f64,
    /// Silence between bursts, seconds
    pub no_stimulus_secs: f64,
    /// Number of (burst, silence) pairs before the final burst
    pub repetitions: u32,
    /// Ventilation after the stimulus window, seconds
    pub spread_secs: f64,
    /// Camera frame rate; the blip lasts two frame periods
    pub frame_rate: u32,
    /// Gene encoding
    pub chromosome: ChromosomeKind,
}

impl WorkerParams {
    /// Total stimulus window: `repetitions * (stim + no_stim) + stim`.
    pub fn evaluation_run_secs(&self) -> f64 {
        f64::from(self.repetitions) * (self.stimulus_secs + self.no_stimulus_secs)
            + self.stimulus_secs
    }

    /// Duration of one visible marker blip.
    pub fn blip_secs(&self) -> f64 {
        if self.frame_rate == 0 {
            return 0.0;
        }
        2.0 / f64::from(self.frame_rate)
    }

    /// Wall-clock length of a full role: blip, stimulus, blip, spread.
    pub fn role_secs(&self) -> f64 {
        2.0 * self.blip_secs() + self.evaluation_run_secs() + self.spread_secs
    }
}

// ============================================================================
// Command / Reply
// ============================================================================

/// Request sent from the master to one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Command {
    Initialise(WorkerParams),
    SetActive(Candidate),
    SetPassive,
    Status,
    Standby,
    Spread { seconds: f64 },
    Terminate,
}

impl Command {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialise(_) => "initialise",
            Command::SetActive(_) => "set_active",
            Command::SetPassive => "set_passive",
            Command::Status => "status",
            Command::Standby => "standby",
            Command::Spread { .. } => "spread",
            Command::Terminate => "terminate",
        }
    }
}

/// Acknowledgement for exactly one [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Ok,
    /// Active role finished; carries the instant the stimulus began.
    Started { at: DateTime<Utc> },
    Temperature { celsius: f64 },
    Rejected { reason: String },
}

impl Reply {
    pub fn name(&self) -> &'static str {
        match self {
            Reply::Ok => "ok",
            Reply::Started { .. } => "started",
            Reply::Temperature { .. } => "temperature",
            Reply::Rejected { .. } => "rejected",
        }
    }

    /// Accept any positive acknowledgement and return the stimulus start if present.
    pub fn into_ack(self, command: &Command) -> LinkResult<Option<DateTime<Utc>>> {
        match self {
            Reply::Ok => Ok(None),
            Reply::Started { at } => Ok(Some(at)),
            Reply::Rejected { reason } => Err(LinkError::Rejected {
                command: command.name().to_string(),
                reason,
            }),
            other => Err(LinkError::UnexpectedReply {
                command: command.name().to_string(),
                got: other.name().to_string(),
            }),
        }
    }

    /// Extract the reading from a `Status` reply.
    pub fn into_temperature(self) -> LinkResult<f64> {
        match self {
            Reply::Temperature { celsius } => Ok(celsius),
            Reply::Rejected { reason } => Err(LinkError::Rejected {
                command: Command::Status.name().to_string(),
                reason,
            }),
            other => Err(LinkError::UnexpectedReply {
                command: Command::Status.name().to_string(),
                got: other.name().to_string(),
            }),
        }
    }
}
