//! Error taxonomy for the orchestration core.

use std::path::PathBuf;

use evovibe_link::LinkError;
use evovibe_media::MediaError;
use evovibe_state::StateError;

use crate::config::ConfigError;

/// The persisted logs do not describe a state this configuration can continue.
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("generation {generation}: logged population has {found} rows, expected {expected}")]
    PopulationSize {
        generation: u32,
        expected: usize,
        found: usize,
    },

    #[error("population log skips from generation {previous} to {found}")]
    GenerationGap { previous: u32, found: u32 },

    #[error("generation {generation}: {scored} fitness rows for a population of {population}")]
    FitnessOverflow {
        generation: u32,
        population: usize,
        scored: usize,
    },

    #[error("generation {generation}: fitness row {index} does not match the logged population")]
    GenesMismatch { generation: u32, index: usize },

    #[error("generation {generation}: parents have {scored} of {expected} fitness values")]
    IncompleteParents {
        generation: u32,
        scored: usize,
        expected: usize,
    },

    #[error(
        "generation {generation}: {found} trial rows for candidate {candidate}, \
         expected at most {expected}"
    )]
    TrialOverflow {
        generation: u32,
        candidate: usize,
        found: usize,
        expected: usize,
    },

    #[error("{phase}: engine asked for {candidates} candidates but {persisted} are persisted")]
    ReplayLength {
        phase: &'static str,
        candidates: usize,
        persisted: usize,
    },

    #[error("{phase}: candidate {index} differs from the persisted one")]
    ReplayMismatch { phase: &'static str, index: usize },

    #[error("config digest mismatch: run was started with {expected}, got {actual}")]
    ConfigDigest { expected: String, actual: String },
}

/// Core errors.
#[derive(Debug, thiserror::Error)]
pub enum EvovibeError {
    #[error("device link: {0}")]
    Link(#[from] LinkError),

    #[error("experiment log: {0}")]
    State(#[from] StateError),

    #[error("media tool: {0}")]
    Media(#[from] MediaError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("resume: {0}")]
    Resume(#[from] ResumeError),

    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operator input closed")]
    OperatorClosed,

    #[error("run stopped by the operator")]
    StoppedByOperator,

    #[error("{operation} is not allowed while the episode is {phase}")]
    EpisodePhase {
        operation: &'static str,
        phase: String,
    },

    #[error("unknown device {0}")]
    UnknownDevice(u32),

    #[error("device {0} already belongs to an arena")]
    DeviceInUse(u32),

    #[error("an arena needs {needed} free devices, {available} available")]
    NotEnoughDevices { needed: usize, available: usize },

    #[error("search engine: {0}")]
    Engine(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml encoding: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("there is no run {0}")]
    NoSuchRun(u32),

    #[error("{path}: {reason}")]
    RunFolder { path: PathBuf, reason: String },
}

impl EvovibeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for core operations.
pub type EvovibeResult<T> = std::result::Result<T, EvovibeError>;
