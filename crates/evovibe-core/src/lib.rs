//! Evovibe Core Library
//!
//! Arenas of CASUs, the episode lifecycle, the evaluation pipeline and the
//! crash-resume wrappers around the evolutionary search.

pub mod arena;
pub mod config;
pub mod device;
pub mod episode;
pub mod error;
pub mod evolution;
pub mod fakes;
pub mod features;
pub mod metrics;
pub mod obs;
pub mod operator;
pub mod pipeline;
pub mod reduction;
pub mod resume;
pub mod run;
pub mod scoring;

pub use arena::{Arena, ArenaKind, ArenaLayout, ArenaStatus, TemperaturePolicy};
pub use config::{
    load_experiment, load_workers, ConfigError, ExperimentConfig, WorkerEntry, WorkersConfig,
};
pub use device::{DeviceHandle, DeviceRegistry};
pub use episode::{EpisodeManager, EpisodePhase, EpisodeSettings};
pub use error::{EvovibeError, EvovibeResult, ResumeError};
pub use evolution::{EvolutionaryComputation, Individual};
pub use metrics::METRICS;
pub use operator::{Operator, TerminalOperator};
pub use pipeline::{EvaluationPipeline, PendingTrials, PipelineSettings};
pub use reduction::Reduction;
pub use resume::{ResumeEvaluator, ResumeObserver, ResumeState, ResumeVariator};
pub use run::{continue_run, new_run, Experiment, RunFolder};
pub use scoring::ScoringFunction;
pub use evovibe_link::init_tracing;
