//! Evovibe-State: durable experiment logs (Layer 0)
//!
//! Four append-only CSV logs make up the entire persisted state of a run:
//!
//! - `population.csv`: every generated population
//! - `evaluation.csv`: every completed trial
//! - `partial.csv`: every candidate's reduced fitness
//! - `fitness.csv`: the surviving population after each generation
//!
//! Resume reads these start to end; there is no other checkpoint format.

pub mod csv_log;
mod error;
pub mod fakes;
pub mod records;
pub mod storage_traits;

pub use csv_log::CsvExperimentLog;
pub use error::{StateError, StateResult};
pub use records::{
    EvaluationRecord, FitnessRecord, LogRecord, PartialRecord, PopulationRecord,
    EVALUATION_LOG, FITNESS_LOG, PARTIAL_LOG, POPULATION_LOG,
};
pub use storage_traits::ExperimentLog;
