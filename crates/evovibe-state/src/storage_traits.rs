//! Storage trait for the experiment logs
//!
//! `ExperimentLog` is append-only: rows are never rewritten, and reading
//! the logs start to end is the whole resume state. In-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StateResult;
use crate::records::{EvaluationRecord, FitnessRecord, PartialRecord, PopulationRecord};

/// Durable, single-writer experiment logs.
///
/// Guarantees:
/// - rows come back from the readers in append order
/// - a row returned by a reader was fully written (no torn rows)
#[async_trait]
pub trait ExperimentLog: Send + Sync {
    /// Append a whole generated population.
    async fn append_population(&self, rows: &[PopulationRecord]) -> StateResult<()>;

    /// Append one completed trial.
    async fn append_evaluation(&self, row: &EvaluationRecord) -> StateResult<()>;

    /// Append one candidate's reduced fitness.
    async fn append_partial(&self, row: &PartialRecord) -> StateResult<()>;

    /// Append the surviving population of one generation.
    async fn append_fitness(&self, rows: &[FitnessRecord]) -> StateResult<()>;

    async fn populations(&self) -> StateResult<Vec<PopulationRecord>>;

    async fn evaluations(&self) -> StateResult<Vec<EvaluationRecord>>;

    async fn partials(&self) -> StateResult<Vec<PartialRecord>>;

    async fn fitness(&self) -> StateResult<Vec<FitnessRecord>>;
}
