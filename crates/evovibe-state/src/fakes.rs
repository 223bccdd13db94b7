//! In-memory fake for the experiment log (testing only)
//!
//! `MemoryExperimentLog` satisfies the `ExperimentLog` contract without
//! touching the filesystem. Clones share the same rows, so a test can keep
//! a handle while the pipeline owns another.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StateResult;
use crate::records::{EvaluationRecord, FitnessRecord, PartialRecord, PopulationRecord};
use crate::storage_traits::ExperimentLog;

#[derive(Debug, Default)]
struct Rows {
    populations: Vec<PopulationRecord>,
    evaluations: Vec<EvaluationRecord>,
    partials: Vec<PartialRecord>,
    fitness: Vec<FitnessRecord>,
}

/// Shared in-memory experiment log.
#[derive(Debug, Clone, Default)]
pub struct MemoryExperimentLog {
    rows: Arc<Mutex<Rows>>,
}

impl MemoryExperimentLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperimentLog for MemoryExperimentLog {
    async fn append_population(&self, rows: &[PopulationRecord]) -> StateResult<()> {
        self.rows
            .lock()
            .unwrap()
            .populations
            .extend_from_slice(rows);
        Ok(())
    }

    async fn append_evaluation(&self, row: &EvaluationRecord) -> StateResult<()> {
        self.rows.lock().unwrap().evaluations.push(row.clone());
        Ok(())
    }

    async fn append_partial(&self, row: &PartialRecord) -> StateResult<()> {
        self.rows.lock().unwrap().partials.push(row.clone());
        Ok(())
    }

    async fn append_fitness(&self, rows: &[FitnessRecord]) -> StateResult<()> {
        self.rows.lock().unwrap().fitness.extend_from_slice(rows);
        Ok(())
    }

    async fn populations(&self) -> StateResult<Vec<PopulationRecord>> {
        Ok(self.rows.lock().unwrap().populations.clone())
    }

    async fn evaluations(&self) -> StateResult<Vec<EvaluationRecord>> {
        Ok(self.rows.lock().unwrap().evaluations.clone())
    }

    async fn partials(&self) -> StateResult<Vec<PartialRecord>> {
        Ok(self.rows.lock().unwrap().partials.clone())
    }

    async fn fitness(&self) -> StateResult<Vec<FitnessRecord>> {
        Ok(self.rows.lock().unwrap().fitness.clone())
    }
}
