//! Per-generation observers.

use std::sync::Arc;

use async_trait::async_trait;
use evovibe_state::{ExperimentLog, FitnessRecord};
use tracing::info;

use super::engine::{Individual, Observer};
use crate::error::EvovibeResult;

/// Appends the surviving population to `fitness.csv` and logs the best individual.
pub struct FitnessLogObserver {
    log: Arc<dyn ExperimentLog>,
}

impl FitnessLogObserver {
    pub fn new(log: Arc<dyn ExperimentLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Observer for FitnessLogObserver {
    async fn observe(&mut self, population: &[Individual], generation: u32) -> EvovibeResult<()> {
        let best = population
            .iter()
            .map(|i| i.fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        info!(generation, best, size = population.len(), "generation observed");
        let rows: Vec<FitnessRecord> = population
            .iter()
            .map(|i| FitnessRecord {
                generation,
                fitness: i.fitness,
                genes: i.candidate.clone(),
            })
            .collect();
        self.log.append_fitness(&rows).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evovibe_link::Candidate;
    use evovibe_state::fakes::MemoryExperimentLog;

    #[tokio::test]
    async fn one_row_per_individual() {
        let log = Arc::new(MemoryExperimentLog::new());
        let mut observer = FitnessLogObserver::new(log.clone());
        let population = vec![
            Individual::new(Candidate::new(vec![100.0]), 3.0),
            Individual::new(Candidate::new(vec![200.0]), 1.5),
        ];
        observer.observe(&population, 4).await.unwrap();
        let rows = log.fitness().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.generation == 4));
        assert_eq!(rows[1].genes, Candidate::new(vec![200.0]));
    }
}
