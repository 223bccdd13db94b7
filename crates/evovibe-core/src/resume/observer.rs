//! Observer wrapper: skips summaries that are already in `fitness.csv`.

use async_trait::async_trait;
use tracing::debug;

use crate::error::EvovibeResult;
use crate::evolution::{Individual, Observer};

pub struct ResumeObserver<O> {
    inner: O,
    suppress_remaining: u32,
    offset: u32,
}

impl<O: Observer> ResumeObserver<O> {
    /// Drop the first `suppress` calls, then forward with `generation + offset`.
    pub fn new(inner: O, suppress: u32, offset: u32) -> Self {
        Self {
            inner,
            suppress_remaining: suppress,
            offset,
        }
    }

    pub fn inner(&self) -> &O {
        &self.inner
    }
}

#[async_trait]
impl<O: Observer> Observer for ResumeObserver<O> {
    async fn observe(&mut self, population: &[Individual], generation: u32) -> EvovibeResult<()> {
        let generation = generation + self.offset;
        if self.suppress_remaining > 0 {
            self.suppress_remaining -= 1;
            debug!(generation, "summary already persisted");
            return Ok(());
        }
        self.inner.observe(population, generation).await
    }
}
