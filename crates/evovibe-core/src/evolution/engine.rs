//! The search loop: generate, evaluate, then vary → bound → evaluate →
//! replace → observe once per generation.
//!
//! Fitness is maximised. Replacement is generational: offspring replace
//! their parents, except for the best `num_elites` parents, which compete
//! with the offspring for a place in the next population.

use std::cmp::Ordering;

use async_trait::async_trait;
use evovibe_link::Candidate;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::error::{EvovibeError, EvovibeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub candidate: Candidate,
    pub fitness: f64,
}

impl Individual {
    pub fn new(candidate: Candidate, fitness: f64) -> Self {
        Self { candidate, fitness }
    }
}

/// Descending by fitness; NaN sorts last.
fn best_first(a: &Individual, b: &Individual) -> Ordering {
    match (a.fitness.is_nan(), b.fitness.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.fitness.total_cmp(&a.fitness),
    }
}

pub trait Generator: Send + Sync {
    fn generate(&self, rng: &mut StdRng) -> Candidate;
}

pub trait Bounder: Send + Sync {
    fn bound(&self, candidate: Candidate) -> Candidate;
}

#[async_trait]
pub trait Evaluate: Send {
    /// One fitness per candidate, in order.
    async fn evaluate(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>>;

    /// Score the tail of a population whose head was scored by an earlier process.
    async fn evaluate_remainder(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>> {
        self.evaluate(candidates).await
    }
}

pub trait Variator: Send {
    /// Offspring of `parents`, one per parent.
    fn vary(&mut self, rng: &mut StdRng, parents: &[Individual]) -> Vec<Candidate>;
}

#[async_trait]
pub trait Observer: Send {
    /// Called with the current population after every generation, starting at 0.
    async fn observe(&mut self, population: &[Individual], generation: u32) -> EvovibeResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvolutionSettings {
    pub population_size: usize,
    /// Generations after the initial one
    pub max_generations: u32,
    pub num_elites: usize,
}

pub struct EvolutionaryComputation {
    rng: StdRng,
    settings: EvolutionSettings,
}

impl EvolutionaryComputation {
    pub fn new(rng: StdRng, settings: EvolutionSettings) -> Self {
        Self { rng, settings }
    }

    pub fn settings(&self) -> EvolutionSettings {
        self.settings
    }

    /// Run the search and return the final population, best first.
    ///
    /// `seeds` fill the initial population before the generator does.
    pub async fn evolve<E, V, O>(
        &mut self,
        generator: &dyn Generator,
        bounder: &dyn Bounder,
        evaluator: &mut E,
        variator: &mut V,
        observer: &mut O,
        seeds: Vec<Candidate>,
    ) -> EvovibeResult<Vec<Individual>>
    where
        E: Evaluate + ?Sized,
        V: Variator + ?Sized,
        O: Observer + ?Sized,
    {
        let size = self.settings.population_size;
        let mut initial: Vec<Candidate> = seeds.into_iter().take(size).collect();
        let seeded = initial.len();
        while initial.len() < size {
            initial.push(generator.generate(&mut self.rng));
        }
        info!(size, seeded, "initial population");

        let fitness = evaluator.evaluate(&initial).await?;
        let mut population = pair(initial, fitness)?;
        observer.observe(&population, 0).await?;

        for generation in 1..=self.settings.max_generations {
            let offspring: Vec<Candidate> = variator
                .vary(&mut self.rng, &population)
                .into_iter()
                .map(|c| bounder.bound(c))
                .collect();
            let fitness = evaluator.evaluate(&offspring).await?;
            let offspring = pair(offspring, fitness)?;
            population = generational_replacement(population, offspring, self.settings.num_elites);
            debug!(generation, best = population.first().map(|i| i.fitness), "generation done");
            observer.observe(&population, generation).await?;
        }
        population.sort_by(best_first);
        Ok(population)
    }
}

fn pair(candidates: Vec<Candidate>, fitness: Vec<f64>) -> EvovibeResult<Vec<Individual>> {
    if candidates.len() != fitness.len() {
        return Err(EvovibeError::Engine(format!(
            "{} candidates but {} fitness values",
            candidates.len(),
            fitness.len()
        )));
    }
    Ok(candidates
        .into_iter()
        .zip(fitness)
        .map(|(c, f)| Individual::new(c, f))
        .collect())
}

/// Offspring plus the best `num_elites` parents, truncated to the parent count.
pub fn generational_replacement(
    mut parents: Vec<Individual>,
    mut offspring: Vec<Individual>,
    num_elites: usize,
) -> Vec<Individual> {
    let size = parents.len();
    parents.sort_by(best_first);
    offspring.extend(parents.into_iter().take(num_elites));
    offspring.sort_by(best_first);
    offspring.truncate(size);
    offspring
}
