//! Reconstructing where a run stopped from its logs.
//!
//! Let `G` be the last generation in `population.csv` and `k` the number
//! of its candidates with a row in `partial.csv`:
//!
//! - `G = 0`: the engine is re-seeded with the initial population; the
//!   first `k` fitness values are replayed, the rest evaluated live.
//! - `G > 0`: the engine is re-seeded with the survivors of `G - 1` from
//!   `fitness.csv`. Their fitness is replayed, the first variator call
//!   returns the logged population `G`, and its first `k` fitness values
//!   are replayed.
//!
//! Trials in `evaluation.csv` beyond the `k` scored candidates belong to
//! candidate `k` and are handed to the pipeline so they are not repeated.

use std::collections::BTreeMap;

use evovibe_link::Candidate;
use evovibe_state::{EvaluationRecord, ExperimentLog, FitnessRecord, PartialRecord, PopulationRecord};
use tracing::info;

use super::evaluator::{Replay, ResumePhase};
use crate::error::{EvovibeResult, ResumeError};
use crate::pipeline::PendingTrials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSettings {
    pub population_size: usize,
    pub evaluations_per_candidate: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeState {
    /// Generation the re-seeded initial population stands for
    pub start_generation: u32,
    /// Generation the pipeline scores on its next live call
    pub pipeline_generation: u32,
    pub parents: Replay,
    pub offspring: Option<Replay>,
    pub pending: Option<PendingTrials>,
    /// Leading observer calls whose rows are already in `fitness.csv`
    pub persisted_summaries: u32,
    pub next_episode: u32,
}

impl ResumeState {
    /// Read all four logs; `None` when nothing was generated yet.
    pub async fn load(
        log: &dyn ExperimentLog,
        settings: ResumeSettings,
    ) -> EvovibeResult<Option<Self>> {
        let populations = log.populations().await?;
        let evaluations = log.evaluations().await?;
        let partials = log.partials().await?;
        let fitness = log.fitness().await?;
        let state = Self::reconstruct(settings, &populations, &evaluations, &partials, &fitness)?;
        if let Some(state) = &state {
            info!(
                start_generation = state.start_generation,
                pipeline_generation = state.pipeline_generation,
                replayed_parents = state.parents.fitness.len(),
                replayed_offspring = state.offspring.as_ref().map_or(0, |o| o.fitness.len()),
                pending_trials = state.pending.as_ref().map_or(0, |p| p.scores.len()),
                next_episode = state.next_episode,
                "resume state reconstructed"
            );
        }
        Ok(state)
    }

    pub fn reconstruct(
        settings: ResumeSettings,
        populations: &[PopulationRecord],
        evaluations: &[EvaluationRecord],
        partials: &[PartialRecord],
        fitness: &[FitnessRecord],
    ) -> Result<Option<Self>, ResumeError> {
        let size = settings.population_size;
        let generations = group_populations(populations, size)?;
        let Some(current) = generations.last() else {
            return Ok(None);
        };
        let last = (generations.len() - 1) as u32;

        let scored: Vec<f64> = {
            let rows: Vec<&PartialRecord> =
                partials.iter().filter(|p| p.generation == last).collect();
            if rows.len() > size {
                return Err(ResumeError::FitnessOverflow {
                    generation: last,
                    population: size,
                    scored: rows.len(),
                });
            }
            if let Some(index) = rows
                .iter()
                .zip(current)
                .position(|(row, genes)| &row.genes != genes)
            {
                return Err(ResumeError::GenesMismatch {
                    generation: last,
                    index,
                });
            }
            rows.iter().map(|p| p.fitness).collect()
        };
        let k = scored.len();
        let pending = pending_trials(settings, last, current, k, evaluations)?;

        let summaries: BTreeMap<u32, Vec<&FitnessRecord>> =
            fitness.iter().fold(BTreeMap::new(), |mut acc, row| {
                acc.entry(row.generation).or_insert_with(Vec::new).push(row);
                acc
            });

        let (start_generation, parents, offspring) = if last == 0 {
            (0, Replay::new(current.clone(), scored), None)
        } else {
            let previous = last - 1;
            let survivors = summaries.get(&previous).map(Vec::as_slice).unwrap_or(&[]);
            if survivors.len() != size {
                return Err(ResumeError::IncompleteParents {
                    generation: previous,
                    scored: survivors.len(),
                    expected: size,
                });
            }
            let parents = Replay::new(
                survivors.iter().map(|r| r.genes.clone()).collect(),
                survivors.iter().map(|r| r.fitness).collect(),
            );
            (previous, parents, Some(Replay::new(current.clone(), scored)))
        };

        let persisted_summaries = (start_generation..)
            .take_while(|g| summaries.contains_key(g))
            .count() as u32;

        let next_episode = populations
            .iter()
            .map(|r| r.episode)
            .chain(evaluations.iter().map(|r| r.episode))
            .chain(partials.iter().map(|r| r.episode))
            .max()
            .map_or(1, |episode| episode + 1);

        Ok(Some(Self {
            start_generation,
            pipeline_generation: if k == size { last + 1 } else { last },
            parents,
            offspring,
            pending,
            persisted_summaries,
            next_episode,
        }))
    }

    /// Initial population for the re-seeded engine.
    pub fn seeds(&self) -> Vec<Candidate> {
        self.parents.candidates.clone()
    }

    /// Logged offspring the first variator call must return.
    pub fn offspring_candidates(&self) -> Option<Vec<Candidate>> {
        self.offspring.as_ref().map(|o| o.candidates.clone())
    }

    pub fn evaluator_phase(&self) -> ResumePhase {
        ResumePhase::ReplayParents {
            parents: self.parents.clone(),
            offspring: self.offspring.clone(),
        }
    }

    /// Generations the engine still has to run after the re-seeded one.
    pub fn remaining_generations(&self, number_generations: u32) -> u32 {
        number_generations.saturating_sub(self.start_generation)
    }
}

/// Consecutive generations from 0, each exactly `size` rows.
fn group_populations(
    rows: &[PopulationRecord],
    size: usize,
) -> Result<Vec<Vec<Candidate>>, ResumeError> {
    let mut generations: Vec<(u32, Vec<Candidate>)> = Vec::new();
    for row in rows {
        match generations.last_mut() {
            Some((generation, genes)) if *generation == row.generation => {
                genes.push(row.genes.clone())
            }
            last => {
                let expected = last.map_or(0, |(generation, _)| *generation + 1);
                if row.generation != expected {
                    return Err(ResumeError::GenerationGap {
                        previous: expected.saturating_sub(1),
                        found: row.generation,
                    });
                }
                generations.push((row.generation, vec![row.genes.clone()]));
            }
        }
    }
    generations
        .into_iter()
        .map(|(generation, genes)| {
            if genes.len() == size {
                Ok(genes)
            } else {
                Err(ResumeError::PopulationSize {
                    generation,
                    expected: size,
                    found: genes.len(),
                })
            }
        })
        .collect()
}

/// Trials of candidate `k` that ran before the process stopped.
fn pending_trials(
    settings: ResumeSettings,
    generation: u32,
    population: &[Candidate],
    k: usize,
    evaluations: &[EvaluationRecord],
) -> Result<Option<PendingTrials>, ResumeError> {
    let per_candidate = settings.evaluations_per_candidate;
    let rows: Vec<&EvaluationRecord> = evaluations
        .iter()
        .filter(|e| e.generation == generation)
        .collect();
    let overflow = || ResumeError::TrialOverflow {
        generation,
        candidate: k,
        found: rows.len(),
        expected: (k + 1).min(settings.population_size) * per_candidate,
    };
    let pending = rows.len().saturating_sub(k * per_candidate);
    if pending == 0 {
        return Ok(None);
    }
    let Some(genes) = population.get(k).filter(|_| pending <= per_candidate) else {
        return Err(overflow());
    };
    let tail = &rows[k * per_candidate..];
    if tail.iter().any(|row| &row.genes != genes) {
        return Err(ResumeError::GenesMismatch {
            generation,
            index: k,
        });
    }
    Ok(Some(PendingTrials {
        genes: genes.clone(),
        scores: tail.iter().map(|row| row.score).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: ResumeSettings = ResumeSettings {
        population_size: 2,
        evaluations_per_candidate: 2,
    };

    fn c(v: f64) -> Candidate {
        Candidate::new(vec![v])
    }

    fn population(generation: u32, episode: u32, genes: &[f64]) -> Vec<PopulationRecord> {
        genes
            .iter()
            .map(|g| PopulationRecord {
                generation,
                episode,
                genes: c(*g),
            })
            .collect()
    }

    fn trial(generation: u32, episode: u32, gene: f64, score: f64) -> EvaluationRecord {
        EvaluationRecord {
            generation,
            episode,
            evaluation: 1,
            arena: 0,
            active_casu: 1,
            started_at: None,
            score,
            genes: c(gene),
        }
    }

    fn partial(generation: u32, gene: f64, fitness: f64) -> PartialRecord {
        PartialRecord {
            generation,
            episode: 1,
            fitness,
            genes: c(gene),
        }
    }

    fn summary(generation: u32, gene: f64, fitness: f64) -> FitnessRecord {
        FitnessRecord {
            generation,
            fitness,
            genes: c(gene),
        }
    }

    #[test]
    fn empty_logs_mean_a_fresh_start() {
        assert_eq!(ResumeState::reconstruct(SETTINGS, &[], &[], &[], &[]).unwrap(), None);
    }

    #[test]
    fn interrupted_inside_the_initial_population() {
        let pop = population(0, 1, &[10.0, 20.0]);
        let trials = vec![
            trial(0, 1, 10.0, 1.0),
            trial(0, 1, 10.0, 3.0),
            trial(0, 2, 20.0, 5.0),
        ];
        let partials = vec![partial(0, 10.0, 2.0)];
        let state = ResumeState::reconstruct(SETTINGS, &pop, &trials, &partials, &[])
            .unwrap()
            .unwrap();

        assert_eq!(state.start_generation, 0);
        assert_eq!(state.pipeline_generation, 0);
        assert_eq!(state.parents, Replay::new(vec![c(10.0), c(20.0)], vec![2.0]));
        assert_eq!(state.offspring, None);
        assert_eq!(
            state.pending,
            Some(PendingTrials {
                genes: c(20.0),
                scores: vec![5.0]
            })
        );
        assert_eq!(state.persisted_summaries, 0);
        assert_eq!(state.next_episode, 3);
        assert_eq!(state.remaining_generations(5), 5);
    }

    #[test]
    fn interrupted_inside_a_later_generation() {
        let mut pop = population(0, 1, &[10.0, 20.0]);
        pop.extend(population(1, 2, &[11.0, 21.0]));
        let partials = vec![
            partial(0, 10.0, 2.0),
            partial(0, 20.0, 4.0),
            partial(1, 11.0, 6.0),
        ];
        let fitness = vec![summary(0, 20.0, 4.0), summary(0, 10.0, 2.0)];
        let trials = vec![
            trial(1, 2, 11.0, 6.0),
            trial(1, 2, 11.0, 6.0),
        ];
        let state = ResumeState::reconstruct(SETTINGS, &pop, &trials, &partials, &fitness)
            .unwrap()
            .unwrap();

        assert_eq!(state.start_generation, 0);
        assert_eq!(state.pipeline_generation, 1);
        assert_eq!(state.seeds(), vec![c(20.0), c(10.0)]);
        assert_eq!(state.parents.fitness, vec![4.0, 2.0]);
        assert_eq!(state.offspring_candidates(), Some(vec![c(11.0), c(21.0)]));
        assert_eq!(state.offspring.as_ref().unwrap().fitness, vec![6.0]);
        assert_eq!(state.pending, None);
        assert_eq!(state.persisted_summaries, 1);
    }

    #[test]
    fn fully_scored_generation_continues_with_the_next() {
        let pop = population(0, 1, &[10.0, 20.0]);
        let partials = vec![partial(0, 10.0, 2.0), partial(0, 20.0, 4.0)];
        let fitness = vec![summary(0, 20.0, 4.0), summary(0, 10.0, 2.0)];
        let state = ResumeState::reconstruct(SETTINGS, &pop, &[], &partials, &fitness)
            .unwrap()
            .unwrap();
        assert_eq!(state.pipeline_generation, 1);
        assert!(state.parents.is_complete());
        assert_eq!(state.persisted_summaries, 1);
        let step = state.evaluator_phase().step(&state.seeds()).unwrap();
        assert_eq!(step.next, ResumePhase::Live);
    }

    #[test]
    fn short_population_is_fatal() {
        let pop = population(0, 1, &[10.0]);
        assert!(matches!(
            ResumeState::reconstruct(SETTINGS, &pop, &[], &[], &[]),
            Err(ResumeError::PopulationSize { found: 1, .. })
        ));
    }

    #[test]
    fn skipped_generation_is_fatal() {
        let mut pop = population(0, 1, &[10.0, 20.0]);
        pop.extend(population(2, 1, &[11.0, 21.0]));
        assert!(matches!(
            ResumeState::reconstruct(SETTINGS, &pop, &[], &[], &[]),
            Err(ResumeError::GenerationGap {
                previous: 0,
                found: 2
            })
        ));
    }

    #[test]
    fn later_generation_needs_the_previous_survivors() {
        let mut pop = population(0, 1, &[10.0, 20.0]);
        pop.extend(population(1, 1, &[11.0, 21.0]));
        let fitness = vec![summary(0, 20.0, 4.0)];
        assert!(matches!(
            ResumeState::reconstruct(SETTINGS, &pop, &[], &[], &fitness),
            Err(ResumeError::IncompleteParents {
                generation: 0,
                scored: 1,
                expected: 2
            })
        ));
    }

    #[test]
    fn partial_rows_must_follow_the_population_order() {
        let pop = population(0, 1, &[10.0, 20.0]);
        let partials = vec![partial(0, 20.0, 1.0)];
        assert!(matches!(
            ResumeState::reconstruct(SETTINGS, &pop, &[], &partials, &[]),
            Err(ResumeError::GenesMismatch {
                generation: 0,
                index: 0
            })
        ));
    }

    #[test]
    fn too_many_trials_for_one_candidate_is_fatal() {
        let pop = population(0, 1, &[10.0, 20.0]);
        let trials = vec![
            trial(0, 1, 10.0, 1.0),
            trial(0, 1, 10.0, 1.0),
            trial(0, 1, 10.0, 1.0),
        ];
        assert!(matches!(
            ResumeState::reconstruct(SETTINGS, &pop, &trials, &[], &[]),
            Err(ResumeError::TrialOverflow { found: 3, .. })
        ));
    }

    #[test]
    fn all_trials_run_but_not_reduced_are_pending() {
        let pop = population(0, 1, &[10.0, 20.0]);
        let trials = vec![trial(0, 1, 10.0, 1.0), trial(0, 1, 10.0, 3.0)];
        let state = ResumeState::reconstruct(SETTINGS, &pop, &trials, &[], &[])
            .unwrap()
            .unwrap();
        assert_eq!(state.pending.unwrap().scores, vec![1.0, 3.0]);
    }
}
