//! Evaluator wrapper: persisted fitness first, live trials for the rest.
//!
//! ```text
//! ReplayParents ──(offspring logged)──→ ReplayOffspring ──→ Live
//!       └──────────(no offspring)──────────────────────────→ Live
//! ```
//!
//! [`ResumePhase::step`] is pure; the wrapper only executes the live part
//! of the returned [`Step`].

use async_trait::async_trait;
use evovibe_link::Candidate;

use crate::error::{EvovibeResult, ResumeError};
use crate::evolution::Evaluate;
use crate::metrics::METRICS;
use crate::obs;

/// Candidates in the order they were logged, and the fitness of a prefix of them.
#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub candidates: Vec<Candidate>,
    pub fitness: Vec<f64>,
}

impl Replay {
    pub fn new(candidates: Vec<Candidate>, fitness: Vec<f64>) -> Self {
        Self {
            candidates,
            fitness,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.candidates.len() == self.fitness.len()
    }

    /// Check the engine's `candidates` start with the scored prefix of this replay.
    fn check(&self, phase: &'static str, candidates: &[Candidate]) -> Result<(), ResumeError> {
        if candidates.len() < self.fitness.len() {
            return Err(ResumeError::ReplayLength {
                phase,
                candidates: candidates.len(),
                persisted: self.fitness.len(),
            });
        }
        match candidates
            .iter()
            .zip(&self.candidates)
            .take(self.fitness.len())
            .position(|(asked, logged)| asked != logged)
        {
            Some(index) => Err(ResumeError::ReplayMismatch { phase, index }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResumePhase {
    ReplayParents {
        parents: Replay,
        offspring: Option<Replay>,
    },
    ReplayOffspring {
        offspring: Replay,
    },
    Live,
}

/// What to do with the candidates of one evaluator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveCall {
    None,
    /// Evaluate `candidates[start..]`; the head was scored earlier.
    Remainder(usize),
    /// A normal call.
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub replayed: Vec<f64>,
    pub live: LiveCall,
    pub next: ResumePhase,
}

impl Step {
    fn tail(replayed: Vec<f64>, total: usize) -> Self {
        let live = if replayed.len() == total {
            LiveCall::None
        } else {
            LiveCall::Remainder(replayed.len())
        };
        Self {
            replayed,
            live,
            next: ResumePhase::Live,
        }
    }
}

impl ResumePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ResumePhase::ReplayParents { .. } => "replay_parents",
            ResumePhase::ReplayOffspring { .. } => "replay_offspring",
            ResumePhase::Live => "live",
        }
    }

    /// Split one evaluator call into replayed fitness and a live part.
    pub fn step(&self, candidates: &[Candidate]) -> Result<Step, ResumeError> {
        let phase = self.name();
        match self {
            ResumePhase::ReplayParents { parents, offspring } => {
                parents.check(phase, candidates)?;
                match offspring {
                    Some(offspring) => {
                        if candidates.len() != parents.fitness.len() {
                            return Err(ResumeError::ReplayLength {
                                phase,
                                candidates: candidates.len(),
                                persisted: parents.fitness.len(),
                            });
                        }
                        Ok(Step {
                            replayed: parents.fitness.clone(),
                            live: LiveCall::None,
                            next: ResumePhase::ReplayOffspring {
                                offspring: offspring.clone(),
                            },
                        })
                    }
                    None => Ok(Step::tail(parents.fitness.clone(), candidates.len())),
                }
            }
            ResumePhase::ReplayOffspring { offspring } => {
                offspring.check(phase, candidates)?;
                Ok(Step::tail(offspring.fitness.clone(), candidates.len()))
            }
            ResumePhase::Live => Ok(Step {
                replayed: Vec::new(),
                live: LiveCall::Full,
                next: ResumePhase::Live,
            }),
        }
    }
}

pub struct ResumeEvaluator<E> {
    inner: E,
    phase: ResumePhase,
}

impl<E: Evaluate> ResumeEvaluator<E> {
    pub fn new(inner: E, phase: ResumePhase) -> Self {
        Self { inner, phase }
    }

    pub fn phase(&self) -> &ResumePhase {
        &self.phase
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E: Evaluate> Evaluate for ResumeEvaluator<E> {
    async fn evaluate(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>> {
        let Step {
            mut replayed,
            live,
            next,
        } = self.phase.step(candidates)?;
        let phase = self.phase.name();
        self.phase = next;

        let fresh = match live {
            LiveCall::None => Vec::new(),
            LiveCall::Remainder(start) => self.inner.evaluate_remainder(&candidates[start..]).await?,
            LiveCall::Full => return self.inner.evaluate(candidates).await,
        };
        METRICS.add_replayed(replayed.len() as u64);
        obs::emit_resume_replayed(phase, replayed.len(), fresh.len());
        replayed.extend(fresh);
        Ok(replayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvovibeError;
    use crate::evolution::engine::tests::GeneFitness;

    fn genes(values: &[f64]) -> Vec<Candidate> {
        values.iter().map(|v| Candidate::new(vec![*v])).collect()
    }

    #[test]
    fn complete_parents_without_offspring_go_live() {
        let phase = ResumePhase::ReplayParents {
            parents: Replay::new(genes(&[1.0, 2.0]), vec![0.5, 0.7]),
            offspring: None,
        };
        let step = phase.step(&genes(&[1.0, 2.0])).unwrap();
        assert_eq!(step.replayed, vec![0.5, 0.7]);
        assert_eq!(step.live, LiveCall::None);
        assert_eq!(step.next, ResumePhase::Live);
    }

    #[test]
    fn partial_parents_evaluate_the_tail() {
        let phase = ResumePhase::ReplayParents {
            parents: Replay::new(genes(&[1.0, 2.0, 3.0]), vec![0.5]),
            offspring: None,
        };
        let step = phase.step(&genes(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(step.live, LiveCall::Remainder(1));
        assert_eq!(step.next, ResumePhase::Live);
    }

    #[test]
    fn logged_offspring_wait_for_the_next_call() {
        let offspring = Replay::new(genes(&[4.0, 5.0]), vec![]);
        let phase = ResumePhase::ReplayParents {
            parents: Replay::new(genes(&[1.0, 2.0]), vec![0.5, 0.7]),
            offspring: Some(offspring.clone()),
        };
        let step = phase.step(&genes(&[1.0, 2.0])).unwrap();
        assert_eq!(step.live, LiveCall::None);
        assert_eq!(step.next, ResumePhase::ReplayOffspring { offspring });

        let step = step.next.step(&genes(&[4.0, 5.0])).unwrap();
        assert!(step.replayed.is_empty());
        assert_eq!(step.live, LiveCall::Remainder(0));
    }

    #[test]
    fn persisted_data_running_out_exactly_at_the_call_boundary() {
        let phase = ResumePhase::ReplayOffspring {
            offspring: Replay::new(genes(&[4.0, 5.0]), vec![1.0, 2.0]),
        };
        let step = phase.step(&genes(&[4.0, 5.0])).unwrap();
        assert_eq!(step.live, LiveCall::None);
        assert_eq!(step.replayed.len(), 2);
    }

    #[test]
    fn fewer_candidates_than_persisted_fitness_is_fatal() {
        let phase = ResumePhase::ReplayParents {
            parents: Replay::new(genes(&[1.0, 2.0, 3.0]), vec![0.1, 0.2, 0.3]),
            offspring: None,
        };
        let err = phase.step(&genes(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(
            err,
            ResumeError::ReplayLength {
                candidates: 2,
                persisted: 3,
                ..
            }
        ));
    }

    #[test]
    fn different_candidates_are_fatal() {
        let phase = ResumePhase::ReplayOffspring {
            offspring: Replay::new(genes(&[4.0, 5.0]), vec![1.0, 2.0]),
        };
        let err = phase.step(&genes(&[4.0, 6.0])).unwrap_err();
        assert!(matches!(err, ResumeError::ReplayMismatch { index: 1, .. }));
    }

    #[tokio::test]
    async fn wrapper_only_evaluates_what_is_missing() {
        let phase = ResumePhase::ReplayParents {
            parents: Replay::new(genes(&[1.0, 2.0]), vec![9.0, 9.0]),
            offspring: Some(Replay::new(genes(&[3.0, 4.0]), vec![8.0])),
        };
        let mut evaluator = ResumeEvaluator::new(GeneFitness::default(), phase);

        assert_eq!(evaluator.evaluate(&genes(&[1.0, 2.0])).await.unwrap(), vec![9.0, 9.0]);
        assert_eq!(evaluator.evaluate(&genes(&[3.0, 4.0])).await.unwrap(), vec![8.0, 4.0]);
        assert_eq!(evaluator.evaluate(&genes(&[7.0])).await.unwrap(), vec![7.0]);
        assert_eq!(evaluator.phase(), &ResumePhase::Live);
        assert_eq!(
            evaluator.inner().calls,
            vec![genes(&[4.0]), genes(&[7.0])]
        );
    }

    #[tokio::test]
    async fn wrapper_surfaces_replay_errors() {
        let phase = ResumePhase::ReplayOffspring {
            offspring: Replay::new(genes(&[3.0]), vec![1.0]),
        };
        let mut evaluator = ResumeEvaluator::new(GeneFitness::default(), phase);
        let err = evaluator.evaluate(&genes(&[5.0])).await.unwrap_err();
        assert!(matches!(err, EvovibeError::Resume(ResumeError::ReplayMismatch { .. })));
        assert!(evaluator.inner().calls.is_empty());
    }
}
