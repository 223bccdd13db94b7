//! Variator wrapper: the logged offspring once, then normal variation.

use evovibe_link::Candidate;
use rand::rngs::StdRng;
use tracing::debug;

use crate::evolution::{Individual, Variator};

#[derive(Debug, Clone, PartialEq)]
pub enum VariatorPhase {
    ReplayFirst(Vec<Candidate>),
    Live,
}

pub struct ResumeVariator<V> {
    inner: V,
    phase: VariatorPhase,
}

impl<V: Variator> ResumeVariator<V> {
    pub fn new(inner: V, phase: VariatorPhase) -> Self {
        Self { inner, phase }
    }

    /// Replay `offspring` on the first call when there are any.
    pub fn replaying(inner: V, offspring: Option<Vec<Candidate>>) -> Self {
        let phase = offspring.map_or(VariatorPhase::Live, VariatorPhase::ReplayFirst);
        Self::new(inner, phase)
    }

    pub fn phase(&self) -> &VariatorPhase {
        &self.phase
    }
}

impl<V: Variator> Variator for ResumeVariator<V> {
    fn vary(&mut self, rng: &mut StdRng, parents: &[Individual]) -> Vec<Candidate> {
        match std::mem::replace(&mut self.phase, VariatorPhase::Live) {
            VariatorPhase::ReplayFirst(offspring) => {
                debug!(count = offspring.len(), "replaying logged offspring");
                offspring
            }
            VariatorPhase::Live => self.inner.vary(rng, parents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::engine::tests::AddOne;
    use rand::SeedableRng;

    #[test]
    fn logged_offspring_come_back_unchanged_once() {
        let logged = vec![Candidate::new(vec![40.0]), Candidate::new(vec![41.0])];
        let mut variator = ResumeVariator::replaying(AddOne, Some(logged.clone()));
        let parents = vec![Individual::new(Candidate::new(vec![1.0]), 0.0)];
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(variator.vary(&mut rng, &parents), logged);
        assert_eq!(variator.phase(), &VariatorPhase::Live);
        assert_eq!(
            variator.vary(&mut rng, &parents),
            vec![Candidate::new(vec![2.0])]
        );
    }

    #[test]
    fn nothing_logged_is_live_from_the_start() {
        let mut variator = ResumeVariator::replaying(AddOne, None);
        let parents = vec![Individual::new(Candidate::new(vec![5.0]), 0.0)];
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            variator.vary(&mut rng, &parents),
            vec![Candidate::new(vec![6.0])]
        );
    }
}
