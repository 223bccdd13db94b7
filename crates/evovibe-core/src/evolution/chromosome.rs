//! Generators, mutation and bounds for each chromosome kind.
//!
//! Genes are whole numbers on a grid of 10: milliseconds for periods,
//! hertz for frequencies.

use evovibe_link::{Candidate, ChromosomeKind};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

use super::engine::{Bounder, Generator, Individual, Variator};

const STEP: i64 = 10;

const MIN_PERIOD_MS: i64 = 100;
const MAX_PERIOD_MS: i64 = 1000;
/// One step under the speaker minimum: a continuous tone.
const MIN_PAUSE_MS: i64 = MIN_PERIOD_MS - STEP;

const MIN_FREQUENCY_HZ: i64 = 300;
const MAX_FREQUENCY_HZ: i64 = 1500;

const PAUSE_STDDEV_MS: f64 = 300.0;
const FREQUENCY_SUCCESS: f64 = 1.0 / 30.0;
const PERIOD_SUCCESS: f64 = 1.0 / 60.0;

/// Allowed range of one gene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneBounds {
    pub lower: i64,
    pub upper: i64,
}

impl GeneBounds {
    /// Truncate, snap down to the grid and clamp.
    pub fn apply(&self, value: f64) -> f64 {
        let v = if value.is_finite() { value.trunc() as i64 } else { self.lower };
        let snapped = v - v.rem_euclid(STEP);
        snapped.clamp(self.lower, self.upper) as f64
    }
}

fn bounds(kind: ChromosomeKind) -> Vec<GeneBounds> {
    match kind {
        ChromosomeKind::SinglePulseGenePause => vec![GeneBounds {
            lower: MIN_PAUSE_MS,
            upper: MAX_PERIOD_MS,
        }],
        ChromosomeKind::SinglePulseGenesPulse => vec![
            GeneBounds {
                lower: MIN_FREQUENCY_HZ,
                upper: MAX_FREQUENCY_HZ,
            },
            GeneBounds {
                lower: MIN_PERIOD_MS,
                upper: MAX_PERIOD_MS,
            },
            GeneBounds {
                lower: MIN_PAUSE_MS,
                upper: MAX_PERIOD_MS,
            },
        ],
    }
}

/// Uniform on the grid points `low, low + 10, ...` below `high`.
fn grid(rng: &mut StdRng, low: i64, high: i64) -> f64 {
    let points = (high - low + STEP - 1) / STEP;
    (low + rng.gen_range(0..points) * STEP) as f64
}

/// Number of failed trials before the first success, with a random sign.
fn geometric_perturbation(rng: &mut StdRng, success: f64) -> i64 {
    let mut steps = 0i64;
    while rng.gen::<f64>() > success {
        steps += 1;
    }
    if rng.gen_bool(0.5) {
        steps
    } else {
        -steps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromosomeGenerator {
    pub kind: ChromosomeKind,
}

impl Generator for ChromosomeGenerator {
    fn generate(&self, rng: &mut StdRng) -> Candidate {
        match self.kind {
            ChromosomeKind::SinglePulseGenePause => {
                Candidate::new(vec![grid(rng, MIN_PERIOD_MS, MAX_PERIOD_MS + 1)])
            }
            ChromosomeKind::SinglePulseGenesPulse => Candidate::new(vec![
                grid(rng, MIN_FREQUENCY_HZ, MAX_FREQUENCY_HZ),
                grid(rng, MIN_PERIOD_MS, MAX_PERIOD_MS + 1),
                grid(rng, MIN_PERIOD_MS, MAX_PERIOD_MS + 1),
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChromosomeBounder {
    genes: Vec<GeneBounds>,
}

impl ChromosomeBounder {
    pub fn new(kind: ChromosomeKind) -> Self {
        Self {
            genes: bounds(kind),
        }
    }
}

impl Bounder for ChromosomeBounder {
    fn bound(&self, candidate: Candidate) -> Candidate {
        Candidate::new(
            candidate
                .genes()
                .iter()
                .zip(&self.genes)
                .map(|(g, b)| b.apply(*g))
                .collect(),
        )
    }
}

/// One mutant per parent.
///
/// The pause gene gets Gaussian noise; the three-gene kind moves one gene,
/// picked at random, by a geometric number of grid steps.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationVariator {
    kind: ChromosomeKind,
    bounds: Vec<GeneBounds>,
}

impl MutationVariator {
    pub fn new(kind: ChromosomeKind) -> Self {
        Self {
            kind,
            bounds: bounds(kind),
        }
    }

    fn mutate(&self, rng: &mut StdRng, candidate: &Candidate) -> Candidate {
        let mut genes = candidate.genes().to_vec();
        match self.kind {
            ChromosomeKind::SinglePulseGenePause => {
                if let Some(pause) = genes.first_mut() {
                    let noise: f64 = rng.sample(StandardNormal);
                    *pause = self.bounds[0].apply(*pause + noise * PAUSE_STDDEV_MS);
                }
            }
            ChromosomeKind::SinglePulseGenesPulse => {
                let index = rng.gen_range(0..genes.len().min(self.bounds.len()).max(1));
                let success = if index == 0 {
                    FREQUENCY_SUCCESS
                } else {
                    PERIOD_SUCCESS
                };
                if let (Some(gene), Some(b)) = (genes.get_mut(index), self.bounds.get(index)) {
                    let step = (STEP * geometric_perturbation(rng, success)) as f64;
                    *gene = b.apply(*gene + step);
                }
            }
        }
        Candidate::new(genes)
    }
}

impl Variator for MutationVariator {
    fn vary(&mut self, rng: &mut StdRng, parents: &[Individual]) -> Vec<Candidate> {
        parents
            .iter()
            .map(|p| self.mutate(rng, &p.candidate))
            .collect()
    }
}
