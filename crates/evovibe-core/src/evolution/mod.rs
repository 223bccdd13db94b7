//! Generational evolutionary search over candidates.
//!
//! The engine only knows the five hook traits in [`engine`]; the evaluation
//! pipeline and the resume wrappers plug in through them.

pub mod chromosome;
pub mod engine;
pub mod observers;

pub use chromosome::{ChromosomeBounder, ChromosomeGenerator, GeneBounds, MutationVariator};
pub use engine::{
    Bounder, Evaluate, EvolutionSettings, EvolutionaryComputation, Generator, Individual,
    Observer, Variator,
};
pub use observers::FitnessLogObserver;
