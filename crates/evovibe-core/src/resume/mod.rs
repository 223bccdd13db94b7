//! Crash-resume around the search engine.
//!
//! After a restart the engine is re-seeded with the last fully scored
//! population and driven through the same call sequence it would have
//! made before the interruption. The wrappers here answer the calls whose
//! results are already in the logs and hand everything else to the live
//! implementations:
//!
//! - [`ResumeEvaluator`]: replays parent and offspring fitness, then evaluates live
//! - [`ResumeVariator`]: returns the logged offspring once, then varies live
//! - [`ResumeObserver`]: drops already persisted summaries, offsets generations
//!
//! [`ResumeState`] reconstructs what to replay from the four CSV logs.

pub mod evaluator;
pub mod observer;
pub mod state;
pub mod variator;

pub use evaluator::{LiveCall, Replay, ResumeEvaluator, ResumePhase, Step};
pub use observer::ResumeObserver;
pub use state::{ResumeSettings, ResumeState};
pub use variator::{ResumeVariator, VariatorPhase};
