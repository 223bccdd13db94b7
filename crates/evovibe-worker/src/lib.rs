//! Evovibe-Worker: the process co-located with one CASU
//!
//! Holds device-local state, executes master commands and is the only
//! writer of that device's actuators. Workers never talk to each other.
//!
//! ## Key Components
//!
//! - `Worker`: command state machine over a [`Casu`]
//! - `WorkerConfig`: validated `Initialise` parameters
//! - `VibrationPattern`: candidate decoding per chromosome kind
//! - `serve_session` / `serve_tcp`: answering a master

mod config;
mod error;
pub mod hardware;
pub mod pattern;
pub mod server;
mod worker;

pub use config::{WorkerConfig, BASELINE_TEMPERATURE};
pub use error::{WorkerError, WorkerResult};
pub use hardware::{Actuation, Casu, SimulatedCasu};
pub use pattern::VibrationPattern;
pub use server::{serve_session, serve_tcp, SessionEnd};
pub use worker::{Worker, WorkerState};
