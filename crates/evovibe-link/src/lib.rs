//! Evovibe-Link: master/worker transport
//!
//! One bidirectional, strictly alternating request/response channel per
//! device. Messages are a closed set of typed commands and replies, framed
//! as newline-delimited JSON.
//!
//! ## Key Components
//!
//! - `Command` / `Reply`: the wire vocabulary
//! - `Channel`: master-side trait, implemented by `TcpChannel`
//! - `CommandStream`: worker-side reader/replier
//! - `fakes`: loopback and scripted channels for tests
//! - `telemetry`: tracing setup for the binaries

pub mod channel;
mod error;
pub mod fakes;
pub mod framing;
pub mod message;
pub mod telemetry;

pub use channel::{Channel, CommandStream, StreamChannel, TcpChannel};
pub use error::{LinkError, LinkResult};
pub use message::{Candidate, ChromosomeKind, Command, Reply, WorkerParams};
pub use telemetry::init_tracing;
