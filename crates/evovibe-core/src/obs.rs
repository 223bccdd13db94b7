//! Structured lifecycle events for a run.
//!
//! - [`run_span`] / [`trial_span`]: spans tagging everything logged
//!   inside them with the run or trial identity
//! - `emit_*`: one `info!` event per lifecycle step
//!
//! Set `RUST_LOG=evovibe_core=debug` for more detail, `--json` on the CLI
//! for machine-readable output.

use tracing::{info, warn, Span};

/// Span covering a whole `new-run` / `continue-run` invocation.
///
/// Attach it with [`tracing::Instrument`]; an entered guard must not be
/// held across an `.await`.
pub fn run_span(run: &str, session: &str) -> Span {
    tracing::info_span!("evovibe.run", run = %run, session = %session)
}

/// Span covering one trial of one candidate.
pub fn trial_span(generation: u32, episode: u32, evaluation: u32) -> Span {
    tracing::info_span!(
        "evovibe.trial",
        generation = generation,
        episode = episode,
        evaluation = evaluation
    )
}

pub fn emit_episode_started(episode: u32, arenas: usize) {
    info!(event = "episode.started", episode = episode, arenas = arenas);
}

pub fn emit_episode_finished(episode: u32, trials: u32, terminal: bool) {
    info!(
        event = "episode.finished",
        episode = episode,
        trials = trials,
        terminal = terminal
    );
}

/// Role commands are about to be dispatched to `arena`.
pub fn emit_trial_started(arena: usize, active_casu: u32, genes: &str) {
    info!(
        event = "trial.started",
        arena = arena,
        active_casu = active_casu,
        genes = %genes
    );
}

pub fn emit_trial_scored(arena: usize, score: f64, frames: usize) {
    info!(
        event = "trial.scored",
        arena = arena,
        score = score,
        frames = frames
    );
}

pub fn emit_candidate_reduced(generation: u32, genes: &str, trials: usize, fitness: f64) {
    info!(
        event = "candidate.reduced",
        generation = generation,
        genes = %genes,
        trials = trials,
        fitness = fitness
    );
}

/// Fitness values answered from the logs instead of live trials.
pub fn emit_resume_replayed(phase: &str, replayed: usize, live: usize) {
    info!(
        event = "resume.replayed",
        phase = %phase,
        replayed = replayed,
        live = live
    );
}

/// No arena passed the temperature check; the operator has to intervene.
pub fn emit_no_usable_arena(temperatures: &str) {
    warn!(event = "arena.unusable", temperatures = %temperatures);
}
