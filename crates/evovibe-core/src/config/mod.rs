//! Experiment and worker configuration.
//!
//! Two TOML files describe a run: `experiment.toml` (search, timing, image
//! processing and temperature policy) and `workers.toml` (where each device
//! worker listens). Both are validated after parsing; see [`validation`].

pub mod loader;
pub mod validation;

use evovibe_link::{ChromosomeKind, WorkerParams};
use evovibe_media::{CaptureRequest, ImageSize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::arena::{ArenaKind, TemperaturePolicy};
use crate::reduction::Reduction;
use crate::scoring::{PulseSchedule, ScoringFunction, Thresholds};

pub use loader::{load_experiment, load_experiment_str, load_workers, load_workers_str};
pub use validation::{validate_experiment, validate_workers, ConfigError};

/// Time bees tolerate the arena before they must be swapped, seconds.
pub const BEE_WORKDAY_SECS: f64 = 30.0 * 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
    pub search: SearchSettings,
    pub timing: TimingSettings,
    pub image: ImageSettings,
    #[serde(default)]
    pub temperature: TemperaturePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchSettings {
    pub population_size: usize,
    pub number_generations: u32,
    /// Independent trials per candidate
    pub evaluations_per_candidate: usize,
    /// Trials before the subjects are swapped
    pub evaluations_per_episode: u32,
    /// Bees placed in each arena per episode
    pub subjects_per_arena: u32,
    pub chromosome: ChromosomeKind,
    pub fitness_function: ScoringFunction,
    pub reduction: Reduction,
    pub arena: ArenaKind,
    #[serde(default)]
    pub elitism: bool,
    /// Base seed; a fresh one is drawn and stored in the run folder when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Offer the operator a stop after every persisted trial
    #[serde(default = "default_true")]
    pub pause_after_trial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingSettings {
    pub stimulus_secs: f64,
    pub no_stimulus_secs: f64,
    pub repetitions: u32,
    pub spread_secs: f64,
    pub frame_rate: u32,
    /// Previous-frame comparisons per second; defaults to every frame
    #[serde(default)]
    pub previous_frame_interval: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_threshold")]
    pub background_threshold: u64,
    #[serde(default = "default_threshold")]
    pub movement_threshold: u64,
    /// Per-channel intensity tolerance of the image comparison, percent
    #[serde(default = "default_fuzz")]
    pub fuzz_percent: u32,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> u64 {
    100
}

fn default_fuzz() -> u32 {
    10
}

impl ExperimentConfig {
    pub fn worker_params(&self) -> WorkerParams {
        WorkerParams {
            stimulus_secs: self.timing.stimulus_secs,
            no_stimulus_secs: self.timing.no_stimulus_secs,
            repetitions: self.timing.repetitions,
            spread_secs: self.timing.spread_secs,
            frame_rate: self.timing.frame_rate,
            chromosome: self.search.chromosome,
        }
    }

    /// `repetitions × (stim + no_stim) + stim`
    pub fn evaluation_run_secs(&self) -> f64 {
        self.worker_params().evaluation_run_secs()
    }

    /// Frames covering the stimulus window; the rest of the video is not scored.
    pub fn analysed_frames(&self) -> usize {
        (self.evaluation_run_secs() * f64::from(self.timing.frame_rate)).floor() as usize
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image.width, self.image.height)
    }

    /// Video long enough for both blips, the stimulus and the spread phase.
    pub fn capture_request(&self) -> CaptureRequest {
        CaptureRequest {
            duration_secs: self.worker_params().role_secs(),
            size: self.image_size(),
            frame_rate: self.timing.frame_rate,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            background: self.image.background_threshold,
            movement: self.image.movement_threshold,
        }
    }

    pub fn schedule(&self) -> PulseSchedule {
        let fps = f64::from(self.timing.frame_rate);
        PulseSchedule {
            stimulus_frames: (self.timing.stimulus_secs * fps).round() as usize,
            no_stimulus_frames: (self.timing.no_stimulus_secs * fps).round() as usize,
            repetitions: self.timing.repetitions,
        }
    }

    /// Frames between a frame and the one it is compared against for movement.
    pub fn previous_frame_gap(&self) -> usize {
        match self.timing.previous_frame_interval {
            Some(interval) if interval > 0 => (self.timing.frame_rate / interval).max(1) as usize,
            _ => 1,
        }
    }

    /// Hex SHA-256 over the canonical JSON form; stored with a run and
    /// checked again when it is continued.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }

    /// Non-fatal remarks about the experiment plan, for the operator.
    pub fn advisories(&self) -> Vec<String> {
        let mut notes = Vec::new();
        let episode_secs = f64::from(self.search.evaluations_per_episode)
            * (self.evaluation_run_secs() + self.timing.spread_secs);
        if episode_secs > BEE_WORKDAY_SECS {
            notes.push(format!(
                "an episode takes {:.0} min, longer than the {:.0} min bee workday",
                episode_secs / 60.0,
                BEE_WORKDAY_SECS / 60.0
            ));
        }
        let per_candidate = self.search.evaluations_per_candidate as u32;
        if per_candidate > 0 && self.search.evaluations_per_episode % per_candidate != 0 {
            notes.push(format!(
                "{} trials per episode is not a multiple of {} trials per candidate; \
                 bees will be swapped in the middle of a candidate",
                self.search.evaluations_per_episode, per_candidate
            ));
        }
        notes
    }
}

/// One device worker as listed in `workers.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerEntry {
    pub casu_number: u32,
    /// `host:port` the worker listens on
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkersConfig {
    #[serde(default)]
    pub workers: Vec<WorkerEntry>,
}
