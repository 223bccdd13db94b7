//! Evaluation pipeline: turns a population into fitness values by running
//! trials in the arenas.
//!
//! One trial: count it in the episode, pick an arena, record video while
//! the arena runs its roles, split the video into frames, extract the
//! pixel features per member, score. A candidate gets a fixed number of
//! independent trials whose scores are reduced to its fitness.
//!
//! Every completed trial is appended to `evaluation.csv` before anything
//! else happens; resume relies on that row being the durable record.

use std::sync::Arc;

use async_trait::async_trait;
use evovibe_link::Candidate;
use evovibe_media::{CaptureRequest, MediaToolkit};
use evovibe_state::{EvaluationRecord, ExperimentLog, PartialRecord, PopulationRecord};
use rand::rngs::StdRng;
use tracing::{info, warn, Instrument};

use crate::arena::Arena;
use crate::config::ExperimentConfig;
use crate::episode::{CandidateStart, EpisodeManager};
use crate::error::{EvovibeError, EvovibeResult, ResumeError};
use crate::evolution::Evaluate;
use crate::features::extract_features;
use crate::metrics::METRICS;
use crate::obs;
use crate::reduction::Reduction;
use crate::scoring::{PulseSchedule, ScoringFunction, Thresholds, DISCARD_FRAMES};

/// Trials an earlier process already ran for the candidate it was scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTrials {
    pub genes: Candidate,
    pub scores: Vec<f64>,
}

/// Everything the pipeline reads from the experiment config.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub population_size: usize,
    pub evaluations_per_candidate: usize,
    pub scoring: ScoringFunction,
    pub reduction: Reduction,
    pub thresholds: Thresholds,
    pub schedule: PulseSchedule,
    /// Frames of the stimulus window
    pub analysed_frames: usize,
    pub previous_frame_gap: usize,
    pub capture: CaptureRequest,
    pub pause_after_trial: bool,
}

impl From<&ExperimentConfig> for PipelineSettings {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            population_size: config.search.population_size,
            evaluations_per_candidate: config.search.evaluations_per_candidate,
            scoring: config.search.fitness_function,
            reduction: config.search.reduction,
            thresholds: config.thresholds(),
            schedule: config.schedule(),
            analysed_frames: config.analysed_frames(),
            previous_frame_gap: config.previous_frame_gap(),
            capture: config.capture_request(),
            pause_after_trial: config.search.pause_after_trial,
        }
    }
}

pub struct EvaluationPipeline {
    settings: PipelineSettings,
    episodes: EpisodeManager,
    log: Arc<dyn ExperimentLog>,
    media: MediaToolkit,
    rng: StdRng,
    /// Generation the next `evaluate` call scores
    generation: u32,
    pending: Option<PendingTrials>,
}

impl EvaluationPipeline {
    pub fn new(
        settings: PipelineSettings,
        episodes: EpisodeManager,
        log: Arc<dyn ExperimentLog>,
        media: MediaToolkit,
        rng: StdRng,
    ) -> Self {
        Self {
            settings,
            episodes,
            log,
            media,
            rng,
            generation: 0,
            pending: None,
        }
    }

    pub fn starting_at(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_pending(mut self, pending: Option<PendingTrials>) -> Self {
        self.pending = pending;
        self
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn episodes(&self) -> &EpisodeManager {
        &self.episodes
    }

    pub fn episodes_mut(&mut self) -> &mut EpisodeManager {
        &mut self.episodes
    }

    async fn log_population(&self, candidates: &[Candidate]) -> EvovibeResult<()> {
        let rows: Vec<PopulationRecord> = candidates
            .iter()
            .map(|c| PopulationRecord {
                generation: self.generation,
                episode: self.episodes.index(),
                genes: c.clone(),
            })
            .collect();
        self.log.append_population(&rows).await?;
        info!(generation = self.generation, size = rows.len(), "population logged");
        Ok(())
    }

    async fn evaluate_batch(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>> {
        let mut fitness = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            fitness.push(self.evaluate_candidate(candidate).await?);
        }
        self.generation += 1;
        Ok(fitness)
    }

    /// Trials already persisted for `candidate`, if the pending ones are its.
    fn take_pending(&mut self, candidate: &Candidate) -> EvovibeResult<Vec<f64>> {
        match self.pending.take() {
            None => Ok(Vec::new()),
            Some(pending) if &pending.genes == candidate => {
                obs::emit_resume_replayed(
                    "trials",
                    pending.scores.len(),
                    self.settings
                        .evaluations_per_candidate
                        .saturating_sub(pending.scores.len()),
                );
                Ok(pending.scores)
            }
            Some(_) => Err(ResumeError::ReplayMismatch {
                phase: "trials",
                index: 0,
            }
            .into()),
        }
    }

    /// Run the remaining trials of one candidate and persist its reduced fitness.
    pub async fn evaluate_candidate(&mut self, candidate: &Candidate) -> EvovibeResult<f64> {
        let mut scores = self.take_pending(candidate)?;
        let trials = self.settings.evaluations_per_candidate;
        if scores.len() < trials
            && self.episodes.prepare_candidate(candidate).await? == CandidateStart::Replaced
        {
            info!(episode = self.episodes.index(), "bees replaced before candidate");
        }
        while scores.len() < trials {
            scores.push(self.run_trial(candidate).await?);
        }
        // zero before any arena exists, which makes the weighted reduction a plain mean
        let roi_area = self
            .episodes
            .arenas()
            .iter()
            .map(Arena::largest_roi_area)
            .max()
            .unwrap_or(0);
        let expected_range = self
            .settings
            .scoring
            .expected_range(self.settings.analysed_frames, roi_area);
        let fitness = self.settings.reduction.reduce(&scores, expected_range);
        self.log
            .append_partial(&PartialRecord {
                generation: self.generation,
                episode: self.episodes.index(),
                fitness,
                genes: candidate.clone(),
            })
            .await?;
        obs::emit_candidate_reduced(self.generation, &candidate.to_string(), scores.len(), fitness);
        Ok(fitness)
    }

    /// One trial in one arena, persisted before it returns.
    pub async fn run_trial(&mut self, candidate: &Candidate) -> EvovibeResult<f64> {
        let evaluation = self.episodes.increment_evaluation_counter().await?;
        let picked = self.episodes.select_arena(&mut self.rng).await?;
        let arena = self
            .episodes
            .arena(picked)
            .cloned()
            .ok_or_else(|| EvovibeError::Engine(format!("arena {picked} does not exist")))?;
        let episode = self.episodes.index();
        let span = obs::trial_span(self.generation, episode, evaluation);
        let score = self
            .score_trial(candidate, &arena, episode, evaluation)
            .instrument(span)
            .await?;

        if self.settings.pause_after_trial
            && self
                .episodes
                .operator()
                .ask_yes_no("Trial saved. Stop the run now?")
                .await?
        {
            return Err(EvovibeError::StoppedByOperator);
        }
        Ok(score)
    }

    async fn score_trial(
        &mut self,
        candidate: &Candidate,
        arena: &Arena,
        episode: u32,
        evaluation: u32,
    ) -> EvovibeResult<f64> {
        let dir = self.episodes.dir();
        let video = dir.join(format!("evaluation-{evaluation:03}.avi"));
        let frames_dir = dir.join(format!("frames-{evaluation:03}"));

        let roles = arena.assign_roles(&mut self.rng);
        obs::emit_trial_started(arena.index(), roles.active_casu, &candidate.to_string());

        // Both run to completion; a stimulus already under way is never abandoned.
        let (recorded, dispatched) = tokio::join!(
            self.media.camera.record(&self.settings.capture, &video),
            arena.dispatch(candidate, roles),
        );
        let outcome = dispatched?;
        recorded?;

        let frames = self
            .media
            .frames
            .extract(
                &video,
                self.settings.capture.frame_rate,
                self.settings.analysed_frames + DISCARD_FRAMES,
                &frames_dir,
            )
            .await?;
        let features = extract_features(
            self.media.comparator.as_ref(),
            &self.episodes.background(),
            &frames,
            &arena.masks(),
            self.settings.previous_frame_gap,
        )
        .await?;
        let csv_path = dir.join(format!("image-processing_{evaluation}.csv"));
        tokio::fs::write(&csv_path, features.to_csv(&arena.labels()))
            .await
            .map_err(|e| EvovibeError::io(&csv_path, e))?;

        let score = self.settings.scoring.score(
            &features,
            roles.active,
            self.settings.thresholds,
            &self.settings.schedule,
        );
        self.log
            .append_evaluation(&EvaluationRecord {
                generation: self.generation,
                episode,
                evaluation,
                arena: arena.index(),
                active_casu: roles.active_casu,
                started_at: outcome.started_at,
                score,
                genes: candidate.clone(),
            })
            .await?;
        METRICS.inc_trials();
        obs::emit_trial_scored(arena.index(), score, features.len());
        if outcome.started_at.is_none() {
            warn!(arena = arena.index(), "active device did not report its stimulus start");
        }
        Ok(score)
    }

    /// End the last episode and stop every worker.
    /// Leave the devices idle after the operator stopped the run.
    pub async fn standby(&self) -> EvovibeResult<()> {
        self.episodes.standby_workers().await
    }

    pub async fn shutdown(&mut self) -> EvovibeResult<()> {
        self.episodes.finish(true).await?;
        self.episodes.terminate_workers().await
    }
}

#[async_trait]
impl Evaluate for EvaluationPipeline {
    async fn evaluate(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>> {
        if candidates.len() == self.settings.population_size {
            self.log_population(candidates).await?;
        }
        self.evaluate_batch(candidates).await
    }

    async fn evaluate_remainder(&mut self, candidates: &[Candidate]) -> EvovibeResult<Vec<f64>> {
        self.evaluate_batch(candidates).await
    }
}
