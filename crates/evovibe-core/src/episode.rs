//! Episode lifecycle: one set of bees, its arenas and its trial counter.
//!
//! ```text
//! Created → Initialising → AwaitingSubjects → Active → Finishing ─┬→ Initialising
//!                                                                  └→ Terminated
//! ```
//!
//! The trial that reaches the per-episode quota already belongs to the new
//! episode: it finishes the old episode, sets up the next one and takes
//! evaluation slot 1 there.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use evovibe_link::{Candidate, Command, WorkerParams};
use evovibe_media::{ImageSize, MediaToolkit};
use futures::future::join_all;
use rand::Rng;
use tracing::info;

use crate::arena::{roulette_select, Arena, ArenaKind, ArenaLayout, TemperaturePolicy};
use crate::config::ExperimentConfig;
use crate::device::{DeviceHandle, DeviceRegistry};
use crate::error::{EvovibeError, EvovibeResult};
use crate::metrics::METRICS;
use crate::obs;
use crate::operator::Operator;

/// Reference image every trial frame is compared against.
pub const BACKGROUND_FILE: &str = "background.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    Created,
    Initialising,
    AwaitingSubjects,
    Active,
    Finishing,
    Terminated,
}

impl fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EpisodePhase::Created => "created",
            EpisodePhase::Initialising => "initialising",
            EpisodePhase::AwaitingSubjects => "awaiting subjects",
            EpisodePhase::Active => "active",
            EpisodePhase::Finishing => "finishing",
            EpisodePhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// The part of the experiment config an episode needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSettings {
    pub evaluations_per_episode: u32,
    pub subjects_per_arena: u32,
    pub arena: ArenaKind,
    pub image_size: ImageSize,
    pub worker_params: WorkerParams,
    pub temperature: TemperaturePolicy,
}

impl From<&ExperimentConfig> for EpisodeSettings {
    fn from(config: &ExperimentConfig) -> Self {
        Self {
            evaluations_per_episode: config.search.evaluations_per_episode,
            subjects_per_arena: config.search.subjects_per_arena,
            arena: config.search.arena,
            image_size: config.image_size(),
            worker_params: config.worker_params(),
            temperature: config.temperature,
        }
    }
}

/// What the operator chose before a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStart {
    Proceed,
    /// The operator swapped the bees; the counter starts over.
    Replaced,
}

pub struct EpisodeManager {
    settings: EpisodeSettings,
    phase: EpisodePhase,
    index: u32,
    evaluation: u32,
    root: PathBuf,
    registry: DeviceRegistry,
    arenas: Vec<Arena>,
    /// Devices that already received `Initialise`
    initialised: HashSet<u32>,
    operator: Arc<dyn Operator>,
    media: MediaToolkit,
}

impl EpisodeManager {
    /// `first_index` is the number the first episode gets; episode folders
    /// are created under `root`.
    pub fn new(
        settings: EpisodeSettings,
        root: impl Into<PathBuf>,
        first_index: u32,
        registry: DeviceRegistry,
        operator: Arc<dyn Operator>,
        media: MediaToolkit,
    ) -> Self {
        Self {
            settings,
            phase: EpisodePhase::Created,
            index: first_index,
            evaluation: 0,
            root: root.into(),
            registry,
            arenas: Vec::new(),
            initialised: HashSet::new(),
            operator,
            media,
        }
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Position of the latest trial in this episode, starting at 1.
    pub fn evaluation(&self) -> u32 {
        self.evaluation
    }

    pub fn arenas(&self) -> &[Arena] {
        &self.arenas
    }

    pub fn arena(&self, index: usize) -> Option<&Arena> {
        self.arenas.get(index)
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.operator
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(format!("{:03}", self.index))
    }

    pub fn background(&self) -> PathBuf {
        self.dir().join(BACKGROUND_FILE)
    }

    fn expect_phase(&self, operation: &'static str, allowed: &[EpisodePhase]) -> EvovibeResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(EvovibeError::EpisodePhase {
                operation,
                phase: self.phase.to_string(),
            })
        }
    }

    /// Set up the first episode if nothing has been set up yet.
    pub async fn ensure_started(&mut self) -> EvovibeResult<()> {
        if self.phase == EpisodePhase::Created {
            self.initialise().await?;
        }
        Ok(())
    }

    /// Take a background image, form the arenas with the operator, initialise
    /// their devices and wait for the bees.
    pub async fn initialise(&mut self) -> EvovibeResult<()> {
        self.expect_phase(
            "initialise",
            &[EpisodePhase::Created, EpisodePhase::Finishing],
        )?;
        self.phase = EpisodePhase::Initialising;
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EvovibeError::io(&dir, e))?;
        info!(episode = self.index, dir = %dir.display(), "initialising episode");

        self.registry.release_all();
        self.arenas.clear();

        let background = self.background();
        self.operator.notify("Creating background image...").await;
        self.media
            .camera
            .snapshot(self.settings.image_size, &background)
            .await?;
        self.operator.show_image(&background).await;

        self.ask_arenas(&dir, &background).await?;
        self.initialise_devices().await?;

        self.phase = EpisodePhase::AwaitingSubjects;
        self.operator
            .confirm(&format!(
                "Place {} bees in each arena.",
                self.settings.subjects_per_arena
            ))
            .await?;
        self.phase = EpisodePhase::Active;
        self.evaluation = 0;
        METRICS.inc_episodes();
        obs::emit_episode_started(self.index, self.arenas.len());
        Ok(())
    }

    async fn ask_arenas(&mut self, dir: &Path, background: &Path) -> EvovibeResult<()> {
        let arity = self.settings.arena.arity();
        loop {
            let available = self.registry.available().len();
            if available < arity {
                if self.arenas.is_empty() {
                    return Err(EvovibeError::NotEnoughDevices {
                        needed: arity,
                        available,
                    });
                }
                break;
            }
            let index = self.arenas.len();
            let devices = self.claim_members().await?;
            let ids: Vec<u32> = devices.iter().map(DeviceHandle::id).collect();
            let layout = ArenaLayout::ask(
                self.settings.arena,
                self.operator.as_ref(),
                self.settings.image_size,
            )
            .await?;
            let arena = Arena::build(
                index,
                layout,
                devices,
                dir.join(format!("arena-{}", index + 1)),
                self.media.painter.as_ref(),
                self.settings.image_size,
                background,
            )
            .await?;
            self.operator.show_image(&arena.preview()).await;
            if !self
                .operator
                .ask_yes_no("Are the regions of interest ok?")
                .await?
            {
                for id in ids {
                    self.registry.release(id);
                }
                continue;
            }
            arena.persist().await?;
            info!(arena = index, casus = ?ids, "arena accepted");
            self.arenas.push(arena);
            if self.registry.available().len() < arity
                || !self.operator.ask_yes_no("Set up another arena?").await?
            {
                break;
            }
        }
        Ok(())
    }

    /// Ask which free device takes each member position and claim it.
    async fn claim_members(&mut self) -> EvovibeResult<Vec<DeviceHandle>> {
        let labels = self.settings.arena.member_labels();
        let mut claimed = Vec::with_capacity(labels.len());
        for label in labels {
            let free = self.registry.available();
            let min = free.iter().copied().min().unwrap_or(0);
            let max = free.iter().copied().max().unwrap_or(0);
            loop {
                let number = self
                    .operator
                    .ask_number(&format!("Number of {label} CASU?"), min, max)
                    .await?;
                match self.registry.claim(number) {
                    Ok(handle) => {
                        claimed.push(handle);
                        break;
                    }
                    Err(EvovibeError::UnknownDevice(_) | EvovibeError::DeviceInUse(_)) => {
                        self.operator
                            .notify(&format!("CASU #{number} is not available."))
                            .await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(claimed)
    }

    /// Send `Initialise` to arena devices that never got it; a worker
    /// accepts it once per session.
    async fn initialise_devices(&mut self) -> EvovibeResult<()> {
        let command = Command::Initialise(self.settings.worker_params.clone());
        let fresh: Vec<DeviceHandle> = self
            .arenas
            .iter()
            .flat_map(|a| a.members().iter().map(|m| m.device.clone()))
            .filter(|d| !self.initialised.contains(&d.id()))
            .collect();
        let replies = join_all(fresh.iter().map(|d| d.acknowledge(&command))).await;
        for (device, reply) in fresh.iter().zip(replies) {
            reply?;
            self.initialised.insert(device.id());
        }
        Ok(())
    }

    /// Count one more trial, rolling over into a new episode when the quota is reached.
    pub async fn increment_evaluation_counter(&mut self) -> EvovibeResult<u32> {
        self.ensure_started().await?;
        self.expect_phase("increment_evaluation_counter", &[EpisodePhase::Active])?;
        let next = self.evaluation + 1;
        if next >= self.settings.evaluations_per_episode {
            info!(episode = self.index, "episode quota reached");
            self.operator.notify("* ** New Episode ** *").await;
            self.finish(false).await?;
            self.index += 1;
            self.initialise().await?;
            self.evaluation = 1;
        } else {
            self.evaluation = next;
        }
        Ok(self.evaluation)
    }

    /// Roulette-wheel draw over the arenas' usability scores. Blocks on the
    /// operator while no arena is usable.
    pub async fn select_arena<R: Rng + Send + ?Sized>(
        &self,
        rng: &mut R,
    ) -> EvovibeResult<usize> {
        self.expect_phase("select_arena", &[EpisodePhase::Active])?;
        loop {
            let mut scores = Vec::with_capacity(self.arenas.len());
            let mut temperatures = Vec::with_capacity(self.arenas.len());
            for arena in &self.arenas {
                let status = arena.status(&self.settings.temperature).await?;
                scores.push(status.score);
                temperatures.push(status.temperatures);
            }
            let total: f64 = scores.iter().sum();
            if total > 0.0 {
                let draw = rng.gen::<f64>() * total;
                if let Some(picked) = roulette_select(&scores, draw) {
                    info!(arena = picked, draw, total, ?scores, "arena picked");
                    return Ok(picked);
                }
            }
            obs::emit_no_usable_arena(&format!("{temperatures:?}"));
            self.operator
                .confirm(&format!(
                    "No arena is within the temperature band: {temperatures:?}."
                ))
                .await?;
        }
    }

    /// Before each candidate: spread the bees, swap them, or go ahead.
    pub async fn prepare_candidate(&mut self, candidate: &Candidate) -> EvovibeResult<CandidateStart> {
        self.ensure_started().await?;
        while self.evaluation < self.settings.evaluations_per_episode {
            let answer = self
                .operator
                .prompt(&format!(
                    "Press ENTER to evaluate candidate {candidate}, enter an integer x to \
                     spread bees for x seconds, or 'replace' to swap the bees"
                ))
                .await?;
            let answer = answer.trim();
            if answer.is_empty() {
                break;
            }
            if let Ok(seconds) = answer.parse::<u32>() {
                self.operator
                    .notify(&format!("Spreading bees for {seconds} seconds..."))
                    .await;
                self.spread_all(f64::from(seconds)).await?;
                continue;
            }
            if answer == "replace" {
                self.replace_subjects().await?;
                return Ok(CandidateStart::Replaced);
            }
            self.operator
                .notify(&format!("Invalid option: {answer}"))
                .await;
        }
        Ok(CandidateStart::Proceed)
    }

    /// Finish this episode early and start the next one with an empty counter.
    pub async fn replace_subjects(&mut self) -> EvovibeResult<()> {
        self.expect_phase("replace_subjects", &[EpisodePhase::Active])?;
        self.finish(false).await?;
        self.index += 1;
        self.initialise().await?;
        self.evaluation = 0;
        Ok(())
    }

    pub async fn spread_all(&self, seconds: f64) -> EvovibeResult<()> {
        let results = join_all(self.arenas.iter().map(|a| a.spread(seconds))).await;
        results.into_iter().collect::<EvovibeResult<Vec<()>>>()?;
        Ok(())
    }

    /// Have the operator remove the bees; unless `terminal`, also reset the arenas.
    pub async fn finish(&mut self, terminal: bool) -> EvovibeResult<()> {
        if self.phase == EpisodePhase::Created {
            self.phase = EpisodePhase::Terminated;
            return Ok(());
        }
        self.expect_phase("finish", &[EpisodePhase::Active])?;
        self.phase = EpisodePhase::Finishing;
        self.operator.notify("Remove the bees from the arena(s)!").await;
        if !terminal {
            self.operator.notify("Change the wax!").await;
            self.operator.notify("Rearrange the arena(s)!").await;
        }
        self.operator.confirm("When done,").await?;
        if terminal {
            self.phase = EpisodePhase::Terminated;
        } else {
            self.standby_arenas().await?;
        }
        obs::emit_episode_finished(self.index, self.evaluation, terminal);
        Ok(())
    }

    async fn standby_arenas(&self) -> EvovibeResult<()> {
        let replies = join_all(
            self.arenas
                .iter()
                .flat_map(|a| a.members())
                .map(|m| m.device.acknowledge(&Command::Standby)),
        )
        .await;
        for reply in replies {
            reply?;
        }
        Ok(())
    }

    /// Return every configured worker to baseline without ending its session.
    pub async fn standby_workers(&self) -> EvovibeResult<()> {
        self.registry.broadcast(&Command::Standby).await
    }

    /// Tell every configured worker to stop.
    pub async fn terminate_workers(&self) -> EvovibeResult<()> {
        self.registry.broadcast(&Command::Terminate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{simulated_device, ScriptedOperator, SimulatedDevice};
    use evovibe_link::ChromosomeKind;
    use evovibe_media::fakes::{FakeCamera, FakeExtractor, FakePainter, ScriptedComparator};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn settings(quota: u32) -> EpisodeSettings {
        EpisodeSettings {
            evaluations_per_episode: quota,
            subjects_per_arena: 4,
            arena: ArenaKind::Circular,
            image_size: ImageSize::new(600, 400),
            worker_params: WorkerParams {
                stimulus_secs: 1.0,
                no_stimulus_secs: 0.0,
                repetitions: 0,
                spread_secs: 0.0,
                frame_rate: 4,
                chromosome: ChromosomeKind::SinglePulseGenePause,
            },
            temperature: TemperaturePolicy::default(),
        }
    }

    fn media() -> MediaToolkit {
        MediaToolkit {
            camera: Arc::new(FakeCamera::new()),
            frames: Arc::new(FakeExtractor),
            comparator: Arc::new(ScriptedComparator::constant(0)),
            painter: Arc::new(FakePainter),
        }
    }

    fn circular_operator() -> ScriptedOperator {
        ScriptedOperator::new()
            .answer("Number of center CASU?", "1")
            .answer("Horizontal coordinate", "300")
            .answer("Vertical coordinate", "200")
            .answer("Radius", "100")
            .answer("regions of interest ok", "y")
            .answer("another arena", "n")
            .otherwise("")
    }

    fn manager(
        quota: u32,
        operator: ScriptedOperator,
        dir: &Path,
        devices: &[SimulatedDevice],
    ) -> EpisodeManager {
        EpisodeManager::new(
            settings(quota),
            dir,
            1,
            DeviceRegistry::new(devices.iter().map(|d| d.handle.clone())),
            Arc::new(operator),
            media(),
        )
    }

    #[tokio::test]
    async fn first_increment_sets_up_the_episode() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0)];
        let mut episodes = manager(5, circular_operator(), dir.path(), &devices);
        assert_eq!(episodes.phase(), EpisodePhase::Created);

        assert_eq!(episodes.increment_evaluation_counter().await.unwrap(), 1);
        assert_eq!(episodes.phase(), EpisodePhase::Active);
        assert_eq!(episodes.arenas().len(), 1);
        assert!(dir.path().join("001/arena-1/properties.toml").exists());
        assert!(dir.path().join("001").join(BACKGROUND_FILE).exists());
    }

    #[tokio::test]
    async fn quota_rolls_over_into_slot_one() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0)];
        let mut episodes = manager(3, circular_operator(), dir.path(), &devices);
        assert_eq!(episodes.increment_evaluation_counter().await.unwrap(), 1);
        assert_eq!(episodes.increment_evaluation_counter().await.unwrap(), 2);
        assert_eq!(episodes.index(), 1);

        assert_eq!(episodes.increment_evaluation_counter().await.unwrap(), 1);
        assert_eq!(episodes.index(), 2);
        assert_eq!(episodes.phase(), EpisodePhase::Active);
        assert!(dir.path().join("002/arena-1/properties.toml").exists());
    }

    #[tokio::test]
    async fn rejected_arena_releases_its_device() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0)];
        let operator = ScriptedOperator::new()
            .answer("Number of center CASU?", "1")
            .answer("Horizontal coordinate", "300")
            .answer("Vertical coordinate", "200")
            .answer("Radius", "100")
            .script(["n", "y"])
            .otherwise("");
        let mut episodes = manager(5, operator.clone(), dir.path(), &devices);
        episodes.ensure_started().await.unwrap();
        let asked = operator
            .prompts()
            .iter()
            .filter(|p| p.contains("Number of center CASU?"))
            .count();
        assert_eq!(asked, 2);
        assert_eq!(episodes.arenas().len(), 1);
        assert!(episodes.registry().devices()[0].in_use());
    }

    #[tokio::test]
    async fn unknown_casu_is_asked_again() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0), simulated_device(3, 28.0)];
        let operator = ScriptedOperator::new()
            .answer("Horizontal coordinate", "300")
            .answer("Vertical coordinate", "200")
            .answer("Radius", "100")
            .answer("regions of interest ok", "y")
            .answer("another arena", "n")
            .script(["2", "3"])
            .otherwise("");
        let mut episodes = manager(5, operator.clone(), dir.path(), &devices);
        episodes.ensure_started().await.unwrap();
        assert_eq!(episodes.arenas()[0].device_ids(), vec![3]);
        assert!(operator
            .transcript()
            .contains(&"! CASU #2 is not available.".to_string()));
    }

    #[tokio::test]
    async fn selection_blocks_on_the_operator_while_too_hot() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 35.0)];
        let reading = devices[0].casu.reading_handle();
        let operator = ScriptedOperator::new()
            .answer("Number of center CASU?", "1")
            .answer("Horizontal coordinate", "300")
            .answer("Vertical coordinate", "200")
            .answer("Radius", "100")
            .answer("regions of interest ok", "y")
            .answer("Place", "");
        let mut episodes = manager(5, operator.clone(), dir.path(), &devices);
        episodes.ensure_started().await.unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let err = episodes.select_arena(&mut rng).await.unwrap_err();
        assert!(matches!(err, EvovibeError::OperatorClosed));
        assert!(operator
            .prompts()
            .last()
            .is_some_and(|p| p.contains("temperature band")));

        *reading.lock().unwrap() = 28.0;
        assert_eq!(episodes.select_arena(&mut rng).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_starts_over_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0)];
        let operator = circular_operator().answer("Press ENTER to evaluate", "replace");
        let mut episodes = manager(5, operator, dir.path(), &devices);
        episodes.increment_evaluation_counter().await.unwrap();
        let start = episodes
            .prepare_candidate(&Candidate::new(vec![300.0]))
            .await
            .unwrap();
        assert_eq!(start, CandidateStart::Replaced);
        assert_eq!(episodes.index(), 2);
        assert_eq!(episodes.evaluation(), 0);
    }

    #[tokio::test]
    async fn terminal_finish_skips_the_reset() {
        let dir = tempfile::tempdir().unwrap();
        let devices = [simulated_device(1, 28.0)];
        let operator = circular_operator();
        let mut episodes = manager(5, operator.clone(), dir.path(), &devices);
        episodes.ensure_started().await.unwrap();
        episodes.finish(true).await.unwrap();
        assert_eq!(episodes.phase(), EpisodePhase::Terminated);
        let transcript = operator.transcript();
        assert!(transcript.contains(&"! Remove the bees from the arena(s)!".to_string()));
        assert!(!transcript.contains(&"! Change the wax!".to_string()));
        assert!(episodes.increment_evaluation_counter().await.is_err());
    }
}
