//! Run folders and the top-level drivers behind `new-run` and `continue-run`.
//!
//! ```text
//! run-NNN/
//!   experiment.toml   config the run was started with
//!   config.digest     SHA-256 of that config
//!   seed              base seed of every random stream
//!   population.csv evaluation.csv partial.csv fitness.csv
//!   logs/
//!   episodes/NNN/     one folder per episode
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use evovibe_link::Candidate;
use evovibe_media::MediaToolkit;
use evovibe_state::{CsvExperimentLog, ExperimentLog};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::fs;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::ExperimentConfig;
use crate::device::DeviceRegistry;
use crate::episode::{EpisodeManager, EpisodeSettings};
use crate::error::{EvovibeError, EvovibeResult, ResumeError};
use crate::evolution::{
    ChromosomeBounder, ChromosomeGenerator, EvolutionSettings, EvolutionaryComputation,
    FitnessLogObserver, Individual, MutationVariator,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::operator::Operator;
use crate::pipeline::{EvaluationPipeline, PipelineSettings};
use crate::resume::{
    ResumeEvaluator, ResumeObserver, ResumePhase, ResumeSettings, ResumeState, ResumeVariator,
    VariatorPhase,
};

pub const EXPERIMENT_COPY: &str = "experiment.toml";
pub const DIGEST_FILE: &str = "config.digest";
pub const SEED_FILE: &str = "seed";
pub const LOGS_DIR: &str = "logs";
pub const EPISODES_DIR: &str = "episodes";

const ENGINE_STREAM: u64 = 0;
const PIPELINE_STREAM: u64 = 1;

/// Random stream `stream` for a process whose engine starts at `generation`.
pub fn derive_rng(seed: u64, generation: u32, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ (u64::from(generation) << 32) ^ stream)
}

/// One `run-NNN` directory.
#[derive(Debug, Clone)]
pub struct RunFolder {
    number: u32,
    dir: PathBuf,
}

impl RunFolder {
    pub fn path_for(root: &Path, number: u32) -> PathBuf {
        root.join(format!("run-{number:03}"))
    }

    /// First free `run-NNN` under `root`; `debug` always reuses `run-001`, wiping it.
    pub async fn create(root: &Path, debug: bool) -> EvovibeResult<Self> {
        let mut number = 1;
        if debug {
            let dir = Self::path_for(root, number);
            if exists(&dir).await? {
                warn!(dir = %dir.display(), "debug run: removing previous contents");
                fs::remove_dir_all(&dir)
                    .await
                    .map_err(|e| EvovibeError::io(&dir, e))?;
            }
        } else {
            while exists(&Self::path_for(root, number)).await? {
                number += 1;
            }
        }
        let folder = Self {
            number,
            dir: Self::path_for(root, number),
        };
        for dir in [folder.logs_dir(), folder.episodes_dir()] {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| EvovibeError::io(&dir, e))?;
        }
        info!(run = %folder.name(), "run folder created");
        Ok(folder)
    }

    pub async fn open(root: &Path, number: u32) -> EvovibeResult<Self> {
        let dir = Self::path_for(root, number);
        if !exists(&dir).await? {
            return Err(EvovibeError::NoSuchRun(number));
        }
        let folder = Self { number, dir };
        fs::create_dir_all(folder.episodes_dir())
            .await
            .map_err(|e| EvovibeError::io(folder.episodes_dir(), e))?;
        Ok(folder)
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> String {
        format!("run-{:03}", self.number)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join(LOGS_DIR)
    }

    pub fn episodes_dir(&self) -> PathBuf {
        self.dir.join(EPISODES_DIR)
    }

    /// Store the config, its digest and the base seed.
    pub async fn record_config(&self, config: &ExperimentConfig, seed: u64) -> EvovibeResult<()> {
        self.write(EXPERIMENT_COPY, toml::to_string_pretty(config)?)
            .await?;
        self.write(DIGEST_FILE, config.digest()).await?;
        self.write(SEED_FILE, seed.to_string()).await
    }

    pub async fn verify_digest(&self, config: &ExperimentConfig) -> EvovibeResult<()> {
        let expected = self.read(DIGEST_FILE).await?;
        let actual = config.digest();
        if expected.trim() != actual {
            return Err(ResumeError::ConfigDigest {
                expected: expected.trim().to_string(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    pub async fn seed(&self) -> EvovibeResult<u64> {
        let raw = self.read(SEED_FILE).await?;
        raw.trim().parse().map_err(|_| EvovibeError::RunFolder {
            path: self.dir.join(SEED_FILE),
            reason: format!("not a seed: {:?}", raw.trim()),
        })
    }

    async fn write(&self, file: &str, contents: String) -> EvovibeResult<()> {
        let path = self.dir.join(file);
        fs::write(&path, contents)
            .await
            .map_err(|e| EvovibeError::io(&path, e))
    }

    async fn read(&self, file: &str) -> EvovibeResult<String> {
        let path = self.dir.join(file);
        fs::read_to_string(&path)
            .await
            .map_err(|e| EvovibeError::io(&path, e))
    }
}

async fn exists(path: &Path) -> EvovibeResult<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| EvovibeError::io(path, e))
}

/// Everything a run needs besides its folder.
pub struct Experiment {
    pub config: ExperimentConfig,
    pub registry: DeviceRegistry,
    pub operator: Arc<dyn Operator>,
    pub media: MediaToolkit,
}

/// Start a new run under `root` and evolve it to the end.
pub async fn new_run(
    root: &Path,
    debug: bool,
    experiment: Experiment,
) -> EvovibeResult<(RunFolder, Vec<Individual>)> {
    let folder = RunFolder::create(root, debug).await?;
    let seed = experiment.config.search.seed.unwrap_or_else(rand::random);
    folder.record_config(&experiment.config, seed).await?;
    let log = Arc::new(CsvExperimentLog::create(folder.dir()).await?);
    let span = obs::run_span(&folder.name(), &Uuid::new_v4().to_string());
    let population = drive(&folder, experiment, log, seed, None)
        .instrument(span)
        .await?;
    Ok((folder, population))
}

/// Continue run `number` under `root` from whatever its logs hold.
pub async fn continue_run(
    root: &Path,
    number: u32,
    experiment: Experiment,
) -> EvovibeResult<(RunFolder, Vec<Individual>)> {
    let folder = RunFolder::open(root, number).await?;
    folder.verify_digest(&experiment.config).await?;
    let seed = folder.seed().await?;
    let log = Arc::new(CsvExperimentLog::open(folder.dir()).await?);
    let settings = ResumeSettings {
        population_size: experiment.config.search.population_size,
        evaluations_per_candidate: experiment.config.search.evaluations_per_candidate,
    };
    let state = ResumeState::load(log.as_ref(), settings).await?;
    if state.is_none() {
        info!(run = %folder.name(), "no population logged yet, starting from scratch");
    }
    let span = obs::run_span(&folder.name(), &Uuid::new_v4().to_string());
    let population = drive(&folder, experiment, log, seed, state)
        .instrument(span)
        .await?;
    Ok((folder, population))
}

/// Build the pipeline and the wrapped engine hooks, then evolve.
pub async fn drive(
    folder: &RunFolder,
    experiment: Experiment,
    log: Arc<dyn ExperimentLog>,
    seed: u64,
    state: Option<ResumeState>,
) -> EvovibeResult<Vec<Individual>> {
    let Experiment {
        config,
        registry,
        operator,
        media,
    } = experiment;
    let search = &config.search;
    let start = state.as_ref().map_or(0, |s| s.start_generation);

    let episodes = EpisodeManager::new(
        EpisodeSettings::from(&config),
        folder.episodes_dir(),
        state.as_ref().map_or(1, |s| s.next_episode),
        registry,
        operator,
        media.clone(),
    );
    let pipeline = EvaluationPipeline::new(
        PipelineSettings::from(&config),
        episodes,
        log.clone(),
        media,
        derive_rng(seed, start, PIPELINE_STREAM),
    );
    let generator = ChromosomeGenerator {
        kind: search.chromosome,
    };
    let bounder = ChromosomeBounder::new(search.chromosome);
    let variator = MutationVariator::new(search.chromosome);
    let observer = FitnessLogObserver::new(log);

    let (mut evaluator, mut variator, mut observer, seeds, max_generations) = match state {
        None => (
            ResumeEvaluator::new(pipeline, ResumePhase::Live),
            ResumeVariator::new(variator, VariatorPhase::Live),
            ResumeObserver::new(observer, 0, 0),
            Vec::<Candidate>::new(),
            search.number_generations,
        ),
        Some(state) => (
            ResumeEvaluator::new(
                pipeline
                    .starting_at(state.pipeline_generation)
                    .with_pending(state.pending.clone()),
                state.evaluator_phase(),
            ),
            ResumeVariator::replaying(variator, state.offspring_candidates()),
            ResumeObserver::new(observer, state.persisted_summaries, state.start_generation),
            state.seeds(),
            state.remaining_generations(search.number_generations),
        ),
    };
    let mut engine = EvolutionaryComputation::new(
        derive_rng(seed, start, ENGINE_STREAM),
        EvolutionSettings {
            population_size: search.population_size,
            max_generations,
            num_elites: usize::from(search.elitism),
        },
    );
    info!(start, max_generations, seed, "evolving");

    let outcome = engine
        .evolve(
            &generator,
            &bounder,
            &mut evaluator,
            &mut variator,
            &mut observer,
            seeds,
        )
        .await;
    let pipeline = evaluator.inner_mut();
    let result = match outcome {
        Ok(population) => pipeline.shutdown().await.map(|()| population),
        Err(EvovibeError::StoppedByOperator) => {
            info!(run = %folder.name(), "run stopped; resume it with continue-run");
            pipeline
                .standby()
                .await
                .and(Err(EvovibeError::StoppedByOperator))
        }
        Err(err) => Err(err),
    };
    METRICS.flush();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;

    #[tokio::test]
    async fn new_folders_take_the_first_free_number() {
        let root = tempfile::tempdir().unwrap();
        let first = RunFolder::create(root.path(), false).await.unwrap();
        let second = RunFolder::create(root.path(), false).await.unwrap();
        assert_eq!(first.name(), "run-001");
        assert_eq!(second.name(), "run-002");
        assert!(second.episodes_dir().is_dir());
        assert!(second.logs_dir().is_dir());
    }

    #[tokio::test]
    async fn debug_reuses_the_first_folder() {
        let root = tempfile::tempdir().unwrap();
        let first = RunFolder::create(root.path(), false).await.unwrap();
        std::fs::write(first.dir().join("population.csv"), "old").unwrap();
        let again = RunFolder::create(root.path(), true).await.unwrap();
        assert_eq!(again.number(), 1);
        assert!(!again.dir().join("population.csv").exists());
    }

    #[tokio::test]
    async fn config_digest_and_seed_are_kept() {
        let root = tempfile::tempdir().unwrap();
        let folder = RunFolder::create(root.path(), false).await.unwrap();
        let config = sample();
        folder.record_config(&config, 42).await.unwrap();

        let reopened = RunFolder::open(root.path(), 1).await.unwrap();
        reopened.verify_digest(&config).await.unwrap();
        assert_eq!(reopened.seed().await.unwrap(), 42);
        assert!(reopened.dir().join(EXPERIMENT_COPY).exists());

        let mut changed = config.clone();
        changed.search.population_size += 1;
        let err = reopened.verify_digest(&changed).await.unwrap_err();
        assert!(matches!(
            err,
            EvovibeError::Resume(ResumeError::ConfigDigest { .. })
        ));
    }

    #[tokio::test]
    async fn missing_run_is_reported() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunFolder::open(root.path(), 7).await,
            Err(EvovibeError::NoSuchRun(7))
        ));
    }

    #[test]
    fn random_streams_differ_per_generation_and_purpose() {
        use rand::Rng;
        let a: u64 = derive_rng(5, 0, ENGINE_STREAM).gen();
        let b: u64 = derive_rng(5, 0, PIPELINE_STREAM).gen();
        let c: u64 = derive_rng(5, 1, ENGINE_STREAM).gen();
        let again: u64 = derive_rng(5, 0, ENGINE_STREAM).gen();
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
