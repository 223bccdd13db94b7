//! Device worker state machine.
//!
//! `Uninitialised → Ready → (Active | Passive) → Ready → ... → Terminated`
//!
//! Every command is matched against the current state. Commands that are
//! not valid in a state get a `Rejected` reply; errors returned from
//! [`Worker::handle`] are fatal and end the session.

use chrono::{DateTime, Utc};
use evovibe_link::{Candidate, Command, Reply, WorkerParams};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::{WorkerConfig, BASELINE_TEMPERATURE};
use crate::error::WorkerResult;
use crate::hardware::Casu;
use crate::pattern::VibrationPattern;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerState {
    Uninitialised,
    Ready(WorkerConfig),
    Active(WorkerConfig),
    Passive(WorkerConfig),
    Terminated,
}

impl WorkerState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerState::Uninitialised => "uninitialised",
            WorkerState::Ready(_) => "ready",
            WorkerState::Active(_) => "active",
            WorkerState::Passive(_) => "passive",
            WorkerState::Terminated => "terminated",
        }
    }
}

fn rejected(command: &Command, state: &str) -> Reply {
    Reply::Rejected {
        reason: format!("{} not allowed while {}", command.name(), state),
    }
}

/// The only writer of one device's actuator state.
pub struct Worker<C: Casu> {
    name: String,
    casu: C,
    state: WorkerState,
}

impl<C: Casu> Worker<C> {
    pub fn new(name: impl Into<String>, casu: C) -> Self {
        Self {
            name: name.into(),
            casu,
            state: WorkerState::Uninitialised,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == WorkerState::Terminated
    }

    /// Execute one command and produce its reply.
    #[instrument(skip(self, command), fields(worker = %self.name, command = command.name(), state = self.state.name()))]
    pub async fn handle(&mut self, command: Command) -> WorkerResult<Reply> {
        // Fatal errors below leave the worker Terminated.
        let state = std::mem::replace(&mut self.state, WorkerState::Terminated);

        match (state, command) {
            (WorkerState::Terminated, command) => Ok(rejected(&command, "terminated")),

            (_, Command::Terminate) => {
                self.release()?;
                info!(worker = %self.name, "terminated");
                Ok(Reply::Ok)
            }

            (state, Command::Status) => {
                self.state = state;
                let celsius = self.casu.temperature()?;
                Ok(Reply::Temperature { celsius })
            }

            (WorkerState::Uninitialised, Command::Initialise(params)) => {
                let config = self.initialise(params)?;
                self.state = WorkerState::Ready(config);
                Ok(Reply::Ok)
            }

            (state, command @ Command::Initialise(_)) => {
                let reply = rejected(&command, state.name());
                self.state = state;
                Ok(reply)
            }

            (state @ (WorkerState::Uninitialised | WorkerState::Ready(_)), Command::Standby) => {
                self.to_baseline()?;
                self.state = state;
                Ok(Reply::Ok)
            }

            (
                state @ (WorkerState::Uninitialised | WorkerState::Ready(_)),
                Command::Spread { seconds },
            ) => {
                self.state = state;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Ok(Reply::Rejected {
                        reason: format!("spread duration must be non-negative, got {seconds}"),
                    });
                }
                self.spread(Duration::from_secs_f64(seconds)).await?;
                Ok(Reply::Ok)
            }

            (WorkerState::Ready(config), Command::SetActive(candidate)) => {
                let pattern = match VibrationPattern::decode(config.chromosome(), &candidate) {
                    Ok(pattern) => pattern,
                    Err(err) => {
                        warn!(worker = %self.name, %candidate, error = %err, "candidate rejected");
                        self.state = WorkerState::Ready(config);
                        return Ok(Reply::Rejected {
                            reason: err.to_string(),
                        });
                    }
                };
                self.state = WorkerState::Active(config.clone());
                let at = self.run_active(&config, &candidate, &pattern).await?;
                self.state = WorkerState::Ready(config);
                Ok(Reply::Started { at })
            }

            (WorkerState::Ready(config), Command::SetPassive) => {
                self.state = WorkerState::Passive(config.clone());
                self.run_passive(&config).await?;
                self.state = WorkerState::Ready(config);
                Ok(Reply::Ok)
            }

            (state @ WorkerState::Uninitialised, command) => {
                let reply = rejected(&command, state.name());
                self.state = state;
                Ok(reply)
            }

            (state @ (WorkerState::Active(_) | WorkerState::Passive(_)), command) => {
                let reply = rejected(&command, state.name());
                self.state = state;
                Ok(reply)
            }
        }
    }

    /// Master went away: return to baseline and wait for a fresh `Initialise`.
    pub fn end_session(&mut self) -> WorkerResult<()> {
        if self.is_terminated() {
            return Ok(());
        }
        self.to_baseline()?;
        self.state = WorkerState::Uninitialised;
        Ok(())
    }

    /// Switch everything off and release the device.
    pub fn release(&mut self) -> WorkerResult<()> {
        self.state = WorkerState::Terminated;
        self.casu.set_airflow(false)?;
        self.casu.standby_all()?;
        self.casu.stop()
    }

    fn initialise(&mut self, params: WorkerParams) -> WorkerResult<WorkerConfig> {
        let config = WorkerConfig::from_params(params)?;
        self.to_baseline()?;
        info!(
            worker = %self.name,
            chromosome = %config.chromosome(),
            evaluation_run_secs = config.evaluation_run().as_secs_f64(),
            "initialised"
        );
        Ok(config)
    }

    fn to_baseline(&mut self) -> WorkerResult<()> {
        self.casu.set_temperature(BASELINE_TEMPERATURE)?;
        self.casu.standby_all()
    }

    async fn blip(&mut self, config: &WorkerConfig) -> WorkerResult<()> {
        self.casu.set_diagnostic_led(true)?;
        sleep(config.blip()).await;
        self.casu.set_diagnostic_led(false)
    }

    async fn spread(&mut self, duration: Duration) -> WorkerResult<()> {
        self.casu.set_airflow(true)?;
        sleep(duration).await;
        self.casu.set_airflow(false)
    }

    async fn run_active(
        &mut self,
        config: &WorkerConfig,
        candidate: &Candidate,
        pattern: &VibrationPattern,
    ) -> WorkerResult<DateTime<Utc>> {
        self.blip(config).await?;
        let at = Utc::now();
        debug!(worker = %self.name, %candidate, "stimulus started");

        for _ in 0..config.repetitions() {
            self.casu.set_vibration(pattern)?;
            sleep(config.stimulus()).await;
            self.casu.speaker_standby()?;
            sleep(config.no_stimulus()).await;
        }
        self.casu.set_vibration(pattern)?;
        sleep(config.stimulus()).await;
        self.casu.speaker_standby()?;

        self.blip(config).await?;
        self.spread(config.spread()).await?;
        Ok(at)
    }

    async fn run_passive(&mut self, config: &WorkerConfig) -> WorkerResult<()> {
        sleep(config.blip() + config.evaluation_run()).await;
        self.blip(config).await?;
        self.spread(config.spread()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use crate::hardware::{Actuation, SimulatedCasu};
    use evovibe_link::ChromosomeKind;
    use tokio::time::Instant;

    fn params() -> WorkerParams {
        WorkerParams {
            stimulus_secs: 2.0,
            no_stimulus_secs: 1.0,
            repetitions: 2,
            spread_secs: 3.0,
            frame_rate: 4,
            chromosome: ChromosomeKind::SinglePulseGenePause,
        }
    }

    fn ready_worker() -> (Worker<SimulatedCasu>, SimulatedCasu) {
        let casu = SimulatedCasu::new(28.0);
        let worker = Worker::new("casu-001", casu.clone());
        (worker, casu)
    }

    #[tokio::test(start_paused = true)]
    async fn role_commands_need_initialise() {
        let (mut worker, _) = ready_worker();
        let reply = worker.handle(Command::SetPassive).await.unwrap();
        assert!(matches!(reply, Reply::Rejected { .. }));
        assert_eq!(worker.state(), &WorkerState::Uninitialised);
    }

    #[tokio::test(start_paused = true)]
    async fn initialise_sets_baseline() {
        let (mut worker, casu) = ready_worker();
        let reply = worker.handle(Command::Initialise(params())).await.unwrap();
        assert_eq!(reply, Reply::Ok);
        assert!(matches!(worker.state(), WorkerState::Ready(_)));
        let log = casu.log_handle();
        assert_eq!(
            *log.lock().unwrap(),
            vec![Actuation::Temperature(28.0), Actuation::StandbyAll]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_initialise_is_rejected() {
        let (mut worker, _) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        let reply = worker.handle(Command::Initialise(params())).await.unwrap();
        assert!(matches!(reply, Reply::Rejected { .. }));
        assert!(matches!(worker.state(), WorkerState::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_params_are_fatal() {
        let (mut worker, _) = ready_worker();
        let mut bad = params();
        bad.frame_rate = 0;
        let err = worker.handle(Command::Initialise(bad)).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidParams(_)));
        assert!(worker.is_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn active_and_passive_take_the_same_time() {
        let (mut active, _) = ready_worker();
        let (mut passive, _) = ready_worker();
        active.handle(Command::Initialise(params())).await.unwrap();
        passive.handle(Command::Initialise(params())).await.unwrap();

        let t0 = Instant::now();
        let reply = active
            .handle(Command::SetActive(Candidate::new(vec![500.0])))
            .await
            .unwrap();
        let active_elapsed = t0.elapsed();
        assert!(matches!(reply, Reply::Started { .. }));

        let t1 = Instant::now();
        passive.handle(Command::SetPassive).await.unwrap();
        let passive_elapsed = t1.elapsed();

        // blip 0.5 + run 2*(2+1)+2 + blip 0.5 + spread 3
        assert!(active_elapsed >= Duration::from_secs(12));
        assert!(active_elapsed < Duration::from_millis(12_100));
        let frame = Duration::from_millis(250);
        let diff = if active_elapsed > passive_elapsed {
            active_elapsed - passive_elapsed
        } else {
            passive_elapsed - active_elapsed
        };
        assert!(diff <= frame);
    }

    #[tokio::test(start_paused = true)]
    async fn active_role_actuation_sequence() {
        let (mut worker, casu) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        casu.log_handle().lock().unwrap().clear();

        worker
            .handle(Command::SetActive(Candidate::new(vec![500.0])))
            .await
            .unwrap();

        let log = casu.log_handle();
        let log = log.lock().unwrap();
        assert_eq!(log.first(), Some(&Actuation::Led(true)));
        let vibrations = log
            .iter()
            .filter(|a| matches!(a, Actuation::Vibration(_)))
            .count();
        assert_eq!(vibrations, 3);
        assert_eq!(&log[log.len() - 2..], &[Actuation::Airflow(true), Actuation::Airflow(false)]);
        assert!(matches!(worker.state(), WorkerState::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn passive_role_never_vibrates() {
        let (mut worker, casu) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        worker.handle(Command::SetPassive).await.unwrap();
        let log = casu.log_handle();
        assert!(!log
            .lock()
            .unwrap()
            .iter()
            .any(|a| matches!(a, Actuation::Vibration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn badly_encoded_candidate_is_rejected_not_fatal() {
        let (mut worker, _) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        let reply = worker
            .handle(Command::SetActive(Candidate::new(vec![1.0, 2.0])))
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Rejected { .. }));
        assert!(matches!(worker.state(), WorkerState::Ready(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_temperature_without_actuation() {
        let (mut worker, casu) = ready_worker();
        *casu.reading_handle().lock().unwrap() = 29.5;
        let reply = worker.handle(Command::Status).await.unwrap();
        assert_eq!(reply, Reply::Temperature { celsius: 29.5 });
        assert!(casu.log_handle().lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn spread_runs_airflow_for_requested_time() {
        let (mut worker, casu) = ready_worker();
        let t0 = Instant::now();
        worker
            .handle(Command::Spread { seconds: 5.0 })
            .await
            .unwrap();
        let elapsed = t0.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_millis(5_100));
        assert_eq!(
            *casu.log_handle().lock().unwrap(),
            vec![Actuation::Airflow(true), Actuation::Airflow(false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_stops_device_and_rejects_afterwards() {
        let (mut worker, casu) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        assert_eq!(worker.handle(Command::Terminate).await.unwrap(), Reply::Ok);
        assert!(worker.is_terminated());
        assert_eq!(
            casu.log_handle().lock().unwrap().last(),
            Some(&Actuation::Stop)
        );
        let reply = worker.handle(Command::Status).await.unwrap();
        assert!(matches!(reply, Reply::Rejected { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn end_session_returns_to_uninitialised() {
        let (mut worker, _) = ready_worker();
        worker.handle(Command::Initialise(params())).await.unwrap();
        worker.end_session().unwrap();
        assert_eq!(worker.state(), &WorkerState::Uninitialised);
        let reply = worker.handle(Command::Initialise(params())).await.unwrap();
        assert_eq!(reply, Reply::Ok);
    }
}
