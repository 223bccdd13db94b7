//! Actuator/sensor access for one CASU.
//!
//! The worker never touches hardware directly; it drives a [`Casu`].
//! [`SimulatedCasu`] records every call so tests can assert on the exact
//! actuation sequence.

use std::sync::{Arc, Mutex};

use crate::error::{WorkerError, WorkerResult};
use crate::pattern::VibrationPattern;

/// Device-local actuators and sensors.
pub trait Casu: Send {
    fn set_temperature(&mut self, celsius: f64) -> WorkerResult<()>;

    /// Current wax temperature reading.
    fn temperature(&mut self) -> WorkerResult<f64>;

    fn set_diagnostic_led(&mut self, on: bool) -> WorkerResult<()>;

    fn set_airflow(&mut self, on: bool) -> WorkerResult<()>;

    fn set_vibration(&mut self, pattern: &VibrationPattern) -> WorkerResult<()>;

    fn speaker_standby(&mut self) -> WorkerResult<()>;

    /// LED, airflow and speaker off; heater stays at its set-point.
    fn standby_all(&mut self) -> WorkerResult<()>;

    /// Release the hardware. No further calls are expected.
    fn stop(&mut self) -> WorkerResult<()>;
}

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq)]
pub enum Actuation {
    Temperature(f64),
    Led(bool),
    Airflow(bool),
    Vibration(VibrationPattern),
    SpeakerStandby,
    StandbyAll,
    Stop,
}

/// In-process stand-in for a physical CASU.
#[derive(Debug, Clone)]
pub struct SimulatedCasu {
    reading: Arc<Mutex<f64>>,
    log: Arc<Mutex<Vec<Actuation>>>,
    stopped: bool,
}

impl SimulatedCasu {
    pub fn new(reading: f64) -> Self {
        Self {
            reading: Arc::new(Mutex::new(reading)),
            log: Arc::new(Mutex::new(Vec::new())),
            stopped: false,
        }
    }

    /// Shared handle to the temperature this device reports.
    pub fn reading_handle(&self) -> Arc<Mutex<f64>> {
        Arc::clone(&self.reading)
    }

    /// Shared handle to the actuation log.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<Actuation>>> {
        Arc::clone(&self.log)
    }

    fn record(&mut self, actuation: Actuation) -> WorkerResult<()> {
        if self.stopped {
            return Err(WorkerError::Hardware("device already stopped".into()));
        }
        self.log
            .lock()
            .map_err(|_| WorkerError::Hardware("actuation log poisoned".into()))?
            .push(actuation);
        Ok(())
    }
}

impl Casu for SimulatedCasu {
    fn set_temperature(&mut self, celsius: f64) -> WorkerResult<()> {
        self.record(Actuation::Temperature(celsius))
    }

    fn temperature(&mut self) -> WorkerResult<f64> {
        self.reading
            .lock()
            .map(|t| *t)
            .map_err(|_| WorkerError::Hardware("temperature sensor poisoned".into()))
    }

    fn set_diagnostic_led(&mut self, on: bool) -> WorkerResult<()> {
        self.record(Actuation::Led(on))
    }

    fn set_airflow(&mut self, on: bool) -> WorkerResult<()> {
        self.record(Actuation::Airflow(on))
    }

    fn set_vibration(&mut self, pattern: &VibrationPattern) -> WorkerResult<()> {
        self.record(Actuation::Vibration(pattern.clone()))
    }

    fn speaker_standby(&mut self) -> WorkerResult<()> {
        self.record(Actuation::SpeakerStandby)
    }

    fn standby_all(&mut self) -> WorkerResult<()> {
        self.record(Actuation::StandbyAll)
    }

    fn stop(&mut self) -> WorkerResult<()> {
        self.record(Actuation::Stop)?;
        self.stopped = true;
        Ok(())
    }
}
