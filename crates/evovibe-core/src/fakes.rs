//! In-process stand-ins for the operator and the device fleet (testing only)

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use evovibe_link::fakes::loopback;
use evovibe_worker::{serve_session, SimulatedCasu, Worker};
use tokio::task::JoinHandle;

use crate::device::DeviceHandle;
use crate::error::{EvovibeError, EvovibeResult};
use crate::operator::Operator;

#[derive(Debug, Default)]
struct Session {
    rules: Vec<(String, String)>,
    script: VecDeque<String>,
    fallback: Option<String>,
    transcript: Vec<String>,
}

/// Operator answering from standing rules, then a script, then a fallback.
///
/// A rule fires when its pattern is a substring of the question. Once
/// nothing answers, `prompt` fails with [`EvovibeError::OperatorClosed`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedOperator {
    session: Arc<Mutex<Session>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, pattern: &str, reply: &str) -> Self {
        self.session
            .lock()
            .unwrap()
            .rules
            .push((pattern.to_string(), reply.to_string()));
        self
    }

    pub fn script<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session
            .lock()
            .unwrap()
            .script
            .extend(replies.into_iter().map(Into::into));
        self
    }

    pub fn otherwise(self, reply: &str) -> Self {
        self.session.lock().unwrap().fallback = Some(reply.to_string());
        self
    }

    /// Append one more scripted reply.
    pub fn push(&self, reply: &str) {
        self.session
            .lock()
            .unwrap()
            .script
            .push_back(reply.to_string());
    }

    /// Questions asked so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.transcript()
            .into_iter()
            .filter_map(|line| line.strip_prefix("? ").map(str::to_string))
            .collect()
    }

    /// Questions (`? `) and messages (`! `) in the order they happened.
    pub fn transcript(&self) -> Vec<String> {
        self.session.lock().unwrap().transcript.clone()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn prompt(&self, question: &str) -> EvovibeResult<String> {
        let mut session = self.session.lock().unwrap();
        session.transcript.push(format!("? {question}"));
        let ruled = session
            .rules
            .iter()
            .find(|(pattern, _)| question.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());
        if let Some(reply) = ruled {
            return Ok(reply);
        }
        if let Some(reply) = session.script.pop_front() {
            return Ok(reply);
        }
        session.fallback.clone().ok_or(EvovibeError::OperatorClosed)
    }

    async fn notify(&self, message: &str) {
        self.session
            .lock()
            .unwrap()
            .transcript
            .push(format!("! {message}"));
    }

    async fn show_image(&self, path: &Path) {
        self.notify(&format!("image {}", path.display())).await;
    }
}

/// A simulated device served by a real [`Worker`] over an in-memory channel.
pub struct SimulatedDevice {
    pub handle: DeviceHandle,
    pub casu: SimulatedCasu,
    pub session: JoinHandle<()>,
}

/// Spawn a worker for CASU `id` reporting `temperature`, and return the master-side handle.
pub fn simulated_device(id: u32, temperature: f64) -> SimulatedDevice {
    let endpoint = format!("sim://casu-{id:03}");
    let (channel, mut stream) = loopback(&endpoint);
    let casu = SimulatedCasu::new(temperature);
    let mut worker = Worker::new(format!("casu-{id:03}"), casu.clone());
    let session = tokio::spawn(async move {
        let _ = serve_session(&mut worker, &mut stream).await;
    });
    SimulatedDevice {
        handle: DeviceHandle::new(id, Box::new(channel)),
        casu,
        session,
    }
}
