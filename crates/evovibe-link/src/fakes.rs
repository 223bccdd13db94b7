//! In-memory channels (testing only)
//!
//! - [`loopback`]: a real framed channel over `tokio::io::duplex`
//! - [`ScriptedChannel`]: canned replies, records every command sent

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

use crate::channel::{Channel, CommandStream, StreamChannel};
use crate::error::{LinkError, LinkResult};
use crate::message::{Command, Reply};

/// Master end of a loopback pair.
pub type LoopbackChannel = StreamChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Worker end of a loopback pair.
pub type LoopbackStream = CommandStream<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Connected master/worker pair with no socket underneath.
pub fn loopback(endpoint: &str) -> (LoopbackChannel, LoopbackStream) {
    let (master, worker) = tokio::io::duplex(64 * 1024);
    let (mr, mw) = tokio::io::split(master);
    let (wr, ww) = tokio::io::split(worker);
    (
        StreamChannel::new(endpoint, mr, mw),
        CommandStream::new(wr, ww),
    )
}

/// Channel that answers from a queue of replies.
///
/// Once the queue is empty every `recv` fails with [`LinkError::Closed`],
/// which is how tests simulate a vanished worker.
#[derive(Debug, Clone)]
pub struct ScriptedChannel {
    endpoint: String,
    replies: Arc<Mutex<VecDeque<Reply>>>,
    sent: Arc<Mutex<Vec<Command>>>,
    pending: bool,
}

impl ScriptedChannel {
    pub fn new(endpoint: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            sent: Arc::new(Mutex::new(Vec::new())),
            pending: false,
        }
    }

    /// Shared view of every command sent so far.
    pub fn sent_log(&self) -> Arc<Mutex<Vec<Command>>> {
        Arc::clone(&self.sent)
    }

    /// Queue more replies, e.g. after a clone was moved into an arena.
    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&mut self, command: &Command) -> LinkResult<()> {
        if self.pending {
            return Err(LinkError::OutOfSequence("send while a reply is outstanding"));
        }
        self.sent.lock().unwrap().push(command.clone());
        self.pending = true;
        Ok(())
    }

    async fn recv(&mut self) -> LinkResult<Reply> {
        if !self.pending {
            return Err(LinkError::OutOfSequence("recv without a command in flight"));
        }
        self.pending = false;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LinkError::Closed {
                endpoint: self.endpoint.clone(),
            })
    }
}
