//! Strictly alternating request/response channels.
//!
//! - [`Channel`]: master side, one per device
//! - [`CommandStream`]: worker side, yields commands and sends replies
//!
//! Both ends refuse to pipeline: a second `send` before `recv`, or a
//! reply without a pending command, is an [`LinkError::OutOfSequence`].

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::error::{LinkError, LinkResult};
use crate::framing::JsonLines;
use crate::message::{Command, Reply};

/// Master-side handle to one device worker.
#[async_trait]
pub trait Channel: Send {
    /// Address of the worker this channel talks to.
    fn endpoint(&self) -> &str;

    /// Send one command. Fails if a reply is still outstanding.
    async fn send(&mut self, command: &Command) -> LinkResult<()>;

    /// Wait for the reply to the last command sent.
    async fn recv(&mut self) -> LinkResult<Reply>;

    /// `send` followed by `recv`.
    async fn request(&mut self, command: &Command) -> LinkResult<Reply> {
        self.send(command).await?;
        self.recv().await
    }
}

// ============================================================================
// StreamChannel
// ============================================================================

/// [`Channel`] over any async byte stream.
pub struct StreamChannel<R, W> {
    endpoint: String,
    frames: JsonLines<R, W>,
    pending: bool,
}

/// Channel over a TCP connection.
pub type TcpChannel = StreamChannel<OwnedReadHalf, OwnedWriteHalf>;

impl<R, W> StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(endpoint: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            endpoint: endpoint.into(),
            frames: JsonLines::new(reader, writer),
            pending: false,
        }
    }
}

impl TcpChannel {
    /// Connect to a worker listening on `endpoint` (`host:port`).
    #[instrument]
    pub async fn connect(endpoint: &str) -> LinkResult<Self> {
        let stream = TcpStream::connect(endpoint)
            .await
            .map_err(|source| LinkError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        debug!(endpoint, "connected to worker");
        Ok(Self::new(endpoint, reader, writer))
    }
}

#[async_trait]
impl<R, W> Channel for StreamChannel<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&mut self, command: &Command) -> LinkResult<()> {
        if self.pending {
            return Err(LinkError::OutOfSequence("send while a reply is outstanding"));
        }
        self.frames.write_frame(command).await?;
        self.pending = true;
        debug!(endpoint = %self.endpoint, command = command.name(), "command sent");
        Ok(())
    }

    async fn recv(&mut self) -> LinkResult<Reply> {
        if !self.pending {
            return Err(LinkError::OutOfSequence("recv without a command in flight"));
        }
        self.pending = false;
        match self.frames.read_frame::<Reply>().await? {
            Some(reply) => {
                debug!(endpoint = %self.endpoint, reply = reply.name(), "reply received");
                Ok(reply)
            }
            None => Err(LinkError::Closed {
                endpoint: self.endpoint.clone(),
            }),
        }
    }
}

// ============================================================================
// CommandStream
// ============================================================================

/// Worker side of a channel.
pub struct CommandStream<R, W> {
    frames: JsonLines<R, W>,
    awaiting_reply: bool,
}

impl<R, W> CommandStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            frames: JsonLines::new(reader, writer),
            awaiting_reply: false,
        }
    }

    /// Next command from the master, or `None` once the master disconnects.
    pub async fn next_command(&mut self) -> LinkResult<Option<Command>> {
        if self.awaiting_reply {
            return Err(LinkError::OutOfSequence("previous command was not answered"));
        }
        let command = self.frames.read_frame::<Command>().await?;
        self.awaiting_reply = command.is_some();
        Ok(command)
    }

    /// Answer the command returned by the last `next_command`.
    pub async fn reply(&mut self, reply: &Reply) -> LinkResult<()> {
        if !self.awaiting_reply {
            return Err(LinkError::OutOfSequence("reply without a command"));
        }
        self.frames.write_frame(reply).await?;
        self.awaiting_reply = false;
        Ok(())
    }
}

impl CommandStream<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_tcp(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::loopback;

    #[tokio::test]
    async fn request_is_answered() {
        let (mut channel, mut worker) = loopback("casu-001");

        let server = tokio::spawn(async move {
            let cmd = worker.next_command().await.unwrap().unwrap();
            assert_eq!(cmd, Command::Status);
            worker
                .reply(&Reply::Temperature { celsius: 28.0 })
                .await
                .unwrap();
        });

        let reply = channel.request(&Command::Status).await.unwrap();
        assert_eq!(reply, Reply::Temperature { celsius: 28.0 });
        assert_eq!(channel.endpoint(), "casu-001");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn second_send_without_recv_is_rejected() {
        let (mut channel, _worker) = loopback("casu-002");
        channel.send(&Command::Standby).await.unwrap();
        let err = channel.send(&Command::Standby).await.unwrap_err();
        assert!(matches!(err, LinkError::OutOfSequence(_)));
    }

    #[tokio::test]
    async fn recv_without_send_is_rejected() {
        let (mut channel, _worker) = loopback("casu-003");
        let err = channel.recv().await.unwrap_err();
        assert!(matches!(err, LinkError::OutOfSequence(_)));
    }

    #[tokio::test]
    async fn worker_hangup_is_closed() {
        let (mut channel, worker) = loopback("casu-004");
        drop(worker);
        let result = channel.request(&Command::Status).await;
        assert!(matches!(
            result,
            Err(LinkError::Closed { .. }) | Err(LinkError::Io(_))
        ));
    }

    #[tokio::test]
    async fn worker_cannot_reply_twice() {
        let (mut channel, mut worker) = loopback("casu-005");
        channel.send(&Command::Standby).await.unwrap();
        worker.next_command().await.unwrap();
        worker.reply(&Reply::Ok).await.unwrap();
        let err = worker.reply(&Reply::Ok).await.unwrap_err();
        assert!(matches!(err, LinkError::OutOfSequence(_)));
    }
}
