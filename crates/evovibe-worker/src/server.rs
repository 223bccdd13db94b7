//! Serving a worker over a command stream.

use evovibe_link::{CommandStream, LinkError, Reply};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::WorkerResult;
use crate::hardware::Casu;
use crate::worker::Worker;

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Master closed the stream.
    Disconnected,
    /// Master sent `Terminate`.
    Terminated,
}

/// Answer commands from one master until it disconnects or terminates us.
///
/// On a fatal worker error the master still gets a `Rejected` reply
/// before the error is returned.
pub async fn serve_session<C, R, W>(
    worker: &mut Worker<C>,
    stream: &mut CommandStream<R, W>,
) -> WorkerResult<SessionEnd>
where
    C: Casu,
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    while let Some(command) = stream.next_command().await? {
        info!(worker = %worker.name(), command = command.name(), "command received");
        match worker.handle(command).await {
            Ok(reply) => {
                stream.reply(&reply).await?;
                if worker.is_terminated() {
                    return Ok(SessionEnd::Terminated);
                }
            }
            Err(err) => {
                error!(worker = %worker.name(), error = %err, "fatal worker error");
                if let Err(release_err) = worker.release() {
                    warn!(worker = %worker.name(), error = %release_err, "release failed");
                }
                let _ = stream
                    .reply(&Reply::Rejected {
                        reason: err.to_string(),
                    })
                    .await;
                return Err(err);
            }
        }
    }
    worker.end_session()?;
    Ok(SessionEnd::Disconnected)
}

/// Accept masters one at a time until one of them sends `Terminate`.
pub async fn serve_tcp<C: Casu>(listener: TcpListener, worker: &mut Worker<C>) -> WorkerResult<()> {
    loop {
        let (socket, peer) = listener.accept().await.map_err(LinkError::Io)?;
        socket.set_nodelay(true).map_err(LinkError::Io)?;
        info!(worker = %worker.name(), %peer, "master connected");
        let mut stream = CommandStream::from_tcp(socket);
        match serve_session(worker, &mut stream).await? {
            SessionEnd::Terminated => return Ok(()),
            SessionEnd::Disconnected => {
                info!(worker = %worker.name(), %peer, "master disconnected");
            }
        }
    }
}
