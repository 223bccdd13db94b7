//! Newline-delimited JSON framing over any async byte stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::{LinkError, LinkResult};

/// One JSON document per line.
pub struct JsonLines<R, W> {
    reader: BufReader<R>,
    writer: W,
    line: String,
}

impl<R, W> JsonLines<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            line: String::new(),
        }
    }

    /// Serialize `value` as a single line and flush it.
    pub async fn write_frame<T: Serialize + Sync>(&mut self, value: &T) -> LinkResult<()> {
        let mut frame = serde_json::to_string(value)?;
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read the next frame. `Ok(None)` means the peer closed the stream.
    pub async fn read_frame<T: DeserializeOwned>(&mut self) -> LinkResult<Option<T>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).await?;
            if n == 0 {
                return Ok(None);
            }
            let frame = self.line.trim();
            if frame.is_empty() {
                continue;
            }
            return serde_json::from_str(frame)
                .map(Some)
                .map_err(|source| LinkError::Malformed {
                    frame: frame.to_string(),
                    source,
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Command, Reply};

    #[tokio::test]
    async fn frames_cross_a_duplex_stream() {
        let (a, b) = tokio::io::duplex(1024);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        let mut left = JsonLines::new(ar, aw);
        let mut right = JsonLines::new(br, bw);

        left.write_frame(&Command::Spread { seconds: 2.0 }).await.unwrap();
        let got: Option<Command> = right.read_frame().await.unwrap();
        assert_eq!(got, Some(Command::Spread { seconds: 2.0 }));

        right.write_frame(&Reply::Ok).await.unwrap();
        let got: Option<Reply> = left.read_frame().await.unwrap();
        assert_eq!(got, Some(Reply::Ok));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let (a, b) = tokio::io::duplex(1024);
        let (ar, aw) = tokio::io::split(a);
        let (_br, mut bw) = tokio::io::split(b);
        let mut left = JsonLines::new(ar, aw);

        bw.write_all(b"not json\n").await.unwrap();
        let err = left.read_frame::<Reply>().await.unwrap_err();
        assert!(matches!(err, LinkError::Malformed { .. }));
    }

    #[tokio::test]
    async fn closed_stream_reads_none() {
        let (a, b) = tokio::io::duplex(1024);
        let (ar, aw) = tokio::io::split(a);
        drop(b);
        let mut left = JsonLines::new(ar, aw);
        assert!(left.read_frame::<Reply>().await.unwrap().is_none());
    }
}
