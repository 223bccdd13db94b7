//! Splitting a trial video into numbered still frames.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{MediaError, MediaResult};
use crate::runner::{ToolCommand, ToolRunner};

/// File name of the `index`-th frame (1-based).
pub fn frame_file_name(index: usize) -> String {
    format!("frame-{index:04}.png")
}

/// Turns a video into a fixed-length sequence of stills.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Extract exactly `count` frames at `frame_rate` into `out_dir`,
    /// returned in temporal order.
    async fn extract(
        &self,
        video: &Path,
        frame_rate: u32,
        count: usize,
        out_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>>;
}

/// Frame splitter backed by `ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegExtractor;

impl FfmpegExtractor {
    pub fn split_command(
        &self,
        video: &Path,
        frame_rate: u32,
        count: usize,
        out_dir: &Path,
    ) -> ToolCommand {
        ToolCommand::new(
            "ffmpeg",
            vec![
                "ffmpeg".into(),
                "-loglevel".into(),
                "error".into(),
                "-i".into(),
                video.display().to_string(),
                "-r".into(),
                frame_rate.to_string(),
                "-frames:v".into(),
                count.to_string(),
                "-f".into(),
                "image2".into(),
                out_dir.join("frame-%04d.png").display().to_string(),
            ],
        )
        .with_timeout(600)
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        video: &Path,
        frame_rate: u32,
        count: usize,
        out_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        fs::create_dir_all(out_dir)
            .await
            .map_err(|source| MediaError::Io {
                path: out_dir.to_path_buf(),
                source,
            })?;
        ToolRunner::run_checked(&self.split_command(video, frame_rate, count, out_dir)).await?;

        let frames: Vec<PathBuf> = (1..=count)
            .map(|i| out_dir.join(frame_file_name(i)))
            .collect();
        let mut found = 0;
        for frame in &frames {
            if fs::try_exists(frame).await.unwrap_or(false) {
                found += 1;
            }
        }
        if found != count {
            return Err(MediaError::FrameCount {
                expected: count,
                found,
            });
        }
        Ok(frames)
    }
}
