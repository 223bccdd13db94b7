//! Video and still capture through gstreamer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::MediaResult;
use crate::geometry::ImageSize;
use crate::runner::{ToolCommand, ToolRunner};

/// What to record for one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    pub duration_secs: f64,
    pub size: ImageSize,
    pub frame_rate: u32,
}

impl CaptureRequest {
    /// Number of camera buffers covering the duration.
    pub fn buffers(&self) -> u64 {
        (self.duration_secs * f64::from(self.frame_rate)).ceil().max(0.0) as u64
    }
}

/// Source of trial videos and background stills.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Record a video; returns once the recording is complete.
    async fn record(&self, request: &CaptureRequest, output: &Path) -> MediaResult<()>;

    /// Take one still image.
    async fn snapshot(&self, size: ImageSize, output: &Path) -> MediaResult<()>;
}

/// Camera driven by `gst-launch-1.0` on a V4L2 device.
#[derive(Debug, Clone)]
pub struct GstCamera {
    pub device: PathBuf,
}

impl Default for GstCamera {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
        }
    }
}

impl GstCamera {
    pub fn record_command(&self, request: &CaptureRequest, output: &Path) -> ToolCommand {
        ToolCommand::new(
            "gst-launch",
            vec![
                "gst-launch-1.0".into(),
                "-e".into(),
                "v4l2src".into(),
                format!("device={}", self.device.display()),
                format!("num-buffers={}", request.buffers()),
                "!".into(),
                format!(
                    "video/x-raw,width={},height={},framerate={}/1",
                    request.size.width, request.size.height, request.frame_rate
                ),
                "!".into(),
                "jpegenc".into(),
                "!".into(),
                "avimux".into(),
                "!".into(),
                "filesink".into(),
                format!("location={}", output.display()),
            ],
        )
    }

    pub fn snapshot_command(&self, size: ImageSize, output: &Path) -> ToolCommand {
        ToolCommand::new(
            "gst-snapshot",
            vec![
                "gst-launch-1.0".into(),
                "-e".into(),
                "v4l2src".into(),
                format!("device={}", self.device.display()),
                "num-buffers=1".into(),
                "!".into(),
                format!("video/x-raw,width={},height={}", size.width, size.height),
                "!".into(),
                "videoconvert".into(),
                "!".into(),
                "pngenc".into(),
                "!".into(),
                "filesink".into(),
                format!("location={}", output.display()),
            ],
        )
        .with_timeout(60)
    }
}

#[async_trait]
impl Camera for GstCamera {
    async fn record(&self, request: &CaptureRequest, output: &Path) -> MediaResult<()> {
        let tool = self.record_command(request, output);
        let out = ToolRunner::run_checked(&tool).await?;
        info!(output = %output.display(), duration_ms = out.duration_ms, "video recorded");
        Ok(())
    }

    async fn snapshot(&self, size: ImageSize, output: &Path) -> MediaResult<()> {
        ToolRunner::run_checked(&self.snapshot_command(size, output)).await?;
        info!(output = %output.display(), "snapshot taken");
        Ok(())
    }
}
