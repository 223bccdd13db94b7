//! Evovibe-Media: external collaborators for video-based scoring
//!
//! Wraps the command-line tools the experiment depends on:
//! - `gst-launch-1.0` for trial videos and background stills
//! - `ffmpeg` for splitting videos into frames
//! - ImageMagick `convert` for masks and masked pixel differences
//!
//! Each tool sits behind a small async trait so the orchestration code can
//! run against the in-process fakes in tests.

pub mod camera;
pub mod compare;
mod error;
pub mod fakes;
pub mod frames;
pub mod geometry;
pub mod mask;
pub mod runner;

use std::sync::Arc;

pub use camera::{Camera, CaptureRequest, GstCamera};
pub use compare::{ImageComparator, MagickComparator};
pub use error::{MediaError, MediaResult};
pub use frames::{frame_file_name, FfmpegExtractor, FrameExtractor};
pub use geometry::{ImageSize, RegionOfInterest};
pub use mask::{MagickPainter, MaskPainter};
pub use runner::{ToolCommand, ToolOutput, ToolRunner};

/// The set of media collaborators an experiment runs with.
#[derive(Clone)]
pub struct MediaToolkit {
    pub camera: Arc<dyn Camera>,
    pub frames: Arc<dyn FrameExtractor>,
    pub comparator: Arc<dyn ImageComparator>,
    pub painter: Arc<dyn MaskPainter>,
}

impl MediaToolkit {
    /// gstreamer, ffmpeg and ImageMagick on the local machine.
    pub fn system(fuzz_percent: u32) -> Self {
        Self {
            camera: Arc::new(GstCamera::default()),
            frames: Arc::new(FfmpegExtractor),
            comparator: Arc::new(MagickComparator::new(fuzz_percent)),
            painter: Arc::new(MagickPainter),
        }
    }
}
