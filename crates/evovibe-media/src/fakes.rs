//! In-process stand-ins for the external media tools (testing only)
//!
//! The fakes write placeholder files where the real tools would, so code
//! that checks for artifacts on disk behaves the same.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;

use crate::camera::{Camera, CaptureRequest};
use crate::compare::ImageComparator;
use crate::error::{MediaError, MediaResult};
use crate::frames::{frame_file_name, FrameExtractor};
use crate::geometry::{ImageSize, RegionOfInterest};
use crate::mask::MaskPainter;

async fn touch(path: &Path, contents: &str) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| MediaError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    fs::write(path, contents)
        .await
        .map_err(|source| MediaError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Camera that records requests and optionally takes simulated time.
#[derive(Debug, Clone, Default)]
pub struct FakeCamera {
    requests: Arc<Mutex<Vec<CaptureRequest>>>,
    simulate_duration: bool,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for the requested duration, like a real recording.
    pub fn realtime() -> Self {
        Self {
            simulate_duration: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn record(&self, request: &CaptureRequest, output: &Path) -> MediaResult<()> {
        self.requests.lock().unwrap().push(*request);
        if self.simulate_duration {
            tokio::time::sleep(Duration::from_secs_f64(request.duration_secs)).await;
        }
        touch(output, "video").await
    }

    async fn snapshot(&self, _size: ImageSize, output: &Path) -> MediaResult<()> {
        touch(output, "still").await
    }
}

/// Extractor that creates `count` empty frame files.
#[derive(Debug, Clone, Default)]
pub struct FakeExtractor;

#[async_trait]
impl FrameExtractor for FakeExtractor {
    async fn extract(
        &self,
        _video: &Path,
        _frame_rate: u32,
        count: usize,
        out_dir: &Path,
    ) -> MediaResult<Vec<PathBuf>> {
        let mut frames = Vec::with_capacity(count);
        for i in 1..=count {
            let path = out_dir.join(frame_file_name(i));
            touch(&path, "").await?;
            frames.push(path);
        }
        Ok(frames)
    }
}

type CompareFn = dyn Fn(&Path, &Path, &Path) -> u64 + Send + Sync;

/// Comparator answering from a closure over `(a, b, mask)`.
#[derive(Clone)]
pub struct ScriptedComparator {
    answer: Arc<CompareFn>,
    calls: Arc<AtomicU64>,
}

impl ScriptedComparator {
    pub fn new(answer: impl Fn(&Path, &Path, &Path) -> u64 + Send + Sync + 'static) -> Self {
        Self {
            answer: Arc::new(answer),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn constant(value: u64) -> Self {
        Self::new(move |_, _, _| value)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ScriptedComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedComparator")
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl ImageComparator for ScriptedComparator {
    async fn difference(&self, a: &Path, b: &Path, mask: &Path) -> MediaResult<u64> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok((self.answer)(a, b, mask))
    }
}

/// Painter that writes placeholder masks and previews.
#[derive(Debug, Clone, Default)]
pub struct FakePainter;

#[async_trait]
impl MaskPainter for FakePainter {
    async fn paint_mask(
        &self,
        size: ImageSize,
        roi: &RegionOfInterest,
        output: &Path,
    ) -> MediaResult<()> {
        roi.validate(size)?;
        touch(output, &roi.draw_primitive()).await
    }

    async fn paint_preview(
        &self,
        _background: &Path,
        rois: &[RegionOfInterest],
        output: &Path,
    ) -> MediaResult<()> {
        let drawn: Vec<String> = rois.iter().map(RegionOfInterest::draw_primitive).collect();
        touch(output, &drawn.join("\n")).await
    }
}
