//! Raw per-frame image features of one trial.
//!
//! For each analysed frame and each arena member the trial yields the
//! masked pixel difference against the episode background and against an
//! earlier frame. The earlier-frame feature does not exist for the first
//! `gap` frames.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use evovibe_media::{ImageComparator, MediaResult};
use futures::future::try_join_all;

/// Written to CSV where a frame has no earlier-frame feature.
pub const NO_PREVIOUS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberFeatures {
    /// Pixels differing from the background inside the member's ROI
    pub background: u64,
    /// Pixels differing from the frame `gap` frames earlier
    pub previous: Option<u64>,
}

impl MemberFeatures {
    pub fn new(background: u64, previous: Option<u64>) -> Self {
        Self {
            background,
            previous,
        }
    }
}

/// Features of every analysed frame, `frames[f][member]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameFeatures {
    members: usize,
    frames: Vec<Vec<MemberFeatures>>,
}

impl FrameFeatures {
    pub fn from_frames(frames: Vec<Vec<MemberFeatures>>) -> Self {
        let members = frames.first().map_or(0, Vec::len);
        debug_assert!(frames.iter().all(|f| f.len() == members));
        Self { members, frames }
    }

    /// Number of analysed frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn members(&self) -> usize {
        self.members
    }

    pub fn frames(&self) -> impl Iterator<Item = &[MemberFeatures]> {
        self.frames.iter().map(Vec::as_slice)
    }

    /// `frame,background_<label>,previous_iteration_<label>,...` rows, `-1` for a missing feature.
    pub fn to_csv(&self, labels: &[&str]) -> String {
        let mut out = String::from("frame");
        for label in labels {
            let _ = write!(out, ",background_{label},previous_iteration_{label}");
        }
        out.push('\n');
        for (index, frame) in self.frames.iter().enumerate() {
            let _ = write!(out, "{}", index + 1);
            for member in frame {
                let previous = member.previous.map_or(NO_PREVIOUS, |p| p as i64);
                let _ = write!(out, ",{},{}", member.background, previous);
            }
            out.push('\n');
        }
        out
    }
}

/// Compare every frame against the background and against the frame `gap` earlier,
/// once per member mask.
pub async fn extract_features(
    comparator: &dyn ImageComparator,
    background: &Path,
    frames: &[PathBuf],
    masks: &[PathBuf],
    gap: usize,
) -> MediaResult<FrameFeatures> {
    let gap = gap.max(1);
    let mut features = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let earlier = index.checked_sub(gap).map(|i| &frames[i]);
        let per_member = masks.iter().map(|mask| async move {
            let background = comparator.difference(frame, background, mask).await?;
            let previous = match earlier {
                Some(earlier) => Some(comparator.difference(frame, earlier, mask).await?),
                None => None,
            };
            MediaResult::Ok(MemberFeatures::new(background, previous))
        });
        features.push(try_join_all(per_member).await?);
    }
    Ok(FrameFeatures {
        members: masks.len(),
        frames: features,
    })
}
