//! Trial scoring: reduce a trial's frame features to one number.
//!
//! Every function ignores the first [`DISCARD_FRAMES`] frames, which the
//! start blip lights up. A frame without an earlier-frame feature never
//! counts as "no movement".

use serde::{Deserialize, Serialize};

use crate::features::{FrameFeatures, MemberFeatures};

/// Frames at the start of a trial covered by the start blip.
pub const DISCARD_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringFunction {
    /// Background pixels of the active ROI over frames with bees and no movement.
    StoppedFrames,
    /// `StoppedFrames` of the active ROI minus that of the passive ROIs.
    PenalizePassiveCasu,
    /// Background pixels over frames with bees, active minus passive.
    BackgroundBeesActiveMinusPassive,
    /// Frames without movement in the active ROI.
    FramesWithNoMovementActiveCasuRoi,
    /// Frames without movement, active minus passive.
    FramesWithNoMovementActivePassiveCasuRois,
    /// Frames without movement in the active ROI during stimulus segments,
    /// divided by those during no-stimulus segments.
    StimulusSegmentRatio,
}

/// Pixel-count thresholds of the image processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// More background-differing pixels than this means bees are present
    pub background: u64,
    /// Fewer earlier-frame-differing pixels than this means no movement
    pub movement: u64,
}

/// Which part of the stimulus schedule a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Stimulus,
    NoStimulus,
}

/// Stimulus schedule in frames: `repetitions × (on, off)` then one final `on`,
/// starting right after the discard window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSchedule {
    pub stimulus_frames: usize,
    pub no_stimulus_frames: usize,
    pub repetitions: u32,
}

impl PulseSchedule {
    pub fn segment(&self, frame: usize) -> Option<Segment> {
        let t = frame.checked_sub(DISCARD_FRAMES)?;
        let period = self.stimulus_frames + self.no_stimulus_frames;
        let repeated = period * self.repetitions as usize;
        if t < repeated {
            if t % period < self.stimulus_frames {
                Some(Segment::Stimulus)
            } else {
                Some(Segment::NoStimulus)
            }
        } else if t - repeated < self.stimulus_frames {
            Some(Segment::Stimulus)
        } else {
            None
        }
    }
}

fn has_bees(m: &MemberFeatures, th: Thresholds) -> bool {
    m.background > th.background
}

fn no_movement(m: &MemberFeatures, th: Thresholds) -> bool {
    m.previous.is_some_and(|p| p < th.movement)
}

/// Analysed frames after the discard window, with their index.
fn analysed(features: &FrameFeatures) -> impl Iterator<Item = (usize, &[MemberFeatures])> {
    features.frames().enumerate().skip(DISCARD_FRAMES)
}

fn accumulate(
    features: &FrameFeatures,
    member: usize,
    value: impl Fn(&MemberFeatures) -> Option<f64>,
) -> f64 {
    analysed(features)
        .filter_map(|(_, frame)| frame.get(member).and_then(&value))
        .sum()
}

/// Mean of `per_member` over every member except `active`; zero for a single-member arena.
fn passive_mean(features: &FrameFeatures, active: usize, per_member: impl Fn(usize) -> f64) -> f64 {
    let passive: Vec<usize> = (0..features.members()).filter(|m| *m != active).collect();
    if passive.is_empty() {
        return 0.0;
    }
    passive.iter().map(|m| per_member(*m)).sum::<f64>() / passive.len() as f64
}

impl ScoringFunction {
    /// Score one trial whose active member is `active`.
    pub fn score(
        self,
        features: &FrameFeatures,
        active: usize,
        thresholds: Thresholds,
        schedule: &PulseSchedule,
    ) -> f64 {
        let th = thresholds;
        let stopped = |member: usize| {
            accumulate(features, member, |m| {
                (has_bees(m, th) && no_movement(m, th)).then_some(m.background as f64)
            })
        };
        let bees = |member: usize| {
            accumulate(features, member, |m| {
                has_bees(m, th).then_some(m.background as f64)
            })
        };
        let still = |member: usize| {
            accumulate(features, member, |m| no_movement(m, th).then_some(1.0))
        };
        match self {
            ScoringFunction::StoppedFrames => stopped(active),
            ScoringFunction::PenalizePassiveCasu => {
                stopped(active) - passive_mean(features, active, stopped)
            }
            ScoringFunction::BackgroundBeesActiveMinusPassive => {
                bees(active) - passive_mean(features, active, bees)
            }
            ScoringFunction::FramesWithNoMovementActiveCasuRoi => still(active),
            ScoringFunction::FramesWithNoMovementActivePassiveCasuRois => {
                still(active) - passive_mean(features, active, still)
            }
            ScoringFunction::StimulusSegmentRatio => {
                let (mut on, mut off) = (0u64, 0u64);
                for (index, frame) in analysed(features) {
                    let Some(m) = frame.get(active) else { continue };
                    if !no_movement(m, th) {
                        continue;
                    }
                    match schedule.segment(index) {
                        Some(Segment::Stimulus) => on += 1,
                        Some(Segment::NoStimulus) => off += 1,
                        None => {}
                    }
                }
                on as f64 / off.max(1) as f64
            }
        }
    }

    /// Largest spread two trial scores can plausibly show, for the weighted reduction.
    ///
    /// Pixel sums scale with the region area, frame counters with the
    /// number of analysed frames only.
    pub fn expected_range(self, analysed_frames: usize, roi_area: u64) -> f64 {
        let frames = analysed_frames as f64;
        match self {
            ScoringFunction::StoppedFrames
            | ScoringFunction::PenalizePassiveCasu
            | ScoringFunction::BackgroundBeesActiveMinusPassive => frames * roi_area as f64,
            ScoringFunction::FramesWithNoMovementActiveCasuRoi
            | ScoringFunction::FramesWithNoMovementActivePassiveCasuRois
            | ScoringFunction::StimulusSegmentRatio => frames,
        }
    }
}
