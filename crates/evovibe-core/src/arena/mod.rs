//! Arenas: groups of devices that run one trial together.
//!
//! An arena's members share one camera view. For each trial exactly one
//! member is active (plays the candidate's vibration); the others stay
//! passive but keep the same timing, so every member finishes together.

pub mod layout;
pub mod selection;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use evovibe_link::{Candidate, Command};
use evovibe_media::{ImageSize, MaskPainter, RegionOfInterest};
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::DeviceHandle;
use crate::error::{EvovibeError, EvovibeResult};

pub use layout::{ArenaKind, ArenaLayout, PixelBox};
pub use selection::{roulette_select, TemperaturePolicy};

/// File the arena geometry is persisted to, inside the arena folder.
pub const PROPERTIES_FILE: &str = "properties.toml";
/// Preview of every region of interest drawn on the background.
pub const PREVIEW_FILE: &str = "Region-of-Interests.png";

pub fn mask_file_name(member: usize) -> String {
    format!("Mask-{member}.png")
}

/// Contents of `properties.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaProperties {
    pub index: usize,
    pub casu_numbers: Vec<u32>,
    pub layout: ArenaLayout,
}

#[derive(Debug, Clone)]
pub struct ArenaMember {
    pub label: &'static str,
    pub device: DeviceHandle,
    pub roi: RegionOfInterest,
    /// White region of interest on black, full image size
    pub mask: PathBuf,
}

/// Result of polling every member's temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaStatus {
    pub score: f64,
    pub temperatures: Vec<f64>,
}

/// Which member plays the stimulus in one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAssignment {
    pub active: usize,
    pub active_casu: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialOutcome {
    pub roles: RoleAssignment,
    /// When the active device started its stimulus, if it said so
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Arena {
    index: usize,
    layout: ArenaLayout,
    members: Vec<ArenaMember>,
    dir: PathBuf,
}

impl Arena {
    pub fn new(index: usize, layout: ArenaLayout, members: Vec<ArenaMember>, dir: PathBuf) -> Self {
        Self {
            index,
            layout,
            members,
            dir,
        }
    }

    /// Paint one mask per member and the ROI preview into `dir`.
    ///
    /// `devices` must be in member order and match the layout's arity.
    pub async fn build(
        index: usize,
        layout: ArenaLayout,
        devices: Vec<DeviceHandle>,
        dir: PathBuf,
        painter: &dyn MaskPainter,
        size: ImageSize,
        background: &Path,
    ) -> EvovibeResult<Self> {
        let kind = layout.kind();
        let regions = layout.regions();
        if devices.len() != regions.len() {
            return Err(EvovibeError::NotEnoughDevices {
                needed: regions.len(),
                available: devices.len(),
            });
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EvovibeError::io(&dir, e))?;
        let mut members = Vec::with_capacity(regions.len());
        for (k, (device, roi)) in devices.into_iter().zip(regions.iter()).enumerate() {
            let mask = dir.join(mask_file_name(k));
            painter.paint_mask(size, roi, &mask).await?;
            members.push(ArenaMember {
                label: kind.member_labels()[k],
                device,
                roi: *roi,
                mask,
            });
        }
        painter
            .paint_preview(background, &regions, &dir.join(PREVIEW_FILE))
            .await?;
        Ok(Self::new(index, layout, members, dir))
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn layout(&self) -> &ArenaLayout {
        &self.layout
    }

    pub fn members(&self) -> &[ArenaMember] {
        &self.members
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn preview(&self) -> PathBuf {
        self.dir.join(PREVIEW_FILE)
    }

    pub fn masks(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.mask.clone()).collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.members.iter().map(|m| m.label).collect()
    }

    /// Pixel area of the biggest member region.
    pub fn largest_roi_area(&self) -> u64 {
        self.members.iter().map(|m| m.roi.area()).max().unwrap_or(0)
    }

    pub fn device_ids(&self) -> Vec<u32> {
        self.members.iter().map(|m| m.device.id()).collect()
    }

    /// Write the geometry to `properties.toml`.
    pub async fn persist(&self) -> EvovibeResult<()> {
        let path = self.dir.join(PROPERTIES_FILE);
        let text = toml::to_string(&ArenaProperties {
            index: self.index,
            casu_numbers: self.device_ids(),
            layout: self.layout,
        })?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| EvovibeError::io(&path, e))
    }

    /// Poll every member's temperature, one member at a time.
    pub async fn status(&self, policy: &TemperaturePolicy) -> EvovibeResult<ArenaStatus> {
        let mut temperatures = Vec::with_capacity(self.members.len());
        for member in &self.members {
            temperatures.push(member.device.temperature().await?);
        }
        let score = policy.usability_score(&temperatures);
        debug!(arena = self.index, ?temperatures, score, "arena status");
        Ok(ArenaStatus {
            score,
            temperatures,
        })
    }

    /// Pick the active member uniformly at random.
    pub fn assign_roles<R: Rng + ?Sized>(&self, rng: &mut R) -> RoleAssignment {
        let active = rng.gen_range(0..self.members.len().max(1));
        RoleAssignment {
            active,
            active_casu: self.members.get(active).map_or(0, |m| m.device.id()),
        }
    }

    /// Run one trial: random roles, then [`Arena::dispatch`].
    pub async fn run_trial<R: Rng + Send + ?Sized>(
        &self,
        candidate: &Candidate,
        rng: &mut R,
    ) -> EvovibeResult<TrialOutcome> {
        let roles = self.assign_roles(rng);
        self.dispatch(candidate, roles).await
    }

    /// Send the role commands to every member at once, then wait for all replies.
    ///
    /// Every member runs to completion even if another fails; the first
    /// failure is reported afterwards. There is no retry.
    pub async fn dispatch(
        &self,
        candidate: &Candidate,
        roles: RoleAssignment,
    ) -> EvovibeResult<TrialOutcome> {
        info!(arena = self.index, active_casu = roles.active_casu, "dispatching roles");
        let requests = self.members.iter().enumerate().map(|(i, member)| {
            let command = if i == roles.active {
                Command::SetActive(candidate.clone())
            } else {
                Command::SetPassive
            };
            async move { member.device.acknowledge(&command).await }
        });
        let replies = join_all(requests).await;
        let mut started_at = None;
        for (i, reply) in replies.into_iter().enumerate() {
            let at = reply?;
            if i == roles.active {
                started_at = at;
            }
        }
        Ok(TrialOutcome { roles, started_at })
    }

    /// Ventilate every member for `seconds`, in parallel.
    pub async fn spread(&self, seconds: f64) -> EvovibeResult<()> {
        let command = Command::Spread { seconds };
        let replies = join_all(
            self.members
                .iter()
                .map(|m| m.device.acknowledge(&command)),
        )
        .await;
        for reply in replies {
            reply?;
        }
        Ok(())
    }
}
