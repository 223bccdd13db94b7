//! Mask and preview rendering for regions of interest.

use std::path::Path;

use async_trait::async_trait;

use crate::error::MediaResult;
use crate::geometry::{ImageSize, RegionOfInterest};
use crate::runner::{ToolCommand, ToolRunner};

/// Draws ROI masks (white on black) and an annotated preview.
#[async_trait]
pub trait MaskPainter: Send + Sync {
    async fn paint_mask(
        &self,
        size: ImageSize,
        roi: &RegionOfInterest,
        output: &Path,
    ) -> MediaResult<()>;

    /// Outline every region on top of the background for operator review.
    async fn paint_preview(
        &self,
        background: &Path,
        rois: &[RegionOfInterest],
        output: &Path,
    ) -> MediaResult<()>;
}

/// Mask painter backed by ImageMagick `convert`.
#[derive(Debug, Clone, Default)]
pub struct MagickPainter;

impl MagickPainter {
    pub fn mask_command(
        &self,
        size: ImageSize,
        roi: &RegionOfInterest,
        output: &Path,
    ) -> ToolCommand {
        ToolCommand::new(
            "convert-mask",
            vec![
                "convert".into(),
                "-size".into(),
                size.geometry(),
                "xc:black".into(),
                "-fill".into(),
                "white".into(),
                "-draw".into(),
                roi.draw_primitive(),
                output.display().to_string(),
            ],
        )
        .with_timeout(60)
    }

    pub fn preview_command(
        &self,
        background: &Path,
        rois: &[RegionOfInterest],
        output: &Path,
    ) -> ToolCommand {
        let mut command = vec![
            "convert".to_string(),
            background.display().to_string(),
            "-fill".into(),
            "none".into(),
            "-stroke".into(),
            "red".into(),
            "-strokewidth".into(),
            "2".into(),
        ];
        for roi in rois {
            command.push("-draw".into());
            command.push(roi.draw_primitive());
        }
        command.push(output.display().to_string());
        ToolCommand::new("convert-preview", command).with_timeout(60)
    }
}

#[async_trait]
impl MaskPainter for MagickPainter {
    async fn paint_mask(
        &self,
        size: ImageSize,
        roi: &RegionOfInterest,
        output: &Path,
    ) -> MediaResult<()> {
        roi.validate(size)?;
        ToolRunner::run_checked(&self.mask_command(size, roi, output)).await?;
        Ok(())
    }

    async fn paint_preview(
        &self,
        background: &Path,
        rois: &[RegionOfInterest],
        output: &Path,
    ) -> MediaResult<()> {
        ToolRunner::run_checked(&self.preview_command(background, rois, output)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_draws_every_region() {
        let rois = [
            RegionOfInterest::Rectangle {
                left: 0,
                top: 0,
                right: 10,
                bottom: 10,
            },
            RegionOfInterest::Circle {
                center_x: 50,
                center_y: 50,
                radius: 5,
            },
        ];
        let cmd = MagickPainter.preview_command(Path::new("bg.png"), &rois, Path::new("p.png"));
        assert_eq!(cmd.command.iter().filter(|s| *s == "-draw").count(), 2);
    }

    #[tokio::test]
    async fn invalid_roi_fails_before_running_convert() {
        let roi = RegionOfInterest::Rectangle {
            left: 5,
            top: 5,
            right: 5,
            bottom: 9,
        };
        let err = MagickPainter
            .paint_mask(ImageSize::new(100, 100), &roi, Path::new("m.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::MediaError::Geometry { .. }));
    }
}
