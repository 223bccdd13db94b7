//! Masked pixel-difference counts via ImageMagick.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{MediaError, MediaResult};
use crate::runner::{ToolCommand, ToolRunner};

/// Counts differing pixels between two images inside a mask.
#[async_trait]
pub trait ImageComparator: Send + Sync {
    /// Pixels whose channels differ by more than the comparator's threshold,
    /// restricted to the white area of `mask`.
    async fn difference(&self, a: &Path, b: &Path, mask: &Path) -> MediaResult<u64>;
}

/// `convert ... -metric AE -fuzz N% -compare` with both images multiplied by the mask.
#[derive(Debug, Clone)]
pub struct MagickComparator {
    /// Per-channel intensity tolerance, percent
    pub fuzz_percent: u32,
}

impl MagickComparator {
    pub fn new(fuzz_percent: u32) -> Self {
        Self { fuzz_percent }
    }

    pub fn compare_command(&self, a: &Path, b: &Path, mask: &Path) -> ToolCommand {
        let masked = |image: &Path| -> Vec<String> {
            vec![
                "(".into(),
                image.display().to_string(),
                mask.display().to_string(),
                "-compose".into(),
                "multiply".into(),
                "-composite".into(),
                ")".into(),
            ]
        };
        let mut command = vec!["convert".to_string()];
        command.extend(masked(a));
        command.extend(masked(b));
        command.extend([
            "-metric".into(),
            "AE".into(),
            "-fuzz".into(),
            format!("{}%", self.fuzz_percent),
            "-compare".into(),
            "-format".into(),
            "%[distortion]".into(),
            "info:".into(),
        ]);
        ToolCommand::new("convert-compare", command).with_timeout(60)
    }
}

/// Parse ImageMagick's AE distortion output (integer or float notation).
pub fn parse_distortion(tool: &str, output: &str) -> MediaResult<u64> {
    let text = output.trim();
    let value: f64 = text.parse().map_err(|_| MediaError::Output {
        tool: tool.to_string(),
        output: text.to_string(),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(MediaError::Output {
            tool: tool.to_string(),
            output: text.to_string(),
        });
    }
    Ok(value.round() as u64)
}

#[async_trait]
impl ImageComparator for MagickComparator {
    async fn difference(&self, a: &Path, b: &Path, mask: &Path) -> MediaResult<u64> {
        let out = ToolRunner::run_checked(&self.compare_command(a, b, mask)).await?;
        parse_distortion(&out.tool, &out.stdout)
    }
}
