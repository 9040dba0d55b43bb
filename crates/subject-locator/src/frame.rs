//! Still-frame sampling.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use reelcut_common::{ReelcutError, ReelcutResult, TempScope};
use tokio::process::Command;

/// Width of the extracted still. Height follows the source aspect.
pub const STILL_WIDTH: u32 = 640;

/// One frame of the source, as seen by the locator tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSample {
    /// Downscaled JPEG of the frame. `None` when extraction failed.
    pub still: Option<PathBuf>,
    /// Source geometry; regions are reported in these pixels.
    pub source_width: u32,
    pub source_height: u32,
}

impl FrameSample {
    /// A sample with no image; only geometry-based tiers can use it.
    pub fn without_still(source_width: u32, source_height: u32) -> Self {
        Self {
            still: None,
            source_width,
            source_height,
        }
    }
}

/// Extract the frame at `at_ms` into `scope` as a JPEG.
pub async fn extract_still(
    ffmpeg: &Path,
    source: &Path,
    at_ms: u64,
    scope: &mut TempScope,
) -> ReelcutResult<PathBuf> {
    let output = scope.allocate("still", "jpg");
    let seek = format!("{:.3}", at_ms as f64 / 1000.0);
    let scale = format!("scale={STILL_WIDTH}:-2");

    let result = Command::new(ffmpeg)
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg("-ss")
        .arg(&seek)
        .arg("-i")
        .arg(source)
        .arg("-frames:v")
        .arg("1")
        .arg("-vf")
        .arg(&scale)
        .arg("-q:v")
        .arg("4")
        .arg(&output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            ReelcutError::locator_tier("frame", format!("failed to spawn {}: {e}", ffmpeg.display()))
        })?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ReelcutError::locator_tier(
            "frame",
            format!("still extraction at {seek}s failed: {}", stderr.trim()),
        ));
    }
    if !output.exists() {
        return Err(ReelcutError::locator_tier(
            "frame",
            format!("no frame decoded at {seek}s"),
        ));
    }
    Ok(output)
}
