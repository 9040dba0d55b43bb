//! Source media inspection via ffprobe.

use std::path::Path;
use std::process::Stdio;

use reelcut_common::{ReelcutError, ReelcutResult, RenderDefaults};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Facts about the source that shape the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProbe {
    pub width: u32,
    pub height: u32,
    /// `None` when the container does not report a duration.
    pub duration_ms: Option<u64>,
    pub has_audio: bool,
    /// False when these values are configured defaults, not probe results.
    pub probed: bool,
}

impl MediaProbe {
    /// Geometry substituted when probing fails.
    pub fn fallback(defaults: &RenderDefaults) -> Self {
        Self {
            width: defaults.default_width,
            height: defaults.default_height,
            duration_ms: None,
            has_audio: true,
            probed: false,
        }
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Rotation metadata in degrees (either tag or display-matrix side data).
    fn rotation(&self) -> i64 {
        let from_tag = self
            .tags
            .as_ref()
            .and_then(|t| t.rotate.as_ref())
            .and_then(|r| r.parse::<i64>().ok());
        let from_side = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .map(|r| r.round() as i64);
        from_tag.or(from_side).unwrap_or(0)
    }
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(output: &str) -> ReelcutResult<MediaProbe> {
    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ReelcutError::probe(format!("Failed to parse ffprobe output: {e}")))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| ReelcutError::probe("No video stream found"))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ReelcutError::probe("Video stream has no dimensions")),
    };
    // Frames of a rotated phone recording are displayed transposed.
    let (width, height) = if video.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    let duration_ms = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| (d * 1000.0).round() as u64);

    Ok(MediaProbe {
        width,
        height,
        duration_ms,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
        probed: true,
    })
}

/// Probe `path` with the configured ffprobe binary.
pub async fn probe_media(ffprobe: &Path, path: &Path) -> ReelcutResult<MediaProbe> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ReelcutError::probe(format!("Failed to run {}: {e}", ffprobe.display())))?;

    if !output.status.success() {
        return Err(ReelcutError::probe(format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Probe, substituting configured defaults on failure.
pub async fn probe_or_default(defaults: &RenderDefaults, path: &Path) -> MediaProbe {
    match probe_media(&defaults.ffprobe_path, path).await {
        Ok(probe) => {
            tracing::debug!(
                width = probe.width,
                height = probe.height,
                duration_ms = ?probe.duration_ms,
                has_audio = probe.has_audio,
                "Probed source"
            );
            probe
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                width = defaults.default_width,
                height = defaults.default_height,
                "Probe failed; using default geometry"
            );
            MediaProbe::fallback(defaults)
        }
    }
}
