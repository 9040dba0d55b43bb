//! H.264 encoder selection and codec arguments.

use std::path::Path;
use std::process::Stdio;

use reelcut_common::RenderDefaults;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::OnceCell;

/// Result of the hardware probe, shared by every render in the process.
static DETECTED: OnceCell<VideoEncoder> = OnceCell::const_new();

/// Video encoders the renderer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoEncoder {
    VideoToolbox,
    Nvenc,
    Qsv,
    Amf,
    Libx264,
}

impl VideoEncoder {
    /// Hardware encoders in preference order.
    pub const HARDWARE: [VideoEncoder; 4] = [
        VideoEncoder::VideoToolbox,
        VideoEncoder::Nvenc,
        VideoEncoder::Qsv,
        VideoEncoder::Amf,
    ];

    pub fn codec_name(self) -> &'static str {
        match self {
            Self::VideoToolbox => "h264_videotoolbox",
            Self::Nvenc => "h264_nvenc",
            Self::Qsv => "h264_qsv",
            Self::Amf => "h264_amf",
            Self::Libx264 => "libx264",
        }
    }

    pub fn is_hardware(self) -> bool {
        self != Self::Libx264
    }
}

/// Hardware encoders listed in `ffmpeg -encoders` output, in preference order.
pub fn parse_encoder_list(stdout: &str) -> Vec<VideoEncoder> {
    let listed: Vec<&str> = stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            // Video encoder rows start with a flag column like "V....D".
            if !flags.starts_with('V') {
                return None;
            }
            fields.next()
        })
        .collect();

    VideoEncoder::HARDWARE
        .into_iter()
        .filter(|encoder| listed.contains(&encoder.codec_name()))
        .collect()
}

async fn list_encoders(ffmpeg: &Path) -> Option<String> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A listed encoder may still lack a device or driver; a one-frame encode
/// tells us whether it actually works.
async fn test_encode(ffmpeg: &Path, encoder: VideoEncoder) -> bool {
    Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "color=c=black:s=256x256:d=0.1",
            "-frames:v",
            "1",
            "-c:v",
            encoder.codec_name(),
            "-f",
            "null",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

async fn probe_hardware(ffmpeg: &Path) -> VideoEncoder {
    let Some(listing) = list_encoders(ffmpeg).await else {
        tracing::warn!(ffmpeg = %ffmpeg.display(), "Could not list encoders; using libx264");
        return VideoEncoder::Libx264;
    };
    for candidate in parse_encoder_list(&listing) {
        if test_encode(ffmpeg, candidate).await {
            tracing::info!(encoder = candidate.codec_name(), "Hardware encoder available");
            return candidate;
        }
        tracing::debug!(encoder = candidate.codec_name(), "Hardware encoder listed but unusable");
    }
    tracing::info!("No usable hardware encoder; using libx264");
    VideoEncoder::Libx264
}

/// Detect the best available encoder. Probed once per process.
pub async fn detect_encoder(ffmpeg: &Path) -> VideoEncoder {
    *DETECTED.get_or_init(|| probe_hardware(ffmpeg)).await
}

/// Encoder for a render under `defaults`.
pub async fn select_encoder(defaults: &RenderDefaults) -> VideoEncoder {
    if !defaults.prefer_hardware_encoder {
        return VideoEncoder::Libx264;
    }
    detect_encoder(&defaults.ffmpeg_path).await
}

/// Output codec and container arguments.
pub fn codec_args(encoder: VideoEncoder, defaults: &RenderDefaults) -> Vec<String> {
    let video_bitrate = format!("{}k", defaults.video_bitrate_kbps.max(1000));
    let audio_bitrate = format!("{}k", defaults.audio_bitrate_kbps.max(64));

    let mut args = vec!["-c:v".to_string(), encoder.codec_name().to_string()];
    if encoder == VideoEncoder::Libx264 {
        args.extend([
            "-preset".to_string(),
            "medium".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
        ]);
    }
    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        defaults.fps.max(1).to_string(),
        "-b:v".to_string(),
        video_bitrate,
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        audio_bitrate,
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_amf             AMD AMF H.264 Encoder (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn test_parse_encoder_list_orders_by_preference() {
        assert_eq!(
            parse_encoder_list(LISTING),
            vec![VideoEncoder::Nvenc, VideoEncoder::Amf]
        );
        assert!(parse_encoder_list("").is_empty());
    }

    #[test]
    fn test_software_codec_args() {
        let args = codec_args(VideoEncoder::Libx264, &RenderDefaults::default());
        let joined = args.join(" ");
        assert!(joined.starts_with("-c:v libx264 -preset medium"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-b:v 8000k"));
        assert!(joined.contains("-b:a 192k"));
        assert!(joined.ends_with("-movflags +faststart"));
    }

    #[test]
    fn test_hardware_codec_args_skip_x264_options() {
        let args = codec_args(VideoEncoder::Nvenc, &RenderDefaults::default());
        assert_eq!(args[1], "h264_nvenc");
        assert!(!args.contains(&"-preset".to_string()));
    }

    #[tokio::test]
    async fn test_hardware_disabled_selects_software() {
        let defaults = RenderDefaults {
            prefer_hardware_encoder: false,
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ..RenderDefaults::default()
        };
        assert_eq!(select_encoder(&defaults).await, VideoEncoder::Libx264);
    }
}
