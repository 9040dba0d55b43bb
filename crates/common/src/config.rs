//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides the configured vision credential.
pub const VISION_API_KEY_ENV: &str = "REELCUT_VISION_API_KEY";

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Render defaults and external tool locations.
    pub render: RenderDefaults,

    /// Remote subject-detection endpoint.
    pub vision: VisionConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Encoder binary (any FFmpeg-compatible executable).
    pub ffmpeg_path: PathBuf,

    /// Media probe binary.
    pub ffprobe_path: PathBuf,

    /// Geometry substituted when probing fails.
    pub default_width: u32,
    pub default_height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Whether to probe for and use a hardware H.264 encoder.
    pub prefer_hardware_encoder: bool,

    /// Upper bound for the automatic slow zoom.
    pub auto_zoom_max: f64,

    /// One-shot sound injected at caption onsets when the edit does not name one.
    pub sfx_path: Option<PathBuf>,

    /// Font directory handed to the subtitle burner.
    pub fonts_dir: Option<PathBuf>,

    /// Root directory for per-render temp namespaces (system temp when unset).
    pub temp_dir: Option<PathBuf>,

    /// Directory for derived output paths (source directory when unset).
    pub output_dir: Option<PathBuf>,
}

/// Vision classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Bearer credential. The vision tier is skipped when absent.
    pub api_key: Option<String>,

    /// Endpoint receiving still frames.
    pub endpoint: String,

    /// Model identifier forwarded to the endpoint.
    pub model: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            default_width: 1920,
            default_height: 1080,
            fps: 30,
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            prefer_hardware_encoder: true,
            auto_zoom_max: 1.15,
            sfx_path: None,
            fonts_dir: None,
            temp_dir: None,
            output_dir: None,
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://vision.reelcut.dev/v1/subjects".to_string(),
            model: "subject-locator-1".to_string(),
            timeout_secs: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl VisionConfig {
    /// Credential to use, preferring the environment override.
    pub fn credential(&self) -> Option<String> {
        std::env::var(VISION_API_KEY_ENV)
            .ok()
            .or_else(|| self.api_key.clone())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelcut").join("config.json")
}
