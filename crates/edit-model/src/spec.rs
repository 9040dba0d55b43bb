//! The edit specification: the single source of truth for one render.
//!
//! All layer times are **source-relative** milliseconds. They are translated
//! to clip time exactly once, by [`crate::clip::ClipSpec::from_edit`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::ColorFilter;
use crate::format::TargetFormat;
use crate::geometry::LayerRect;

/// Immutable description of one render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSpec {
    /// Source video.
    pub source_path: PathBuf,

    /// Explicit output path. Derived by the renderer when unset.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Trim window in source milliseconds.
    pub trim_start_ms: u64,
    pub trim_end_ms: u64,

    /// Output canvas aspect.
    pub target_format: TargetFormat,

    /// Playback rate multiplier (must be positive).
    #[serde(default = "default_unit")]
    pub speed: f64,

    /// Silence the source audio.
    #[serde(default)]
    pub mute: bool,

    /// Linear gain on the source audio.
    #[serde(default = "default_unit")]
    pub volume: f64,

    #[serde(default)]
    pub color_filter: ColorFilter,

    /// Zoom keyframes, ordered by start time.
    #[serde(default)]
    pub keyframes: Vec<ZoomKeyframe>,

    /// Slow monotonic zoom when no keyframes are given.
    #[serde(default)]
    pub auto_zoom: bool,

    /// Zoom level outside every keyframe window.
    #[serde(default = "default_unit")]
    pub default_zoom: f64,

    /// Frame the crop around detected subjects.
    #[serde(default)]
    pub subject_framing: bool,

    /// Number of subjects to keep framed (more than one stacks a split screen).
    #[serde(default = "default_subject_count")]
    pub subject_count: usize,

    #[serde(default)]
    pub broll_layers: Vec<BrollLayer>,

    #[serde(default)]
    pub sticker_layers: Vec<StickerLayer>,

    #[serde(default)]
    pub text_segments: Vec<TextSegment>,

    #[serde(default)]
    pub caption_style: CaptionStyle,

    /// Headline shown at the top of the clip.
    #[serde(default)]
    pub hook_text: Option<String>,

    #[serde(default = "default_hook_duration_ms")]
    pub hook_duration_ms: u64,

    /// Background music.
    #[serde(default)]
    pub audio_track: Option<AudioTrack>,

    /// Noise reduction and loudness normalization on the source audio.
    #[serde(default)]
    pub enhance_audio: bool,

    /// Inject a one-shot sound at every caption onset.
    #[serde(default)]
    pub sfx_enabled: bool,

    /// One-shot sound file. Falls back to the configured default.
    #[serde(default)]
    pub sfx_path: Option<PathBuf>,

    /// Sidechain-duck the background music under the source audio.
    #[serde(default)]
    pub ducking_enabled: bool,

    #[serde(default)]
    pub watermark: Option<Watermark>,
}

/// A zoom ramp over a source-time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomKeyframe {
    pub start_ms: u64,
    pub end_ms: u64,
    pub zoom_start: f64,
    pub zoom_end: f64,
}

/// A cutaway video composited over the main picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrollLayer {
    pub path: PathBuf,
    pub start_ms: u64,
    pub end_ms: u64,

    /// Offset into the B-roll file where playback starts.
    #[serde(default)]
    pub source_offset_ms: u64,

    /// Placement on the canvas. Full canvas when unset.
    #[serde(default)]
    pub rect: Option<LayerRect>,

    #[serde(default = "default_unit")]
    pub opacity: f64,
}

/// A still image composited over the picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerLayer {
    pub source: StickerSource,
    pub start_ms: u64,
    pub end_ms: u64,
    pub rect: LayerRect,
}

/// Where a sticker image comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StickerSource {
    /// Image file on disk.
    Path(PathBuf),
    /// Inline `data:image/...;base64,` URL, extracted to a temp file at render time.
    DataUrl(String),
}

/// A caption segment with optional word timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

/// One timed word inside a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordTiming {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Caption look. Fields map 1:1 onto the subtitle style table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStyle {
    pub font_name: String,
    pub font_size: u32,
    /// `#RRGGBB`, used for spoken and upcoming words.
    pub text_color: String,
    /// `#RRGGBB`, used for the active word.
    pub highlight_color: String,
    pub outline_color: String,
    pub outline_width: f64,
    pub position: CaptionPosition,
    pub margin_v: u32,
    pub uppercase: bool,
    /// Peak scale (percent) of the active-word pulse.
    pub highlight_scale: u32,
}

/// Vertical caption placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPosition {
    #[default]
    Bottom,
    Center,
    Top,
}

/// Background music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub path: PathBuf,
    #[serde(default = "default_music_volume")]
    pub volume: f64,
    #[serde(default)]
    pub fade_in: bool,
    #[serde(default)]
    pub fade_out: bool,
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,
    /// Offset into the music file where playback starts.
    #[serde(default)]
    pub trim_offset_ms: u64,
}

/// Logo overlay drawn above every other layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub path: PathBuf,
    #[serde(default)]
    pub corner: Corner,
    /// Watermark width as a fraction of the canvas width.
    #[serde(default = "default_watermark_width")]
    pub width_ratio: f64,
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
    /// Margin from the canvas edges as a fraction of the canvas width.
    #[serde(default = "default_watermark_margin")]
    pub margin_ratio: f64,
}

/// Canvas corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_name: "Montserrat".to_string(),
            font_size: 72,
            text_color: "#FFFFFF".to_string(),
            highlight_color: "#FFE000".to_string(),
            outline_color: "#000000".to_string(),
            outline_width: 4.0,
            position: CaptionPosition::Bottom,
            margin_v: 320,
            uppercase: false,
            highlight_scale: 115,
        }
    }
}

fn default_unit() -> f64 {
    1.0
}

fn default_subject_count() -> usize {
    1
}

fn default_hook_duration_ms() -> u64 {
    3000
}

fn default_music_volume() -> f64 {
    0.3
}

fn default_fade_duration_ms() -> u64 {
    1500
}

fn default_watermark_width() -> f64 {
    0.18
}

fn default_watermark_opacity() -> f64 {
    0.8
}

fn default_watermark_margin() -> f64 {
    0.03
}

impl EditSpec {
    /// Minimal spec over a trim window. Everything optional is off.
    pub fn new(
        source_path: impl Into<PathBuf>,
        trim_start_ms: u64,
        trim_end_ms: u64,
        target_format: TargetFormat,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: None,
            trim_start_ms,
            trim_end_ms,
            target_format,
            speed: 1.0,
            mute: false,
            volume: 1.0,
            color_filter: ColorFilter::default(),
            keyframes: Vec::new(),
            auto_zoom: false,
            default_zoom: 1.0,
            subject_framing: false,
            subject_count: 1,
            broll_layers: Vec::new(),
            sticker_layers: Vec::new(),
            text_segments: Vec::new(),
            caption_style: CaptionStyle::default(),
            hook_text: None,
            hook_duration_ms: default_hook_duration_ms(),
            audio_track: None,
            enhance_audio: false,
            sfx_enabled: false,
            sfx_path: None,
            ducking_enabled: false,
            watermark: None,
        }
    }

    /// Parse a spec from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a spec from a JSON file.
    pub fn load(path: &Path) -> reelcut_common::ReelcutResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }

    /// Every file the spec references, paired with what references it.
    pub fn referenced_files(&self) -> Vec<(String, &Path)> {
        let mut files = vec![("source".to_string(), self.source_path.as_path())];
        for (i, layer) in self.broll_layers.iter().enumerate() {
            files.push((format!("B-roll layer {i}"), layer.path.as_path()));
        }
        for (i, layer) in self.sticker_layers.iter().enumerate() {
            if let StickerSource::Path(path) = &layer.source {
                files.push((format!("sticker layer {i}"), path.as_path()));
            }
        }
        if let Some(track) = &self.audio_track {
            files.push(("audio track".to_string(), track.path.as_path()));
        }
        if let Some(sfx) = &self.sfx_path {
            files.push(("sound effect".to_string(), sfx.as_path()));
        }
        if let Some(watermark) = &self.watermark {
            files.push(("watermark".to_string(), watermark.path.as_path()));
        }
        files
    }

    /// Check that every referenced file exists. Returns a list of problems.
    pub fn validate_sources(&self) -> Vec<String> {
        self.referenced_files()
            .into_iter()
            .filter(|(_, path)| !path.exists())
            .map(|(what, path)| format!("{what} file missing: {}", path.display()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json_fills_defaults() {
        let spec = EditSpec::from_json(
            r#"{"sourcePath":"/media/in.mp4","trimStartMs":0,"trimEndMs":5000,"targetFormat":"9:16"}"#,
        )
        .unwrap();
        assert_eq!(spec.target_format, TargetFormat::Portrait9x16);
        assert_eq!(spec.speed, 1.0);
        assert_eq!(spec.volume, 1.0);
        assert_eq!(spec.subject_count, 1);
        assert!(spec.keyframes.is_empty());
        assert!(spec.color_filter.is_neutral());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result = EditSpec::from_json(r#"{"sourcePath":"/media/in.mp4","trimStartMs":0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_full_json_round_trips_layers() {
        let json = r##"{
            "sourcePath": "/media/in.mp4",
            "trimStartMs": 1000,
            "trimEndMs": 9000,
            "targetFormat": "1:1",
            "keyframes": [{"startMs": 2000, "endMs": 3000, "zoomStart": 1.0, "zoomEnd": 1.4}],
            "stickerLayers": [{
                "source": {"dataUrl": "data:image/png;base64,AAAA"},
                "startMs": 1500, "endMs": 2500,
                "rect": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}
            }],
            "textSegments": [{"text": "Hi there", "startMs": 1000, "endMs": 2000,
                "words": [{"text": "Hi", "startMs": 1000, "endMs": 1400},
                          {"text": "there", "startMs": 1400, "endMs": 2000}]}],
            "audioTrack": {"path": "/media/music.mp3", "fadeIn": true},
            "captionStyle": {"highlightColor": "#00FF00"},
            "watermark": {"path": "/media/logo.png", "corner": "top_left"}
        }"##;
        let spec = EditSpec::from_json(json).unwrap();
        assert_eq!(spec.keyframes[0].zoom_end, 1.4);
        assert!(matches!(
            spec.sticker_layers[0].source,
            StickerSource::DataUrl(_)
        ));
        assert_eq!(spec.text_segments[0].words.len(), 2);
        let track = spec.audio_track.as_ref().unwrap();
        assert!(track.fade_in);
        assert_eq!(track.volume, 0.3);
        assert_eq!(spec.caption_style.highlight_color, "#00FF00");
        assert_eq!(spec.caption_style.font_size, 72);
        assert_eq!(spec.watermark.as_ref().unwrap().corner, Corner::TopLeft);
    }

    #[test]
    fn test_validate_sources_reports_missing_files() {
        let dir = std::env::temp_dir();
        let mut spec = EditSpec::new(dir.clone(), 0, 1000, TargetFormat::Square1x1);
        spec.broll_layers.push(BrollLayer {
            path: dir.join("reelcut-definitely-missing-broll.mp4"),
            start_ms: 0,
            end_ms: 500,
            source_offset_ms: 0,
            rect: None,
            opacity: 1.0,
        });
        let problems = spec.validate_sources();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("B-roll layer 0"));
    }
}
