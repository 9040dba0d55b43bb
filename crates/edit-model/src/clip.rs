//! Validation and source-to-clip time translation.
//!
//! [`ClipSpec::from_edit`] is the only place where source-relative
//! milliseconds become clip-relative milliseconds:
//!
//! ```text
//! clip_ms = (clamp(source_ms, trim_start, trim_end) - trim_start) / speed
//! ```
//!
//! Every downstream consumer (graph compilers, subtitle builder) reads
//! `ClipSpec` and never sees source times.

use std::path::PathBuf;

use reelcut_common::{ReelcutError, ReelcutResult};

use crate::color::ColorFilter;
use crate::format::TargetFormat;
use crate::geometry::LayerRect;
use crate::spec::{
    AudioTrack, CaptionStyle, EditSpec, StickerSource, TextSegment, Watermark, ZoomKeyframe,
};

/// Largest supported number of simultaneously framed subjects.
pub const MAX_SUBJECTS: usize = 3;

/// A half-open `[start_ms, end_ms)` window in clip time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipWindow {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl ClipWindow {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn start_secs(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    pub fn end_secs(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }
}

/// Maps source time onto clip time for one trim window and speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipTimeline {
    trim_start_ms: u64,
    trim_end_ms: u64,
    speed: f64,
}

impl ClipTimeline {
    pub fn new(trim_start_ms: u64, trim_end_ms: u64, speed: f64) -> Self {
        Self {
            trim_start_ms,
            trim_end_ms,
            speed,
        }
    }

    /// Clip duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.to_clip_ms(self.trim_end_ms)
    }

    /// Clip time of a source instant, clamped to the trim window.
    pub fn to_clip_ms(&self, source_ms: u64) -> u64 {
        let clamped = source_ms.clamp(self.trim_start_ms, self.trim_end_ms);
        ((clamped - self.trim_start_ms) as f64 / self.speed).round() as u64
    }

    /// Whether a source instant falls inside the trim window.
    pub fn contains(&self, source_ms: u64) -> bool {
        source_ms >= self.trim_start_ms && source_ms < self.trim_end_ms
    }

    /// Clip window for a source range, or `None` when it does not overlap the trim.
    pub fn window(&self, start_ms: u64, end_ms: u64) -> Option<ClipWindow> {
        if end_ms <= self.trim_start_ms || start_ms >= self.trim_end_ms {
            return None;
        }
        let window = ClipWindow {
            start_ms: self.to_clip_ms(start_ms),
            end_ms: self.to_clip_ms(end_ms),
        };
        (window.end_ms > window.start_ms).then_some(window)
    }
}

/// Zoom ramp in clip time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipKeyframe {
    pub window: ClipWindow,
    pub zoom_start: f64,
    pub zoom_end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipBroll {
    pub path: PathBuf,
    pub window: ClipWindow,
    /// Offset into the B-roll file, including any part of the layer cut by the trim.
    pub source_offset_ms: u64,
    pub rect: LayerRect,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipSticker {
    pub source: StickerSource,
    pub window: ClipWindow,
    pub rect: LayerRect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipWord {
    pub text: String,
    pub window: ClipWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipSegment {
    pub text: String,
    pub window: ClipWindow,
    pub words: Vec<ClipWord>,
    /// Whether the segment begins inside the trim window (an audible onset).
    pub starts_in_clip: bool,
}

/// A validated edit, with every time expressed in clip milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    pub source_path: PathBuf,
    pub trim_start_ms: u64,
    pub trim_end_ms: u64,
    /// Output duration (trim length divided by speed).
    pub duration_ms: u64,
    pub target_format: TargetFormat,
    pub speed: f64,
    pub mute: bool,
    pub volume: f64,
    pub color_filter: ColorFilter,
    pub keyframes: Vec<ClipKeyframe>,
    pub auto_zoom: bool,
    pub default_zoom: f64,
    pub subject_framing: bool,
    pub subject_count: usize,
    pub broll: Vec<ClipBroll>,
    pub stickers: Vec<ClipSticker>,
    pub segments: Vec<ClipSegment>,
    pub caption_style: CaptionStyle,
    pub hook_text: Option<String>,
    pub hook_duration_ms: u64,
    pub music: Option<AudioTrack>,
    pub enhance_audio: bool,
    pub sfx_enabled: bool,
    pub sfx_path: Option<PathBuf>,
    pub ducking_enabled: bool,
    pub watermark: Option<Watermark>,
}

impl ClipSpec {
    /// Validate `spec` and translate it to clip time.
    pub fn from_edit(spec: &EditSpec) -> ReelcutResult<Self> {
        validate(spec)?;

        let timeline = ClipTimeline::new(spec.trim_start_ms, spec.trim_end_ms, spec.speed);
        let duration_ms = timeline.duration_ms();
        if duration_ms == 0 {
            return Err(ReelcutError::graph(
                "Clip duration resolves to zero milliseconds",
            ));
        }

        let keyframes = spec
            .keyframes
            .iter()
            .filter_map(|kf| translate_keyframe(&timeline, spec.trim_start_ms, kf))
            .collect();

        let broll = spec
            .broll_layers
            .iter()
            .filter_map(|layer| {
                let window = timeline.window(layer.start_ms, layer.end_ms)?;
                let cut_ms = spec.trim_start_ms.saturating_sub(layer.start_ms);
                Some(ClipBroll {
                    path: layer.path.clone(),
                    window,
                    source_offset_ms: layer.source_offset_ms.saturating_add(cut_ms),
                    rect: layer.rect.unwrap_or(LayerRect::FULL).clamped(),
                    opacity: layer.opacity,
                })
            })
            .collect();

        let stickers = spec
            .sticker_layers
            .iter()
            .filter_map(|layer| {
                Some(ClipSticker {
                    source: layer.source.clone(),
                    window: timeline.window(layer.start_ms, layer.end_ms)?,
                    rect: layer.rect.clamped(),
                })
            })
            .collect();

        let segments = spec
            .text_segments
            .iter()
            .filter_map(|segment| translate_segment(&timeline, segment))
            .collect();

        Ok(Self {
            source_path: spec.source_path.clone(),
            trim_start_ms: spec.trim_start_ms,
            trim_end_ms: spec.trim_end_ms,
            duration_ms,
            target_format: spec.target_format,
            speed: spec.speed,
            mute: spec.mute,
            volume: spec.volume,
            color_filter: spec.color_filter,
            keyframes,
            auto_zoom: spec.auto_zoom,
            default_zoom: spec.default_zoom,
            subject_framing: spec.subject_framing,
            subject_count: spec.subject_count,
            broll,
            stickers,
            segments,
            caption_style: spec.caption_style.clone(),
            hook_text: spec
                .hook_text
                .as_ref()
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            hook_duration_ms: spec.hook_duration_ms,
            music: spec.audio_track.clone(),
            enhance_audio: spec.enhance_audio,
            sfx_enabled: spec.sfx_enabled,
            sfx_path: spec.sfx_path.clone(),
            ducking_enabled: spec.ducking_enabled,
            watermark: spec.watermark.clone(),
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }

    /// Trim length in source milliseconds.
    pub fn source_span_ms(&self) -> u64 {
        self.trim_end_ms - self.trim_start_ms
    }

    /// Clip times at which a caption segment begins.
    pub fn caption_onsets(&self) -> Vec<u64> {
        let mut onsets: Vec<u64> = self
            .segments
            .iter()
            .filter(|segment| segment.starts_in_clip)
            .map(|segment| segment.window.start_ms)
            .collect();
        onsets.sort_unstable();
        onsets.dedup();
        onsets
    }
}

fn translate_keyframe(
    timeline: &ClipTimeline,
    trim_start_ms: u64,
    kf: &ZoomKeyframe,
) -> Option<ClipKeyframe> {
    let window = timeline.window(kf.start_ms, kf.end_ms)?;
    // Re-derive the zoom at the trimmed edges so partially cut ramps stay continuous.
    let source_span = (kf.end_ms - kf.start_ms) as f64;
    let zoom_at_source = |t: u64| {
        let progress = (t.saturating_sub(kf.start_ms) as f64 / source_span).clamp(0.0, 1.0);
        kf.zoom_start + (kf.zoom_end - kf.zoom_start) * progress
    };
    let start_source = kf.start_ms.max(trim_start_ms);
    let end_source = kf.end_ms.min(timeline.trim_end_ms);
    Some(ClipKeyframe {
        window,
        zoom_start: zoom_at_source(start_source),
        zoom_end: zoom_at_source(end_source),
    })
}

fn translate_segment(timeline: &ClipTimeline, segment: &TextSegment) -> Option<ClipSegment> {
    let window = timeline.window(segment.start_ms, segment.end_ms)?;
    let words = segment
        .words
        .iter()
        .filter_map(|word| {
            let end = word.end_ms.max(word.start_ms.saturating_add(1));
            let word_window = timeline.window(word.start_ms, end)?;
            Some(ClipWord {
                text: word.text.clone(),
                window: ClipWindow {
                    start_ms: word_window.start_ms.clamp(window.start_ms, window.end_ms),
                    end_ms: word_window.end_ms.clamp(window.start_ms, window.end_ms),
                },
            })
        })
        .filter(|word| !word.text.trim().is_empty())
        .collect();

    Some(ClipSegment {
        text: segment.text.clone(),
        window,
        words,
        starts_in_clip: timeline.contains(segment.start_ms),
    })
}

fn validate(spec: &EditSpec) -> ReelcutResult<()> {
    if spec.trim_end_ms <= spec.trim_start_ms {
        return Err(ReelcutError::graph(format!(
            "trimEndMs ({}) must be greater than trimStartMs ({})",
            spec.trim_end_ms, spec.trim_start_ms
        )));
    }
    if !spec.speed.is_finite() || spec.speed <= 0.0 {
        return Err(ReelcutError::graph(format!(
            "speed must be a positive number, got {}",
            spec.speed
        )));
    }
    if !spec.volume.is_finite() || spec.volume < 0.0 {
        return Err(ReelcutError::graph(format!(
            "volume must be non-negative, got {}",
            spec.volume
        )));
    }
    if !spec.default_zoom.is_finite() || spec.default_zoom < 1.0 {
        return Err(ReelcutError::graph(format!(
            "defaultZoom must be at least 1.0, got {}",
            spec.default_zoom
        )));
    }
    if spec.subject_count == 0 || spec.subject_count > MAX_SUBJECTS {
        return Err(ReelcutError::graph(format!(
            "subjectCount must be between 1 and {MAX_SUBJECTS}, got {}",
            spec.subject_count
        )));
    }
    if let Some((field, value)) = spec.color_filter.out_of_range() {
        return Err(ReelcutError::graph(format!(
            "colorFilter.{field} out of range: {value}"
        )));
    }

    validate_keyframes(&spec.keyframes)?;

    for (i, layer) in spec.broll_layers.iter().enumerate() {
        check_range(&format!("brollLayers[{i}]"), layer.start_ms, layer.end_ms)?;
        check_unit(&format!("brollLayers[{i}].opacity"), layer.opacity)?;
        if let Some(rect) = &layer.rect {
            check_rect(&format!("brollLayers[{i}].rect"), rect)?;
        }
    }
    for (i, layer) in spec.sticker_layers.iter().enumerate() {
        check_range(&format!("stickerLayers[{i}]"), layer.start_ms, layer.end_ms)?;
        check_rect(&format!("stickerLayers[{i}].rect"), &layer.rect)?;
        if let StickerSource::DataUrl(url) = &layer.source {
            if !url.starts_with("data:image/") || !url.contains(";base64,") {
                return Err(ReelcutError::graph(format!(
                    "stickerLayers[{i}].source is not a base64 image data URL"
                )));
            }
        }
    }
    for (i, segment) in spec.text_segments.iter().enumerate() {
        check_range(&format!("textSegments[{i}]"), segment.start_ms, segment.end_ms)?;
        if let Some(word) = segment.words.iter().find(|w| w.end_ms < w.start_ms) {
            return Err(ReelcutError::graph(format!(
                "textSegments[{i}] word '{}' ends before it starts",
                word.text
            )));
        }
    }
    if let Some(track) = &spec.audio_track {
        if !track.volume.is_finite() || track.volume < 0.0 {
            return Err(ReelcutError::graph(format!(
                "audioTrack.volume must be non-negative, got {}",
                track.volume
            )));
        }
    }
    if let Some(watermark) = &spec.watermark {
        if !(watermark.width_ratio > 0.0 && watermark.width_ratio <= 1.0) {
            return Err(ReelcutError::graph(format!(
                "watermark.widthRatio must be in (0, 1], got {}",
                watermark.width_ratio
            )));
        }
        check_unit("watermark.opacity", watermark.opacity)?;
        check_unit("watermark.marginRatio", watermark.margin_ratio)?;
    }
    Ok(())
}

/// Keyframe windows may leave gaps but must not overlap.
fn validate_keyframes(keyframes: &[ZoomKeyframe]) -> ReelcutResult<()> {
    for (i, kf) in keyframes.iter().enumerate() {
        check_range(&format!("keyframes[{i}]"), kf.start_ms, kf.end_ms)?;
        for (name, zoom) in [("zoomStart", kf.zoom_start), ("zoomEnd", kf.zoom_end)] {
            if !zoom.is_finite() || zoom < 1.0 {
                return Err(ReelcutError::graph(format!(
                    "keyframes[{i}].{name} must be at least 1.0, got {zoom}"
                )));
            }
        }
    }

    let mut ordered: Vec<(usize, &ZoomKeyframe)> = keyframes.iter().enumerate().collect();
    ordered.sort_by_key(|(_, kf)| kf.start_ms);
    for pair in ordered.windows(2) {
        let (a_idx, a) = pair[0];
        let (b_idx, b) = pair[1];
        if b.start_ms < a.end_ms {
            return Err(ReelcutError::graph(format!(
                "keyframes[{a_idx}] ({}..{}ms) overlaps keyframes[{b_idx}] ({}..{}ms)",
                a.start_ms, a.end_ms, b.start_ms, b.end_ms
            )));
        }
    }
    Ok(())
}

fn check_range(what: &str, start_ms: u64, end_ms: u64) -> ReelcutResult<()> {
    if end_ms <= start_ms {
        return Err(ReelcutError::graph(format!(
            "{what}: endMs ({end_ms}) must be greater than startMs ({start_ms})"
        )));
    }
    Ok(())
}

fn check_unit(what: &str, value: f64) -> ReelcutResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ReelcutError::graph(format!(
            "{what} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

fn check_rect(what: &str, rect: &LayerRect) -> ReelcutResult<()> {
    let values = [rect.x, rect.y, rect.width, rect.height];
    if values.iter().any(|v| !v.is_finite()) || rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(ReelcutError::graph(format!(
            "{what} must have finite coordinates and a positive size"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BrollLayer, WordTiming};
    use proptest::prelude::*;

    fn base_spec() -> EditSpec {
        EditSpec::new("/media/in.mp4", 10_000, 20_000, TargetFormat::Portrait9x16)
    }

    #[test]
    fn test_rejects_inverted_trim() {
        let mut spec = base_spec();
        spec.trim_end_ms = spec.trim_start_ms;
        let err = ClipSpec::from_edit(&spec).unwrap_err();
        assert!(matches!(err, ReelcutError::GraphConstruction { .. }));
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let mut spec = base_spec();
        spec.speed = 0.0;
        assert!(ClipSpec::from_edit(&spec).is_err());
        spec.speed = f64::INFINITY;
        assert!(ClipSpec::from_edit(&spec).is_err());
    }

    #[test]
    fn test_rejects_overlapping_keyframes() {
        let mut spec = base_spec();
        spec.keyframes = vec![
            ZoomKeyframe {
                start_ms: 12_000,
                end_ms: 14_000,
                zoom_start: 1.0,
                zoom_end: 1.3,
            },
            ZoomKeyframe {
                start_ms: 13_500,
                end_ms: 15_000,
                zoom_start: 1.3,
                zoom_end: 1.0,
            },
        ];
        let err = ClipSpec::from_edit(&spec).unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_touching_keyframes_are_allowed() {
        let mut spec = base_spec();
        spec.keyframes = vec![
            ZoomKeyframe {
                start_ms: 12_000,
                end_ms: 14_000,
                zoom_start: 1.0,
                zoom_end: 1.3,
            },
            ZoomKeyframe {
                start_ms: 14_000,
                end_ms: 15_000,
                zoom_start: 1.3,
                zoom_end: 1.0,
            },
        ];
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.keyframes.len(), 2);
        assert_eq!(clip.keyframes[0].window.start_ms, 2_000);
        assert_eq!(clip.keyframes[1].window.end_ms, 5_000);
    }

    #[test]
    fn test_translation_subtracts_trim_and_divides_by_speed() {
        let mut spec = base_spec();
        spec.speed = 2.0;
        spec.text_segments.push(TextSegment {
            text: "Hello".to_string(),
            start_ms: 12_000,
            end_ms: 14_000,
            words: vec![],
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.duration_ms, 5_000);
        assert_eq!(
            clip.segments[0].window,
            ClipWindow {
                start_ms: 1_000,
                end_ms: 2_000
            }
        );
    }

    #[test]
    fn test_layers_outside_trim_are_dropped_and_edges_clamped() {
        let mut spec = base_spec();
        spec.broll_layers.push(BrollLayer {
            path: "/media/early.mp4".into(),
            start_ms: 1_000,
            end_ms: 5_000,
            source_offset_ms: 0,
            rect: None,
            opacity: 1.0,
        });
        spec.broll_layers.push(BrollLayer {
            path: "/media/straddle.mp4".into(),
            start_ms: 8_000,
            end_ms: 12_000,
            source_offset_ms: 500,
            rect: None,
            opacity: 1.0,
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.broll.len(), 1);
        assert_eq!(clip.broll[0].window.start_ms, 0);
        assert_eq!(clip.broll[0].window.end_ms, 2_000);
        assert_eq!(clip.broll[0].source_offset_ms, 2_500);
    }

    #[test]
    fn test_partially_trimmed_keyframe_interpolates_edges() {
        let mut spec = base_spec();
        spec.keyframes.push(ZoomKeyframe {
            start_ms: 8_000,
            end_ms: 12_000,
            zoom_start: 1.0,
            zoom_end: 2.0,
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        let kf = clip.keyframes[0];
        assert!((kf.zoom_start - 1.5).abs() < 1e-9);
        assert!((kf.zoom_end - 2.0).abs() < 1e-9);
        assert_eq!(kf.window.start_ms, 0);
    }

    #[test]
    fn test_onsets_only_for_segments_starting_inside_trim() {
        let mut spec = base_spec();
        for (start, end) in [(9_000, 11_000), (12_000, 13_000), (15_000, 16_000)] {
            spec.text_segments.push(TextSegment {
                text: "x".to_string(),
                start_ms: start,
                end_ms: end,
                words: vec![],
            });
        }
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.segments.len(), 3);
        assert_eq!(clip.caption_onsets(), vec![2_000, 5_000]);
    }

    #[test]
    fn test_words_clamped_into_segment() {
        let mut spec = base_spec();
        spec.text_segments.push(TextSegment {
            text: "Hi there".to_string(),
            start_ms: 11_000,
            end_ms: 12_000,
            words: vec![
                WordTiming {
                    text: "Hi".to_string(),
                    start_ms: 10_900,
                    end_ms: 11_400,
                },
                WordTiming {
                    text: "there".to_string(),
                    start_ms: 11_400,
                    end_ms: 12_300,
                },
            ],
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        let words = &clip.segments[0].words;
        assert_eq!(words[0].window.start_ms, 1_000);
        assert_eq!(words[1].window.end_ms, 2_000);
    }

    #[test]
    fn test_word_at_end_of_time_is_dropped() {
        let mut spec = base_spec();
        spec.text_segments.push(TextSegment {
            text: "late".to_string(),
            start_ms: 10_000,
            end_ms: 11_000,
            words: vec![WordTiming {
                text: "late".to_string(),
                start_ms: u64::MAX,
                end_ms: u64::MAX,
            }],
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.segments.len(), 1);
        assert!(clip.segments[0].words.is_empty());
    }

    #[test]
    fn test_huge_broll_offset_saturates() {
        let mut spec = base_spec();
        spec.broll_layers.push(BrollLayer {
            path: "/media/straddle.mp4".into(),
            start_ms: 8_000,
            end_ms: 12_000,
            source_offset_ms: u64::MAX - 5,
            rect: None,
            opacity: 1.0,
        });
        let clip = ClipSpec::from_edit(&spec).unwrap();
        assert_eq!(clip.broll[0].source_offset_ms, u64::MAX);
    }

    #[test]
    fn test_rejects_bad_subject_count_and_color() {
        let mut spec = base_spec();
        spec.subject_count = 4;
        assert!(ClipSpec::from_edit(&spec).is_err());

        let mut spec = base_spec();
        spec.color_filter.contrast = -1.0;
        let err = ClipSpec::from_edit(&spec).unwrap_err();
        assert!(err.to_string().contains("contrast"));
    }

    proptest! {
        #[test]
        fn prop_translated_windows_stay_inside_clip(
            trim_start in 0u64..100_000,
            trim_len in 1u64..100_000,
            speed in 0.25f64..4.0,
            layer_start in 0u64..250_000,
            layer_len in 1u64..50_000,
        ) {
            let timeline = ClipTimeline::new(trim_start, trim_start + trim_len, speed);
            if let Some(window) = timeline.window(layer_start, layer_start + layer_len) {
                prop_assert!(window.start_ms < window.end_ms);
                prop_assert!(window.end_ms <= timeline.duration_ms());
            }
        }
    }
}
