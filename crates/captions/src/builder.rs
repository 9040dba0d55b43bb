//! Caption cue generation.
//!
//! Word-timed segments become one cue per word. Each cue shows the whole
//! segment with three color states:
//!
//! ```text
//!   spoken      active        upcoming
//!   text color  highlight     text color, 50% alpha
//!               + scale pulse
//! ```
//!
//! Segments without word timing become a single cue with a pop-in.

use reelcut_common::ReelcutResult;
use reelcut_edit_model::{CaptionPosition, CaptionStyle, ClipSegment, ClipSpec};

use crate::ass::{
    ass_color, escape_text, AssStyle, SubtitleCue, SubtitleFile, CAPTION_STYLE, HOOK_STYLE,
};

/// Alpha applied to words not yet spoken.
const UPCOMING_ALPHA: &str = "&H80&";

/// Pop-in length for segments without word timing.
const POP_IN_MS: u64 = 120;

/// Hook text is this much larger than captions.
const HOOK_SCALE: f64 = 1.15;

/// Headline shown from the start of the clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCue {
    pub text: String,
    pub end_ms: u64,
}

/// Builds a [`SubtitleFile`] for one canvas and caption style.
#[derive(Debug, Clone)]
pub struct SubtitleTrackBuilder {
    style: CaptionStyle,
    canvas: (u32, u32),
    text_color: String,
    highlight_color: String,
    outline_color: String,
}

impl SubtitleTrackBuilder {
    /// Validates the style colors up front.
    pub fn new(style: &CaptionStyle, canvas: (u32, u32)) -> ReelcutResult<Self> {
        Ok(Self {
            text_color: ass_color(&style.text_color)?,
            highlight_color: ass_color(&style.highlight_color)?,
            outline_color: ass_color(&style.outline_color)?,
            style: style.clone(),
            canvas,
        })
    }

    /// Build the track for a translated clip: captions plus the optional hook.
    pub fn for_clip(clip: &ClipSpec) -> ReelcutResult<SubtitleFile> {
        let builder = Self::new(&clip.caption_style, clip.target_format.dimensions())?;
        let hook = clip.hook_text.as_ref().map(|text| HookCue {
            text: text.clone(),
            end_ms: clip.hook_duration_ms.min(clip.duration_ms),
        });
        Ok(builder.build(&clip.segments, hook.as_ref()))
    }

    pub fn build(&self, segments: &[ClipSegment], hook: Option<&HookCue>) -> SubtitleFile {
        let mut cues = Vec::new();

        if let Some(hook) = hook.filter(|hook| hook.end_ms > 0) {
            cues.push(SubtitleCue {
                start_ms: 0,
                end_ms: hook.end_ms,
                style_id: HOOK_STYLE.to_string(),
                rendered_text: escape_text(&self.case(&hook.text)),
            });
        }

        for segment in segments {
            if segment.words.is_empty() {
                cues.extend(self.segment_cue(segment));
            } else {
                cues.extend(self.word_cues(segment));
            }
        }

        tracing::debug!(cues = cues.len(), "Built subtitle track");

        SubtitleFile {
            play_res_x: self.canvas.0,
            play_res_y: self.canvas.1,
            styles: vec![self.caption_style(), self.hook_style()],
            cues,
        }
    }

    fn case(&self, text: &str) -> String {
        if self.style.uppercase {
            text.to_uppercase()
        } else {
            text.to_string()
        }
    }

    fn segment_cue(&self, segment: &ClipSegment) -> Option<SubtitleCue> {
        if segment.window.duration_ms() == 0 {
            return None;
        }
        let pop = POP_IN_MS.min(segment.window.duration_ms());
        Some(SubtitleCue {
            start_ms: segment.window.start_ms,
            end_ms: segment.window.end_ms,
            style_id: CAPTION_STYLE.to_string(),
            rendered_text: format!(
                "{{\\fscx80\\fscy80\\t(0,{pop},\\fscx100\\fscy100)}}{}",
                escape_text(&self.case(&segment.text))
            ),
        })
    }

    fn word_cues(&self, segment: &ClipSegment) -> Vec<SubtitleCue> {
        let bounds = word_boundaries(segment);
        let words: Vec<String> = segment
            .words
            .iter()
            .map(|word| escape_text(&self.case(word.text.trim())))
            .collect();

        (0..words.len())
            .filter(|&i| bounds[i + 1] > bounds[i])
            .map(|active| {
                let pulse_ms = segment.words[active].window.duration_ms() / 2;
                let text = words
                    .iter()
                    .enumerate()
                    .map(|(j, word)| self.styled_word(word, j.cmp(&active), pulse_ms))
                    .collect::<Vec<_>>()
                    .join(" ");
                SubtitleCue {
                    start_ms: bounds[active],
                    end_ms: bounds[active + 1],
                    style_id: CAPTION_STYLE.to_string(),
                    rendered_text: text,
                }
            })
            .collect()
    }

    fn styled_word(&self, word: &str, position: std::cmp::Ordering, pulse_ms: u64) -> String {
        use std::cmp::Ordering::*;
        match position {
            Less => format!("{{\\r}}{word}"),
            Greater => format!("{{\\r\\1a{UPCOMING_ALPHA}}}{word}"),
            Equal if pulse_ms == 0 => {
                format!("{{\\r\\1c{}&}}{word}", self.highlight_color)
            }
            Equal => {
                let rise = pulse_ms / 2;
                let scale = self.style.highlight_scale;
                format!(
                    "{{\\r\\1c{}&\\t(0,{rise},\\fscx{scale}\\fscy{scale})\\t({rise},{pulse_ms},\\fscx100\\fscy100)}}{word}",
                    self.highlight_color
                )
            }
        }
    }

    fn alignment(&self) -> u8 {
        match self.style.position {
            CaptionPosition::Bottom => 2,
            CaptionPosition::Center => 5,
            CaptionPosition::Top => 8,
        }
    }

    fn caption_style(&self) -> AssStyle {
        AssStyle {
            name: CAPTION_STYLE.to_string(),
            font_name: self.style.font_name.clone(),
            font_size: self.style.font_size,
            primary_colour: self.text_color.clone(),
            secondary_colour: self.highlight_color.clone(),
            outline_colour: self.outline_color.clone(),
            back_colour: "&H64000000".to_string(),
            bold: true,
            outline: self.style.outline_width,
            shadow: 0.0,
            alignment: self.alignment(),
            margin_h: self.canvas.0 / 18,
            margin_v: self.style.margin_v,
        }
    }

    fn hook_style(&self) -> AssStyle {
        AssStyle {
            name: HOOK_STYLE.to_string(),
            font_size: (self.style.font_size as f64 * HOOK_SCALE).round() as u32,
            alignment: 8,
            margin_v: self.canvas.1 / 10,
            shadow: 2.0,
            ..self.caption_style()
        }
    }
}

/// Cue boundaries for a word-timed segment.
///
/// `b[0] = segment start`, `b[i] = clamp(word[i].start, b[i-1], segment end)`,
/// `b[n] = segment end`. Word `i` is active over `[b[i], b[i+1])`, so the
/// cues tile the segment with no gaps or overlaps.
pub fn word_boundaries(segment: &ClipSegment) -> Vec<u64> {
    let start = segment.window.start_ms;
    let end = segment.window.end_ms;
    let mut bounds = Vec::with_capacity(segment.words.len() + 1);
    bounds.push(start);
    for word in segment.words.iter().skip(1) {
        let previous = *bounds.last().unwrap_or(&start);
        bounds.push(word.window.start_ms.clamp(previous, end));
    }
    bounds.push(end);
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reelcut_edit_model::{ClipWindow, ClipWord};

    fn window(start_ms: u64, end_ms: u64) -> ClipWindow {
        ClipWindow { start_ms, end_ms }
    }

    fn segment(start: u64, end: u64, words: &[(&str, u64, u64)]) -> ClipSegment {
        ClipSegment {
            text: words
                .iter()
                .map(|(w, _, _)| *w)
                .collect::<Vec<_>>()
                .join(" "),
            window: window(start, end),
            words: words
                .iter()
                .map(|(text, s, e)| ClipWord {
                    text: text.to_string(),
                    window: window(*s, *e),
                })
                .collect(),
            starts_in_clip: true,
        }
    }

    fn builder() -> SubtitleTrackBuilder {
        SubtitleTrackBuilder::new(&CaptionStyle::default(), (1080, 1920)).unwrap()
    }

    #[test]
    fn test_one_cue_per_word_with_three_states() {
        let seg = segment(1_000, 2_000, &[("one", 1_000, 1_300), ("two", 1_300, 1_600), ("three", 1_600, 2_000)]);
        let file = builder().build(&[seg], None);
        assert_eq!(file.cues.len(), 3);

        let middle = &file.cues[1].rendered_text;
        assert_eq!(file.cues[1].start_ms, 1_300);
        assert_eq!(file.cues[1].end_ms, 1_600);
        assert!(middle.starts_with("{\\r}one "));
        assert!(middle.contains("{\\r\\1c&H0000E0FF&\\t(0,75,\\fscx115\\fscy115)\\t(75,150,\\fscx100\\fscy100)}two"));
        assert!(middle.ends_with("{\\r\\1a&H80&}three"));
    }

    #[test]
    fn test_pulse_tracks_word_duration() {
        let seg = segment(0, 1_000, &[("slow", 0, 800), ("fast", 800, 1_000)]);
        let file = builder().build(&[seg], None);
        assert!(file.cues[0].rendered_text.contains("\\t(200,400,"));
        assert!(file.cues[1].rendered_text.contains("\\t(50,100,"));
    }

    #[test]
    fn test_segment_without_words_pops_in() {
        let seg = segment(500, 2_500, &[]);
        let seg = ClipSegment {
            text: "Hello {world}".to_string(),
            ..seg
        };
        let file = builder().build(&[seg], None);
        assert_eq!(file.cues.len(), 1);
        assert_eq!(
            file.cues[0].rendered_text,
            "{\\fscx80\\fscy80\\t(0,120,\\fscx100\\fscy100)}Hello (world)"
        );
    }

    #[test]
    fn test_hook_cue_uses_hook_style() {
        let hook = HookCue {
            text: "Wait for it".to_string(),
            end_ms: 3_000,
        };
        let file = builder().build(&[], Some(&hook));
        assert_eq!(file.cues.len(), 1);
        assert_eq!(file.cues[0].style_id, HOOK_STYLE);
        assert_eq!(file.cues[0].end_ms, 3_000);
        let ass = file.to_ass();
        assert!(ass.contains("Style: Hook,Montserrat,83,"));
    }

    #[test]
    fn test_uppercase_and_position() {
        let style = CaptionStyle {
            uppercase: true,
            position: CaptionPosition::Top,
            ..CaptionStyle::default()
        };
        let builder = SubtitleTrackBuilder::new(&style, (1080, 1080)).unwrap();
        let file = builder.build(&[segment(0, 500, &[("hey", 0, 500)])], None);
        assert!(file.cues[0].rendered_text.ends_with("HEY"));
        assert_eq!(file.styles[0].alignment, 8);
    }

    #[test]
    fn test_invalid_color_rejected() {
        let style = CaptionStyle {
            highlight_color: "yellow".to_string(),
            ..CaptionStyle::default()
        };
        assert!(SubtitleTrackBuilder::new(&style, (1080, 1920)).is_err());
    }

    #[test]
    fn test_overlapping_word_starts_skip_empty_cues() {
        // Third word starts before the second; its cue collapses to zero length.
        let seg = segment(0, 1_000, &[("a", 0, 600), ("b", 700, 900), ("c", 300, 1_000)]);
        assert_eq!(word_boundaries(&seg), vec![0, 700, 700, 1_000]);

        let file = builder().build(&[seg], None);
        assert_eq!(file.cues.len(), 2);
        assert_eq!((file.cues[0].start_ms, file.cues[0].end_ms), (0, 700));
        assert_eq!((file.cues[1].start_ms, file.cues[1].end_ms), (700, 1_000));
        assert!(file.cues[1].rendered_text.contains("\\1c&H0000E0FF&"));
        assert!(file.cues[1].rendered_text.ends_with("c"));
    }

    proptest! {
        #[test]
        fn prop_word_cues_tile_segment(
            start in 0u64..10_000,
            len in 1u64..10_000,
            offsets in proptest::collection::vec(0u64..12_000, 1..8),
        ) {
            let end = start + len;
            let words: Vec<(&str, u64, u64)> = offsets
                .iter()
                .map(|o| ("w", start + o, start + o + 100))
                .collect();
            let seg = segment(start, end, &words);
            let file = builder().build(std::slice::from_ref(&seg), None);

            prop_assert!(!file.cues.is_empty());
            prop_assert_eq!(file.cues[0].start_ms, start);
            prop_assert_eq!(file.cues.last().unwrap().end_ms, end);
            for pair in file.cues.windows(2) {
                prop_assert_eq!(pair[0].end_ms, pair[1].start_ms);
            }
            prop_assert!(file.cues.iter().all(|c| c.end_ms > c.start_ms));
        }
    }
}
