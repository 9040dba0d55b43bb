//! Advanced SubStation Alpha (ASS) document model and writer.

use std::path::Path;

use reelcut_common::{ReelcutError, ReelcutResult};
use serde::Serialize;

/// Style name used for caption cues.
pub const CAPTION_STYLE: &str = "Caption";
/// Style name used for the hook headline.
pub const HOOK_STYLE: &str = "Hook";

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// One `Style:` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    /// `&HAABBGGRR`
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub outline: f64,
    pub shadow: f64,
    /// Numpad alignment (2 = bottom center, 5 = middle, 8 = top center).
    pub alignment: u8,
    pub margin_h: u32,
    pub margin_v: u32,
}

impl AssStyle {
    fn to_line(&self) -> String {
        format!(
            "Style: {},{},{},{},{},{},{},{},0,0,0,100,100,0,0,1,{:.1},{:.1},{},{},{},{},1",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.secondary_colour,
            self.outline_colour,
            self.back_colour,
            if self.bold { -1 } else { 0 },
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_h,
            self.margin_h,
            self.margin_v,
        )
    }
}

/// One `Dialogue:` event in clip time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleCue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub style_id: String,
    /// Escaped text including override tags.
    pub rendered_text: String,
}

/// A complete subtitle track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleFile {
    pub play_res_x: u32,
    pub play_res_y: u32,
    pub styles: Vec<AssStyle>,
    pub cues: Vec<SubtitleCue>,
}

impl SubtitleFile {
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Render the document.
    pub fn to_ass(&self) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        out.push_str(&format!("PlayResX: {}\n", self.play_res_x));
        out.push_str(&format!("PlayResY: {}\n", self.play_res_y));
        out.push_str("WrapStyle: 0\n");
        out.push_str("ScaledBorderAndShadow: yes\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str(STYLE_FORMAT);
        out.push('\n');
        for style in &self.styles {
            out.push_str(&style.to_line());
            out.push('\n');
        }
        out.push('\n');

        out.push_str("[Events]\n");
        out.push_str(EVENT_FORMAT);
        out.push('\n');
        for cue in &self.cues {
            out.push_str(&format!(
                "Dialogue: 0,{},{},{},,0,0,0,,{}\n",
                format_timestamp(cue.start_ms),
                format_timestamp(cue.end_ms),
                cue.style_id,
                cue.rendered_text,
            ));
        }
        out
    }

    /// Write the document to `path`.
    pub fn save(&self, path: &Path) -> ReelcutResult<()> {
        std::fs::write(path, self.to_ass())?;
        Ok(())
    }
}

/// Format milliseconds as an ASS timestamp: `H:MM:SS.cc`.
pub fn format_timestamp(ms: u64) -> String {
    let centis = ms / 10;
    let hours = centis / 360_000;
    let minutes = (centis % 360_000) / 6_000;
    let seconds = (centis % 6_000) / 100;
    let cs = centis % 100;
    format!("{hours}:{minutes:02}:{seconds:02}.{cs:02}")
}

/// Convert `#RRGGBB` to ASS `&H00BBGGRR`.
pub fn ass_color(hex: &str) -> ReelcutResult<String> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ReelcutError::graph(format!(
            "Invalid caption color '{hex}', expected #RRGGBB"
        )));
    }
    let upper = digits.to_ascii_uppercase();
    let (r, g, b) = (&upper[0..2], &upper[2..4], &upper[4..6]);
    Ok(format!("&H00{b}{g}{r}"))
}

/// Make user text safe for a `Dialogue:` line.
///
/// Braces would open override blocks and backslashes would start tags.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '{' => out.push('('),
            '}' => out.push(')'),
            '\\' => out.push('/'),
            '\r' => {}
            '\n' => out.push_str("\\N"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(0), "0:00:00.00");
        assert_eq!(format_timestamp(1_234), "0:00:01.23");
        assert_eq!(format_timestamp(3_723_456), "1:02:03.45");
        assert_eq!(format_timestamp(59_999), "0:00:59.99");
    }

    #[test]
    fn test_color_conversion() {
        assert_eq!(ass_color("#FFE000").unwrap(), "&H0000E0FF");
        assert_eq!(ass_color("#0a0B0c").unwrap(), "&H000C0B0A");
        assert!(ass_color("#FFF").is_err());
        assert!(ass_color("#GG0000").is_err());
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a{b}c"), "a(b)c");
        assert_eq!(escape_text("line one\r\nline two"), "line one\\Nline two");
        assert_eq!(escape_text("\\fs99 big"), "/fs99 big");
    }

    #[test]
    fn test_document_layout() {
        let file = SubtitleFile {
            play_res_x: 1080,
            play_res_y: 1920,
            styles: vec![],
            cues: vec![SubtitleCue {
                start_ms: 0,
                end_ms: 1_500,
                style_id: CAPTION_STYLE.to_string(),
                rendered_text: "Hello".to_string(),
            }],
        };
        let text = file.to_ass();
        assert!(text.starts_with("[Script Info]\n"));
        assert!(text.contains("PlayResX: 1080\nPlayResY: 1920\n"));
        assert!(text.contains("Dialogue: 0,0:00:00.00,0:00:01.50,Caption,,0,0,0,,Hello\n"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.ass");
        file.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }
}
