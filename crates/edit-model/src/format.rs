//! Output canvas formats.

use serde::{Deserialize, Serialize};

/// Fixed set of output aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetFormat {
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
    #[serde(rename = "1:1")]
    Square1x1,
    #[serde(rename = "4:5")]
    Portrait4x5,
}

impl TargetFormat {
    /// Canvas size in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            TargetFormat::Portrait9x16 => (1080, 1920),
            TargetFormat::Landscape16x9 => (1920, 1080),
            TargetFormat::Square1x1 => (1080, 1080),
            TargetFormat::Portrait4x5 => (1080, 1350),
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(self) -> f64 {
        let (w, h) = self.dimensions();
        w as f64 / h as f64
    }

    /// Short label safe for file names.
    pub fn slug(self) -> &'static str {
        match self {
            TargetFormat::Portrait9x16 => "9x16",
            TargetFormat::Landscape16x9 => "16x9",
            TargetFormat::Square1x1 => "1x1",
            TargetFormat::Portrait4x5 => "4x5",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "9:16" => Some(TargetFormat::Portrait9x16),
            "16:9" => Some(TargetFormat::Landscape16x9),
            "1:1" => Some(TargetFormat::Square1x1),
            "4:5" => Some(TargetFormat::Portrait4x5),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TargetFormat::Portrait9x16 => "9:16",
            TargetFormat::Landscape16x9 => "16:9",
            TargetFormat::Square1x1 => "1:1",
            TargetFormat::Portrait4x5 => "4:5",
        };
        f.write_str(label)
    }
}
