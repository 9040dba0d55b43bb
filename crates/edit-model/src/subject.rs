//! Subject regions used to anchor cropping.

use serde::{Deserialize, Serialize};

/// How a subject region was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocateMethod {
    Vision,
    Heuristic,
    Fallback,
}

impl LocateMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            LocateMethod::Vision => "vision",
            LocateMethod::Heuristic => "heuristic",
            LocateMethod::Fallback => "fallback",
        }
    }
}

/// A point of visual interest, in **source pixel** coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRegion {
    pub center_x: f64,
    pub center_y: f64,
    /// `[0, 1]`; zero for fallback regions.
    pub confidence: f64,
    pub method: LocateMethod,
}

impl SubjectRegion {
    /// `count` centers spread evenly across the frame width, vertically centered.
    pub fn evenly_spaced(width: u32, height: u32, count: usize) -> Vec<SubjectRegion> {
        let count = count.max(1);
        (0..count)
            .map(|i| SubjectRegion {
                center_x: width as f64 * (2 * i + 1) as f64 / (2 * count) as f64,
                center_y: height as f64 / 2.0,
                confidence: 0.0,
                method: LocateMethod::Fallback,
            })
            .collect()
    }
}

/// Enforce the locator output contract: left-to-right by `center_x`, exactly
/// `count` entries, padding by repeating the last region.
///
/// Returns `None` when `regions` is empty; there is nothing to duplicate.
pub fn normalize_regions(
    mut regions: Vec<SubjectRegion>,
    count: usize,
) -> Option<Vec<SubjectRegion>> {
    if regions.is_empty() {
        return None;
    }
    regions.sort_by(|a, b| a.center_x.total_cmp(&b.center_x));
    regions.truncate(count.max(1));
    while regions.len() < count {
        let last = *regions.last()?;
        regions.push(last);
    }
    Some(regions)
}

/// Whether `regions` is ordered left-to-right.
pub fn is_left_to_right(regions: &[SubjectRegion]) -> bool {
    regions
        .windows(2)
        .all(|pair| pair[0].center_x <= pair[1].center_x)
}
