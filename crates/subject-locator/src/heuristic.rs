//! Luminance-variance heuristic.
//!
//! The frame is split into equal vertical columns. Busy columns (high luma
//! variance) are more likely to hold a subject than flat background.

use std::path::Path;

use async_trait::async_trait;
use image::GrayImage;
use reelcut_edit_model::{LocateMethod, SubjectRegion};

use crate::frame::FrameSample;
use crate::locator::LocatorTier;

/// Number of vertical columns the frame is split into.
pub const COLUMNS: usize = 3;

/// Sampling stride in pixels (both axes).
pub const SAMPLE_STRIDE: u32 = 4;

/// Columns below this total variance are treated as a blank frame.
const MIN_TOTAL_VARIANCE: f64 = 1e-3;

/// Luma variance of each of `columns` equal-width vertical strips.
pub fn column_variances(image: &GrayImage, columns: usize, stride: u32) -> Vec<f64> {
    let columns = columns.max(1);
    let stride = stride.max(1);
    let (width, height) = image.dimensions();
    let mut sums = vec![0.0f64; columns];
    let mut squares = vec![0.0f64; columns];
    let mut counts = vec![0u64; columns];

    for y in (0..height).step_by(stride as usize) {
        for x in (0..width).step_by(stride as usize) {
            let column = ((x as usize * columns) / width.max(1) as usize).min(columns - 1);
            let luma = image.get_pixel(x, y).0[0] as f64;
            sums[column] += luma;
            squares[column] += luma * luma;
            counts[column] += 1;
        }
    }

    (0..columns)
        .map(|c| {
            if counts[c] == 0 {
                return 0.0;
            }
            let n = counts[c] as f64;
            let mean = sums[c] / n;
            (squares[c] / n - mean * mean).max(0.0)
        })
        .collect()
}

/// Pick the `count` busiest columns, returned in left-to-right order.
///
/// Ranking decides *which* columns survive; the original index decides the
/// output order.
pub fn pick_columns(variances: &[f64], count: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..variances.len()).collect();
    // Stable: equal variances keep left-to-right precedence.
    ranked.sort_by(|&a, &b| variances[b].total_cmp(&variances[a]));
    ranked.truncate(count);
    ranked.sort_unstable();
    ranked
}

/// Turn a luma image into regions in source pixel space.
pub fn regions_from_image(
    image: &GrayImage,
    source_width: u32,
    source_height: u32,
    count: usize,
) -> Option<Vec<SubjectRegion>> {
    let variances = column_variances(image, COLUMNS, SAMPLE_STRIDE);
    let total: f64 = variances.iter().sum();
    if total < MIN_TOTAL_VARIANCE {
        return None;
    }

    let column_width = source_width as f64 / COLUMNS as f64;
    let regions = pick_columns(&variances, count)
        .into_iter()
        .map(|c| SubjectRegion {
            center_x: column_width * (c as f64 + 0.5),
            center_y: source_height as f64 / 2.0,
            confidence: variances[c] / total,
            method: LocateMethod::Heuristic,
        })
        .collect();
    Some(regions)
}

/// Decode a still and run [`regions_from_image`] on it.
fn locate_in_file(
    path: &Path,
    source_width: u32,
    source_height: u32,
    count: usize,
) -> Option<Vec<SubjectRegion>> {
    let image = match image::open(path) {
        Ok(image) => image.to_luma8(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Heuristic tier could not decode still");
            return None;
        }
    };
    regions_from_image(&image, source_width, source_height, count)
}

/// Column-variance tier.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicTier;

#[async_trait]
impl LocatorTier for HeuristicTier {
    fn method(&self) -> LocateMethod {
        LocateMethod::Heuristic
    }

    async fn locate(&self, frame: &FrameSample, count: usize) -> Option<Vec<SubjectRegion>> {
        let still = frame.still.clone()?;
        let (width, height) = (frame.source_width, frame.source_height);
        tokio::task::spawn_blocking(move || locate_in_file(&still, width, height, count))
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// 300x100 image; the given column gets a checkerboard, the rest stay flat.
    fn image_with_busy_columns(busy: &[usize]) -> GrayImage {
        GrayImage::from_fn(300, 100, |x, y| {
            let column = (x / 100) as usize;
            if busy.contains(&column) && ((x / 4 + y / 4) % 2 == 0) {
                Luma([255])
            } else {
                Luma([40])
            }
        })
    }

    #[test]
    fn test_busy_column_has_highest_variance() {
        let image = image_with_busy_columns(&[2]);
        let variances = column_variances(&image, 3, 4);
        assert!(variances[2] > variances[0]);
        assert!(variances[2] > variances[1]);
        assert!(variances[0].abs() < 1e-9);
    }

    #[test]
    fn test_pick_columns_resorts_by_position() {
        // Right column is busiest, then left: output must still be left, right.
        assert_eq!(pick_columns(&[50.0, 10.0, 90.0], 2), vec![0, 2]);
        assert_eq!(pick_columns(&[50.0, 10.0, 90.0], 1), vec![2]);
        assert_eq!(pick_columns(&[50.0, 10.0, 90.0], 5), vec![0, 1, 2]);
    }

    #[test]
    fn test_regions_scaled_to_source_pixels() {
        let image = image_with_busy_columns(&[0, 2]);
        let regions = regions_from_image(&image, 1920, 1080, 2).unwrap();
        assert_eq!(regions.len(), 2);
        assert!((regions[0].center_x - 320.0).abs() < 1e-9);
        assert!((regions[1].center_x - 1600.0).abs() < 1e-9);
        assert!((regions[0].center_y - 540.0).abs() < 1e-9);
        assert!(regions.iter().all(|r| r.method == LocateMethod::Heuristic));
    }

    #[test]
    fn test_flat_frame_fails_tier() {
        let image = GrayImage::from_pixel(300, 100, Luma([128]));
        assert!(regions_from_image(&image, 1920, 1080, 1).is_none());
    }

    #[tokio::test]
    async fn test_tier_reads_still_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image_with_busy_columns(&[1]).save(&path).unwrap();
        let frame = FrameSample {
            still: Some(path),
            source_width: 1920,
            source_height: 1080,
        };
        let regions = HeuristicTier.locate(&frame, 1).await.unwrap();
        assert!((regions[0].center_x - 960.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_tier_without_still_fails() {
        let frame = FrameSample::without_still(1920, 1080);
        assert!(HeuristicTier.locate(&frame, 1).await.is_none());
    }
}
