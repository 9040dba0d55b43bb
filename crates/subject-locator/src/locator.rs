//! Tier chain.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelcut_common::{AppConfig, TempScope};
use reelcut_edit_model::{normalize_regions, LocateMethod, SubjectRegion};

use crate::frame::{extract_still, FrameSample};
use crate::heuristic::HeuristicTier;
use crate::vision::VisionTier;

/// One strategy for finding subjects in a frame.
///
/// Returning `None` (or an empty list) hands control to the next tier.
#[async_trait]
pub trait LocatorTier: Send + Sync {
    fn method(&self) -> LocateMethod;

    /// Whether the tier reads [`FrameSample::still`].
    fn needs_still(&self) -> bool {
        true
    }

    async fn locate(&self, frame: &FrameSample, count: usize) -> Option<Vec<SubjectRegion>>;
}

/// Evenly spaced centers. Always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct CenterFallback;

#[async_trait]
impl LocatorTier for CenterFallback {
    fn method(&self) -> LocateMethod {
        LocateMethod::Fallback
    }

    fn needs_still(&self) -> bool {
        false
    }

    async fn locate(&self, frame: &FrameSample, count: usize) -> Option<Vec<SubjectRegion>> {
        Some(SubjectRegion::evenly_spaced(
            frame.source_width,
            frame.source_height,
            count,
        ))
    }
}

/// Runs tiers in order and stops at the first usable answer.
pub struct SubjectLocator {
    ffmpeg: PathBuf,
    tiers: Vec<Box<dyn LocatorTier>>,
}

impl SubjectLocator {
    /// A locator with no tiers; every call resolves to the center fallback.
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            tiers: Vec::new(),
        }
    }

    /// Standard chain: vision (when a credential is set), heuristic, center.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut locator = Self::new(&config.render.ffmpeg_path);
        match VisionTier::from_config(&config.vision) {
            Some(vision) => locator = locator.with_tier(Box::new(vision)),
            None => tracing::debug!("No vision credential configured; skipping vision tier"),
        }
        locator
            .with_tier(Box::new(HeuristicTier))
            .with_tier(Box::new(CenterFallback))
    }

    pub fn with_tier(mut self, tier: Box<dyn LocatorTier>) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Methods of the configured tiers, in the order they run.
    pub fn tier_methods(&self) -> Vec<LocateMethod> {
        self.tiers.iter().map(|tier| tier.method()).collect()
    }

    /// Locate `count` subjects in the frame at `frame_time_ms`.
    ///
    /// Never fails: the result always has exactly `count` regions ordered
    /// left to right, in source pixels.
    pub async fn locate(
        &self,
        source: &Path,
        frame_time_ms: u64,
        count: usize,
        source_size: (u32, u32),
        scope: &mut TempScope,
    ) -> Vec<SubjectRegion> {
        let (source_width, source_height) = source_size;
        let mut frame = FrameSample::without_still(source_width, source_height);

        if self.tiers.iter().any(|tier| tier.needs_still()) {
            match extract_still(&self.ffmpeg, source, frame_time_ms, scope).await {
                Ok(still) => frame.still = Some(still),
                Err(e) => tracing::warn!(error = %e, "Still extraction failed; image tiers will be skipped"),
            }
        }

        self.locate_in_frame(&frame, count).await
    }

    /// Run the tier chain over an already sampled frame.
    pub async fn locate_in_frame(&self, frame: &FrameSample, count: usize) -> Vec<SubjectRegion> {
        let count = count.max(1);
        for tier in &self.tiers {
            let method = tier.method();
            if tier.needs_still() && frame.still.is_none() {
                tracing::debug!(tier = method.as_str(), "Skipping tier without a still frame");
                continue;
            }
            match tier.locate(frame, count).await {
                Some(regions) => {
                    if let Some(regions) = normalize_regions(regions, count) {
                        tracing::info!(
                            tier = method.as_str(),
                            count,
                            "Subjects located"
                        );
                        return regions;
                    }
                    tracing::debug!(tier = method.as_str(), "Tier returned no regions");
                }
                None => tracing::debug!(tier = method.as_str(), "Tier failed"),
            }
        }

        tracing::info!(count, "All tiers failed; using center fallback");
        SubjectRegion::evenly_spaced(frame.source_width, frame.source_height, count)
    }
}
