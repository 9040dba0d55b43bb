//! Locate subjects in a single frame.

use std::path::PathBuf;

use reelcut_common::{AppConfig, TempScope};
use reelcut_edit_model::MAX_SUBJECTS;
use reelcut_render_engine::probe_or_default;
use reelcut_subject_locator::SubjectLocator;

pub async fn run(config: AppConfig, video: PathBuf, at_ms: u64, count: usize) -> anyhow::Result<()> {
    if !(1..=MAX_SUBJECTS).contains(&count) {
        anyhow::bail!("--count must be between 1 and {MAX_SUBJECTS}");
    }
    if !video.exists() {
        anyhow::bail!("Video not found: {}", video.display());
    }

    let probe = probe_or_default(&config.render, &video).await;
    let locator = SubjectLocator::from_config(&config);
    let tiers: Vec<&str> = locator.tier_methods().into_iter().map(|m| m.as_str()).collect();

    println!("Locating {count} subject(s) in {} at {at_ms}ms", video.display());
    println!("  Frame: {}x{}", probe.width, probe.height);
    println!("  Tiers: {}", tiers.join(" -> "));

    let mut scope = TempScope::new()?;
    let regions = locator
        .locate(&video, at_ms, count, (probe.width, probe.height), &mut scope)
        .await;
    scope.cleanup();

    for (i, region) in regions.iter().enumerate() {
        println!(
            "  [{i}] x={:.0} y={:.0} confidence={:.2} ({})",
            region.center_x,
            region.center_y,
            region.confidence,
            region.method.as_str()
        );
    }

    Ok(())
}
