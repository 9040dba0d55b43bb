//! Show source geometry.

use std::path::PathBuf;

use reelcut_common::AppConfig;
use reelcut_render_engine::probe_media;

pub async fn run(config: AppConfig, video: PathBuf) -> anyhow::Result<()> {
    let probe = probe_media(&config.render.ffprobe_path, &video)
        .await
        .map_err(|e| anyhow::anyhow!("Probe failed: {e}"))?;

    println!("Source: {}", video.display());
    println!("  Resolution: {}x{}", probe.width, probe.height);
    match probe.duration_ms {
        Some(ms) => println!("  Duration: {:.3}s", ms as f64 / 1000.0),
        None => println!("  Duration: unknown"),
    }
    println!("  Audio: {}", if probe.has_audio { "yes" } else { "no" });

    Ok(())
}
