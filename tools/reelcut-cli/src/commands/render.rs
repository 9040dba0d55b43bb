//! Render an edit spec to video.

use std::io::Write;
use std::path::PathBuf;

use reelcut_common::AppConfig;
use reelcut_render_engine::{cancel_pair, ProgressCallback, RenderProgress, Renderer};

pub async fn run(config: AppConfig, spec: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    println!("Rendering edit spec: {}", spec.display());

    let mut edit = super::load_spec(&spec)?;
    if output.is_some() {
        edit.output_path = output;
    }

    println!("  Source: {}", edit.source_path.display());
    println!("  Format: {}", edit.target_format);
    println!(
        "  Trim: {}ms - {}ms",
        edit.trim_start_ms, edit.trim_end_ms
    );

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; cancelling render");
            handle.cancel();
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: RenderProgress| {
        let eta = p
            .eta_secs
            .map(|eta| format!(", ETA: {eta:.0}s"))
            .unwrap_or_default();
        print!("\r  Progress: {:>5.1}% ({:?}{eta})    ", p.percent, p.stage);
        let _ = std::io::stdout().flush();
    });

    let renderer = Renderer::new(config);
    match renderer.render(&edit, Some(progress_cb), Some(signal)).await {
        Ok(path) => {
            println!("\nRender complete: {}", path.display());
            Ok(())
        }
        Err(e) => {
            println!();
            Err(anyhow::anyhow!("Render failed: {e}"))
        }
    }
}
