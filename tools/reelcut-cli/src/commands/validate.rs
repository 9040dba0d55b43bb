//! Validate an edit spec.

use std::path::PathBuf;

use reelcut_captions::SubtitleTrackBuilder;
use reelcut_edit_model::ClipSpec;

pub fn run(spec: PathBuf) -> anyhow::Result<()> {
    println!("Validating edit spec: {}", spec.display());

    let edit = super::load_spec(&spec)?;
    let clip = ClipSpec::from_edit(&edit).map_err(|e| anyhow::anyhow!("Invalid edit: {e}"))?;
    let subtitles =
        SubtitleTrackBuilder::for_clip(&clip).map_err(|e| anyhow::anyhow!("Invalid captions: {e}"))?;

    println!("  Source: {}", clip.source_path.display());
    println!(
        "  Format: {} ({}x{})",
        clip.target_format,
        clip.target_format.dimensions().0,
        clip.target_format.dimensions().1
    );
    println!("  Clip duration: {}ms (speed {})", clip.duration_ms, clip.speed);
    println!("  Zoom keyframes: {}", clip.keyframes.len());
    println!("  B-roll layers: {}", clip.broll.len());
    println!("  Sticker layers: {}", clip.stickers.len());
    println!("  Caption cues: {}", subtitles.cues.len());
    println!("  Music: {}", if clip.music.is_some() { "yes" } else { "no" });

    let errors = edit.validate_sources();
    if errors.is_empty() {
        println!("  Sources: All present");
        println!("\nEdit is valid.");
    } else {
        println!("\nValidation issues:");
        for error in &errors {
            println!("  - {error}");
        }
        println!("\n{} issue(s) found. Rendering will fail.", errors.len());
    }

    Ok(())
}
