//! Compile an edit spec and print the encoder program.

use std::path::PathBuf;

use reelcut_common::{AppConfig, TempScope};
use reelcut_render_engine::Renderer;

pub async fn run(config: AppConfig, spec: PathBuf, json: bool) -> anyhow::Result<()> {
    let edit = super::load_spec(&spec)?;
    let renderer = Renderer::new(config);

    let mut scope = TempScope::new()?;
    let plan = renderer
        .plan(&edit, &mut scope)
        .await
        .map_err(|e| anyhow::anyhow!("Compilation failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let graph = &plan.program.graph;
    println!("Program for: {}", spec.display());
    println!(
        "  Source: {}x{}{}",
        plan.probe.width,
        plan.probe.height,
        if plan.probe.probed { "" } else { " (defaults)" }
    );
    println!("  Duration: {}ms", plan.program.duration_ms);
    println!("  Encoder: {}", plan.encoder.codec_name());
    println!("  Output: {}", plan.output_path.display());
    println!();

    println!("Inputs:");
    for (i, input) in graph.inputs.iter().enumerate() {
        println!("  [{i}] {} {}", input.options.join(" "), input.path.display());
    }
    println!();

    println!("Nodes:");
    for node in &graph.nodes {
        println!("  {:>3} {:<9} {node}", node.id, node.stage.as_str());
    }
    println!();

    println!("Encoder arguments:");
    println!("  {}", plan.args.join(" "));

    // Subtitle and sticker files only existed for this printout.
    scope.cleanup();
    Ok(())
}
