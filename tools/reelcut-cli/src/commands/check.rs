//! Check encoder availability and configuration.

use std::path::Path;
use std::process::Stdio;

use reelcut_common::{config_file_path, AppConfig};
use reelcut_render_engine::detect_encoder;
use reelcut_subject_locator::SubjectLocator;

async fn binary_version(binary: &Path) -> Option<String> {
    let output = tokio::process::Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    println!("Reelcut System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", path.display());
    }

    let mut ready = true;
    for (label, binary) in [
        ("Encoder", &config.render.ffmpeg_path),
        ("Probe", &config.render.ffprobe_path),
    ] {
        match binary_version(binary).await {
            Some(version) => println!("[OK] {label}: {version}"),
            None => {
                println!("[FAIL] {label}: {} not runnable", binary.display());
                ready = false;
            }
        }
    }

    if ready {
        let encoder = detect_encoder(&config.render.ffmpeg_path).await;
        let kind = if encoder.is_hardware() { "hardware" } else { "software" };
        println!("[OK] Video encoder: {} ({kind})", encoder.codec_name());
        if !config.render.prefer_hardware_encoder {
            println!("     Hardware encoding disabled in config; libx264 will be used");
        }
    }

    let tiers: Vec<&str> = SubjectLocator::from_config(&config)
        .tier_methods()
        .into_iter()
        .map(|m| m.as_str())
        .collect();
    println!("[OK] Subject locator tiers: {}", tiers.join(" -> "));
    if config.vision.credential().is_none() {
        println!("     Vision tier skipped: no credential configured");
    }

    match &config.render.sfx_path {
        Some(sfx) if sfx.exists() => println!("[OK] SFX: {}", sfx.display()),
        Some(sfx) => println!("[WARN] SFX: {} missing", sfx.display()),
        None => println!("[INFO] SFX: none configured"),
    }

    println!();
    if ready {
        println!("All required tools are available. Reelcut is ready.");
    } else {
        println!("Some required tools are missing. See above for fixes.");
    }

    Ok(())
}
