//! Reelcut CLI — compile and render short-form edits.
//!
//! Usage:
//!   reelcut render <SPEC>       Render an edit spec to video
//!   reelcut compile <SPEC>      Print the compiled program without encoding
//!   reelcut validate <SPEC>     Validate an edit spec
//!   reelcut locate <VIDEO>      Locate subjects in one frame
//!   reelcut probe <VIDEO>       Show source geometry
//!   reelcut check               Check encoder and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelcut_common::LoggingConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "reelcut",
    about = "Compile structured edits into a single encoder run",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an edit spec to video
    Render {
        /// Path to the edit spec (JSON)
        spec: PathBuf,

        /// Output file path (overrides the spec)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compile an edit spec and print the encoder program
    Compile {
        /// Path to the edit spec (JSON)
        spec: PathBuf,

        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate an edit spec
    Validate {
        /// Path to the edit spec (JSON)
        spec: PathBuf,
    },

    /// Locate subjects in a single frame
    Locate {
        /// Source video
        video: PathBuf,

        /// Frame time in milliseconds
        #[arg(long, default_value = "0")]
        at_ms: u64,

        /// Number of subjects (1-3)
        #[arg(long, default_value = "1")]
        count: usize,
    },

    /// Show source geometry and audio presence
    Probe {
        /// Source video
        video: PathBuf,
    },

    /// Check encoder availability and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    reelcut_common::logging::init_logging(&LoggingConfig {
        level,
        json: cli.json_logs || config.logging.json,
        file: config.logging.file.clone(),
    });

    match cli.command {
        Commands::Render { spec, output } => commands::render::run(config, spec, output).await,
        Commands::Compile { spec, json } => commands::compile::run(config, spec, json).await,
        Commands::Validate { spec } => commands::validate::run(spec),
        Commands::Locate {
            video,
            at_ms,
            count,
        } => commands::locate::run(config, video, at_ms, count).await,
        Commands::Probe { video } => commands::probe::run(config, video).await,
        Commands::Check => commands::check::run(config).await,
    }
}
