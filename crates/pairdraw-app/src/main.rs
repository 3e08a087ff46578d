//! Main application entry point.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pairdraw_app::{App, AppConfig};
use pairdraw_core::SessionConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pairdraw")]
#[command(about = "Serverless two-peer collaborative drawing")]
struct Cli {
    /// Path to a JSON session configuration
    #[arg(short, long, env = "PAIRDRAW_CONFIG")]
    config: Option<PathBuf>,

    /// Directory exported images are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Canvas width (overrides config file)
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height (overrides config file)
    #[arg(long)]
    height: Option<u32>,

    /// Export file name prefix (overrides config file)
    #[arg(long)]
    prefix: Option<String>,

    /// Do not mirror pen settings between peers
    #[arg(long)]
    no_pen_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect two in-process peers, draw on both, export both canvases
    Demo,
    /// Apply a JSON-lines file of sync messages to a blank canvas and export it
    Replay {
        /// Input file, one message per line
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    log::info!("Starting PairDraw");

    let mut session = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(width) = cli.width {
        session.canvas_width = width;
    }
    if let Some(height) = cli.height {
        session.canvas_height = height;
    }
    if let Some(prefix) = cli.prefix {
        session.export_prefix = prefix;
    }
    if cli.no_pen_sync {
        session.sync_pen_settings = false;
    }
    session.validate().context("invalid configuration")?;

    let app = App::new(AppConfig {
        session,
        output_dir: cli.output,
    });

    match cli.command {
        Commands::Demo => {
            let report = app.demo()?;
            println!("{}", report.initiator_image.display());
            println!("{}", report.responder_image.display());
            if !report.converged {
                anyhow::bail!("peers diverged");
            }
        }
        Commands::Replay { input } => {
            let path = app.replay(&input)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
