//! CLI Entry Point for can-overlay
//!
//! Provides command-line access to the overlay engine:
//! - `watch`: headless text overlay, redrawn every tick
//! - `gui`: the egui overlay in an `eframe` window
//! - `check-config`: load and validate the configuration
//!
//! Both viewers subscribe to an in-process bus. `--replay` feeds it from a
//! candump capture; without it the overlay shows whatever an embedding publishes.
//!
//! # Usage
//!
//! ```bash
//! can-overlay watch --replay drive.log
//! can-overlay gui --config config/can_overlay.toml --replay drive.log --loop-replay
//! ```

use anyhow::{Context, Result};
use can_overlay::config::{OverlayConfig, DEFAULT_CONFIG_PATH};
use can_overlay::gui::OverlayApp;
use can_overlay::presentation::{render_text, TextStyle};
use can_overlay::replay;
use can_overlay::transport::LocalBus;
use can_overlay::{logging, CanOverlay};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "can-overlay")]
#[command(about = "Live CAN bus debug overlay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the params directory holding the enable flag
    #[arg(long)]
    params_dir: Option<PathBuf>,

    /// candump capture to publish on the overlay's channel
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Restart the capture when it ends
    #[arg(long, requires = "replay")]
    loop_replay: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Headless text overlay
    Watch {
        #[command(flatten)]
        source: Source,

        /// Disable ANSI colours and screen clearing
        #[arg(long)]
        plain: bool,
    },

    /// egui overlay window
    Gui {
        #[command(flatten)]
        source: Source,
    },

    /// Load, validate and print the configuration
    CheckConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { source, plain } => watch(source, plain).await,
        Commands::Gui { source } => gui(source).await,
        Commands::CheckConfig { config } => check_config(&config),
    }
}

fn load_config(path: &Path, params_dir: Option<PathBuf>) -> Result<OverlayConfig> {
    let mut config = OverlayConfig::load_from(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    if let Some(dir) = params_dir {
        config.params.path = dir;
    }
    config.validate()?;
    Ok(config)
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path, None)?;
    println!("✅ Configuration OK: {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Loads the config, starts logging and the optional replay, and builds the overlay.
async fn prepare(
    source: Source,
) -> Result<(OverlayConfig, CanOverlay<Box<dyn can_overlay::params::FlagSource + Send + Sync>, LocalBus>)> {
    let config = load_config(&source.config, source.params_dir)?;
    logging::init_from_config(&config)?;

    let bus = LocalBus::new();
    if let Some(path) = source.replay {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read capture {}", path.display()))?;
        let records = replay::parse_capture(&text)?;
        info!(records = records.len(), capture = %path.display(), "Replaying capture");
        tokio::spawn(replay::play(
            bus.clone(),
            config.overlay.channel.clone(),
            records,
            source.loop_replay,
        ));
    }

    let overlay = CanOverlay::from_config(config.params.open(), bus, &config);
    Ok((config, overlay))
}

async fn watch(source: Source, plain: bool) -> Result<()> {
    let (config, mut overlay) = prepare(source).await?;
    let style = TextStyle { ansi: !plain };
    let mut interval = tokio::time::interval(config.overlay.tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(
        flag = %config.overlay.flag_key,
        channel = %config.overlay.channel,
        "Watching; press Ctrl+C to stop"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = overlay.tick(Instant::now());
                if !overlay.is_active() {
                    continue;
                }
                if style.ansi {
                    print!("\x1b[2J\x1b[H");
                }
                print!("{}", render_text(&report.snapshot, style));
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn gui(source: Source) -> Result<()> {
    let (config, overlay) = prepare(source).await?;
    let app = OverlayApp::new(overlay, config.overlay.tick_interval);

    eframe::run_native(
        "CAN Debug Overlay",
        eframe::NativeOptions::default(),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("GUI exited with error: {e}"))
}
