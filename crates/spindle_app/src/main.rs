//! Spindle demo host
//!
//! Draws a flat-coloured triangle and a textured quad spinning about the
//! view axis once every four seconds.
//!
//! # Usage
//!
//! ```bash
//! spindle
//! spindle --config spindle.json --width 1280 --height 720
//! spindle --headless 600
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spindle_core::AppConfig;
use spindle_renderer::SceneSettings;

mod headless;

#[derive(Parser)]
#[command(name = "spindle")]
#[command(author, version, about = "Spinning triangle and quad on OpenGL ES 2.0")]
struct Args {
    /// JSON config file; missing fields take defaults
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Initial window width, overrides the config file
    #[arg(long)]
    width: Option<u32>,

    /// Initial window height, overrides the config file
    #[arg(long)]
    height: Option<u32>,

    /// Draw this many frames against an in-memory GPU instead of opening a window
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u64>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    let settings = SceneSettings {
        clear_color: config.clear_color,
        ..SceneSettings::default()
    };

    if let Some(frames) = args.headless {
        let summary = headless::run(settings, config.width, config.height, frames)?;
        log::info!(
            "headless: {} frames, {} GPU calls, {} draws, {} matrix uploads, {} live objects",
            summary.frames,
            summary.calls,
            summary.draw_calls,
            summary.uniform_uploads,
            summary.live_handles
        );
        return Ok(());
    }

    log::info!(
        "opening {}x{} window '{}'",
        config.width,
        config.height,
        config.title
    );
    spindle_window::run(config, settings)?;
    Ok(())
}
