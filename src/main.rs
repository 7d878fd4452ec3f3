mod animate;
mod app;
mod camera;
mod color;
mod config;
mod error;
mod geometry;
mod graphics;
mod material;
mod math;
mod model;
mod panel;
mod render;
mod scene;
mod schedule;
mod sky;
mod state;
mod terminal;
mod tween;
mod vertex;

use std::fs::File;
use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Env, Target};

use crate::app::{App, AppOptions};
use crate::config::{Cli, SceneSettings};
use crate::model::ModelLoader;
use crate::schedule::SystemClock;
use crate::terminal::{initial_size, TerminalGuard, TerminalSurface};

/// Main function
fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout is the render surface, so logs go to a file
    let log_file = File::create(&cli.log_file)
        .with_context(|| format!("creating log file {}", cli.log_file.display()))?;
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(log_file)))
        .init();

    log::info!(
        "{} {} starting (fps {}, pixel ratio {}, testing {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        cli.fps,
        cli.pixel_ratio,
        cli.testing
    );

    let loader = ModelLoader::spawn(cli.model.clone());
    let options = AppOptions {
        testing: cli.testing,
        settings: SceneSettings::from(&cli),
        fps: cli.fps,
        device_pixel_ratio: cli.pixel_ratio,
    };

    let guard = TerminalGuard::enter().context("setting up the terminal")?;
    let mut app = App::new(
        options,
        TerminalSurface::new(io::BufWriter::new(io::stdout())),
        SystemClock::new(),
        initial_size(),
        Some(loader),
    );
    let outcome = terminal::run(&mut app);
    drop(guard);

    outcome.context("terminal event loop failed")?;
    log::info!(
        "exiting after {} frames at scroll offset {:.0}px",
        app.frames_rendered(),
        app.input().scroll.offset
    );
    Ok(())
}
