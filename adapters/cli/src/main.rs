#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that generates hopgrid levels and walks an actor
//! through them.

mod config;

use std::{io, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result as AnyResult};
use clap::{Args, Parser, Subcommand};
use hopgrid_core::{CellCoord, Direction};
use hopgrid_rendering::{
    ActorPresentation, MapView, Presentation, RenderingBackend, SceneRecorder, TextBackend,
};
use hopgrid_system_bootstrap::{Bootstrap, Level};
use hopgrid_system_movement::{MovementController, StepOutcome, TickOutcome};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{parse_path, AppConfig};

#[derive(Debug, Parser)]
#[command(name = "hopgrid", about = "Procedural obstacle grids with hop-stepping actors")]
struct Cli {
    /// TOML settings file with optional [grid], [layout], [movement] and [world] tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a level and print its map.
    Generate(LevelArgs),
    /// Generate a level and walk the actor along a path.
    Walk(WalkArgs),
}

#[derive(Debug, Args)]
struct LevelArgs {
    /// Seed for layout generation.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Grid width override.
    #[arg(long)]
    width: Option<u32>,
    /// Grid height override.
    #[arg(long)]
    height: Option<u32>,
}

#[derive(Debug, Args)]
struct WalkArgs {
    #[command(flatten)]
    level: LevelArgs,
    /// Steps to request, e.g. `NNEES`.
    #[arg(long, default_value = "")]
    path: String,
    /// Simulation tick in milliseconds.
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,
}

/// Entry point for the hopgrid command-line interface.
fn main() -> AnyResult<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Generate(args) => {
            args.apply(&mut config);
            generate(&config, args.seed)
        }
        Command::Walk(args) => {
            args.level.apply(&mut config);
            let path = parse_path(&args.path)?;
            walk(&config, args.level.seed, &path, Duration::from_millis(args.tick_ms))
        }
    }
}

impl LevelArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(width) = self.width {
            config.grid.width = width;
        }
        if let Some(height) = self.height {
            config.grid.height = height;
        }
    }
}

fn init_tracing(level: &str) -> AnyResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level {level:?}"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}

fn build_level(config: &AppConfig, seed: u64) -> AnyResult<(Level, SceneRecorder)> {
    let bootstrap = Bootstrap::new(&config.level()).context("invalid level configuration")?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut scene = SceneRecorder::default();
    let level = bootstrap
        .build(&mut rng, &mut scene)
        .context("failed to build level")?;
    Ok((level, scene))
}

fn generate(config: &AppConfig, seed: u64) -> AnyResult<()> {
    let (level, scene) = build_level(config, seed)?;
    let map = MapView::capture(level.world(), None);
    let title = format!("hopgrid seed {seed} ({}x{})", map.width(), map.height());

    let mut backend = TextBackend::new(io::stdout().lock());
    backend.present(&Presentation::new(title, map, None))?;
    println!(
        "clusters: {}, obstacles: {}, placements: {}",
        level.clusters(),
        scene.obstacle_count(),
        scene.placements().len()
    );
    info!(
        clusters = level.clusters(),
        obstacles = scene.obstacle_count(),
        placements = scene.placements().len(),
        "generation finished"
    );
    Ok(())
}

fn walk(config: &AppConfig, seed: u64, path: &[Direction], dt: Duration) -> AnyResult<()> {
    let (level, _scene) = build_level(config, seed)?;
    let mut actor = level
        .spawn_actor(config.movement.clone())
        .context("invalid movement configuration")?;

    let mut ticks = 0_u64;
    for &direction in path {
        ticks += 1;
        match actor.tick(dt, Some(direction), level.world()) {
            TickOutcome::Step(StepOutcome::Started { from, to }) => {
                debug!(?from, ?to, "stepping");
                ticks += finish_step(&mut actor, &level, dt);
                println!("{direction:?}: moved to {}", describe(actor.cell()));
            }
            TickOutcome::Step(rejection) => {
                warn!(cell = ?actor.cell(), ?direction, ?rejection, "step rejected");
                println!("{direction:?}: {rejection:?} at {}", describe(actor.cell()));
            }
            other => debug!(?other, "unexpected tick outcome"),
        }
    }

    let map = MapView::capture(level.world(), Some(actor.cell()));
    let title = format!("hopgrid seed {seed} after {ticks} ticks");
    let status = ActorPresentation {
        cell: actor.cell(),
        facing: actor.facing(),
        position: actor.position(),
    };
    let mut backend = TextBackend::new(io::stdout().lock());
    backend.present(&Presentation::new(title, map, Some(status)))
}

fn describe(cell: CellCoord) -> String {
    format!("({}, {})", cell.column(), cell.row())
}

/// Ticks without input until the running step commits; returns ticks spent.
fn finish_step(actor: &mut MovementController, level: &Level, dt: Duration) -> u64 {
    let mut ticks = 0;
    while actor.is_moving() {
        ticks += 1;
        if let TickOutcome::Arrived { cell } = actor.tick(dt, None, level.world()) {
            debug!(?cell, ticks, "arrived");
        }
    }
    ticks
}
