//! # Strata CLI
//!
//! Headless driver for the Strata physics core.
//!
//! ## Commands
//! - `simulate` - Run a canned scenario (or a face dump) and print the player trace
//! - `tuning` - Print the default physics tuning as JSON
//! - `scenarios` - List the canned scenarios

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use strata_physics::{BodySnapshot, FaceDef, PhysicsTuning, Scenario, WorldConfig};

/// Strata physics CLI
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a scenario and print the player trace
    Simulate(SimulateArgs),

    /// Print the default tuning as JSON
    Tuning,

    /// List the canned scenarios
    Scenarios,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Scenario: drop, stairs, ledge, slope or stuck
    #[arg(short, long, default_value = "drop")]
    pub scenario: Scenario,

    /// Number of steps; defaults to the scenario's own length
    #[arg(short, long)]
    pub frames: Option<u32>,

    /// Step length in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub dt: f32,

    /// Tuning overrides as JSON; missing fields keep their defaults
    #[arg(short, long)]
    pub tuning: Option<PathBuf>,

    /// Faces as a JSON array, replacing the scenario's level
    #[arg(short, long)]
    pub geometry: Option<PathBuf>,

    /// Console lines run against the player before the first step
    #[arg(short, long = "console")]
    pub console: Vec<String>,

    /// Print every Nth frame
    #[arg(long, default_value_t = 10)]
    pub every: u32,

    /// Print JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

/// One row of the simulation trace
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame: u32,
    #[serde(flatten)]
    pub body: BodySnapshot,
}

/// Execute the CLI command
pub fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    match cli.command {
        Commands::Simulate(args) => {
            let trace = simulate(&args)?;
            print_trace(&trace, &args)?;
        }

        Commands::Tuning => {
            println!("{}", serde_json::to_string_pretty(&PhysicsTuning::default())?);
        }

        Commands::Scenarios => {
            for scenario in Scenario::ALL {
                println!("{:<8} {} frames", scenario.name(), scenario.default_frames());
            }
        }
    }

    Ok(())
}

/// Run the scenario and collect the player's state after every step
pub fn simulate(args: &SimulateArgs) -> Result<Vec<FrameReport>> {
    if !(args.dt > 0.0 && args.dt.is_finite()) {
        bail!("dt must be positive, got {}", args.dt);
    }

    let tuning = match &args.tuning {
        Some(path) => load_tuning(path)?,
        None => PhysicsTuning::default(),
    };
    let config = WorldConfig {
        tuning,
        ..Default::default()
    };

    let (mut world, player) = args.scenario.build(config)?;
    if let Some(path) = &args.geometry {
        let faces = load_faces(path)?;
        world.build_geometry(&faces)?;
    }
    for line in &args.console {
        let reply = world
            .execute_console(player, line)
            .with_context(|| format!("Console command '{}' failed", line))?;
        log::info!("> {}: {}", line, reply);
    }

    let frames = args.frames.unwrap_or_else(|| args.scenario.default_frames());
    log::info!("Simulating {} for {} frames at dt = {:.4}", args.scenario, frames, args.dt);

    let mut trace = Vec::with_capacity(frames as usize);
    for frame in 1..=frames {
        world.step(args.dt);
        let body = world
            .snapshot(player)
            .context("Player disappeared during the simulation")?;
        trace.push(FrameReport { frame, body });
    }
    Ok(trace)
}

fn print_trace(trace: &[FrameReport], args: &SimulateArgs) -> Result<()> {
    let every = args.every.max(1);
    let last = trace.last().map(|report| report.frame);
    let shown = trace
        .iter()
        .filter(|report| report.frame % every == 0 || Some(report.frame) == last);

    if args.json {
        for report in shown {
            println!("{}", serde_json::to_string(report)?);
        }
        return Ok(());
    }

    println!(
        "{:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}  state",
        "frame", "x", "y", "z", "vx", "vy", "vz"
    );
    for report in shown {
        let body = &report.body;
        let state = match body.state {
            Some(state) if body.no_clip => format!("{:?} (noclip)", state),
            Some(state) => format!("{:?}", state),
            None => "-".to_string(),
        };
        println!(
            "{:>6} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4}  {}",
            report.frame,
            body.position.x,
            body.position.y,
            body.position.z,
            body.velocity.x,
            body.velocity.y,
            body.velocity.z,
            state
        );
    }
    Ok(())
}

fn load_tuning(path: &Path) -> Result<PhysicsTuning> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read tuning file {}", path.display()))?;
    let tuning: PhysicsTuning = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse tuning file {}", path.display()))?;
    tuning.validate()?;
    Ok(tuning)
}

fn load_faces(path: &Path) -> Result<Vec<FaceDef>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometry file {}", path.display()))?;
    let faces: Vec<FaceDef> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse geometry file {}", path.display()))?;
    log::info!("Read {} faces from {}", faces.len(), path.display());
    Ok(faces)
}
