//! Headless runner: loads a timeline, runs it with the built-in role scripts
//! and prints the final roster.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warband_core::prelude::*;

/// Run a Warband timeline without a renderer
#[derive(Parser)]
#[command(name = "warband-run", version)]
struct Args {
    /// Timeline JSON file (tick -> list of commands)
    #[arg(value_name = "TIMELINE")]
    timeline: PathBuf,

    /// Number of ticks to execute
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Seed for the random service handed to hooks
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Simulation config JSON (missing fields keep their defaults)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    /// One line per entity plus error counters
    Summary,
    /// Roster and diagnostics as JSON
    Json,
    /// Every tick report as a JSON line, then the final JSON
    Ticks,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    let timeline = Timeline::load(&args.timeline)
        .with_context(|| format!("loading timeline {}", args.timeline.display()))?;
    info!(
        timeline = %args.timeline.display(),
        deltas = timeline.pending(),
        ticks = args.ticks,
        seed = args.seed,
        "starting run"
    );

    let mut sim = Simulation::new(
        config,
        timeline,
        HookTable::builtin(),
        Box::new(SeededRandom::new(args.seed)),
    )
    .context("invalid simulation config")?;

    for _ in 0..args.ticks {
        let report = sim.step()?;
        if matches!(args.format, OutputFormat::Ticks) {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    let diagnostics = sim.diagnostics();
    info!(
        ticks = sim.tick(),
        alive = sim.registry().alive_count(),
        errors = diagnostics.total_errors(),
        "run finished"
    );

    match args.format {
        OutputFormat::Summary => print_summary(&sim),
        OutputFormat::Json | OutputFormat::Ticks => {
            let output = serde_json::json!({
                "tick": sim.tick(),
                "roster": sim.roster(),
                "diagnostics": diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_summary(sim: &Simulation) {
    println!("tick {}", sim.tick());
    for unit in sim.roster() {
        println!(
            "{:<12} {:<8} team {:<3} ({:>7.1}, {:>7.1})  {}",
            unit.id.as_str(),
            unit.role.as_str(),
            unit.team.get(),
            unit.position.x,
            unit.position.y,
            unit.state,
        );
    }
    let d = sim.diagnostics();
    println!(
        "errors: parse {} duplicate {} unknown {} commander {} unspawnable {} hook {}",
        d.parse_errors,
        d.duplicate_ids,
        d.unknown_ids,
        d.rejected_commanders,
        d.unspawnable_roles,
        d.hook_errors
    );
    println!(
        "events: enter_view {} exit_view {} collision {} bullets {} deferred {}",
        d.enter_view_events,
        d.exit_view_events,
        d.collision_events,
        d.bullets_fired,
        d.deferred_reactions
    );
}
