use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use signal_sim::service::SimulationService;
use signal_sim::simulation::{ConfigUpdate, SimConfig, SimEngine};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "signal_sim")]
#[command(about = "Priority-driven signal control for an 8-way intersection")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "60")]
    ticks: u64,

    /// Run the background service loop instead of the fast headless loop
    #[arg(long)]
    serve: bool,

    /// Milliseconds between ticks when serving
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Green phase length in seconds (10-60)
    #[arg(long)]
    green_duration: Option<i64>,

    /// Arriving vehicles per minute (1-20)
    #[arg(long)]
    vehicle_rate: Option<i64>,

    /// Percentage of arrivals that are emergency vehicles (0-10)
    #[arg(long)]
    emergency_pct: Option<f64>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Print a summary every N ticks in headless mode
    #[arg(long, default_value = "10")]
    summary_every: u64,

    /// Print the final state as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,signal_sim=info"),
    )
    .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut engine = SimEngine::new(SimConfig {
        seed: cli.seed,
        ..SimConfig::default()
    });
    engine.configure(ConfigUpdate {
        green_duration: cli.green_duration,
        vehicle_rate: cli.vehicle_rate,
        emergency_probability_pct: cli.emergency_pct,
    });
    engine.start();

    if cli.serve {
        let service = run_service(engine, cli.ticks, Duration::from_millis(cli.interval_ms))?;
        let engine = service.engine();
        let engine = engine
            .lock()
            .map_err(|_| anyhow::anyhow!("Engine lock poisoned"))?;
        report(&engine, cli.json)
    } else {
        let engine = run_headless(engine, cli.ticks, cli.summary_every, cli.json);
        report(&engine, cli.json)
    }
}

fn report(engine: &SimEngine, json: bool) -> Result<()> {
    if json {
        let state = serde_json::to_string_pretty(&engine.snapshot())
            .context("Failed to serialize final state")?;
        println!("{state}");
    } else {
        println!("=== Final State ===");
        engine.print_summary();
    }
    Ok(())
}

/// Run ticks back to back, advancing a virtual clock one second per tick
fn run_headless(mut engine: SimEngine, ticks: u64, summary_every: u64, json: bool) -> SimEngine {
    info!("Running signal simulation in headless mode for {ticks} ticks");
    let start = Instant::now();

    for tick in 1..=ticks {
        engine.tick_at(start + Duration::from_secs(tick));
        if !json && summary_every > 0 && tick % summary_every == 0 && tick < ticks {
            println!("--- After tick {tick} ---");
            engine.print_summary();
            println!();
        }
    }

    engine
}

/// Tick on the wall clock in the background and follow along as an observer
fn run_service(engine: SimEngine, ticks: u64, interval: Duration) -> Result<SimulationService> {
    let mut service = SimulationService::new(engine, interval);
    let (observer, updates) = service.subscribe();
    service.spawn()?;

    // First message is the greeting snapshot, then one per tick
    let timeout = interval * 2 + Duration::from_secs(1);
    for received in 0..=ticks {
        match updates.recv_timeout(timeout) {
            Ok(update) => info!("Update {received}: {} bytes", update.len()),
            Err(e) => {
                error!("Stopped waiting for updates: {e}");
                break;
            }
        }
    }

    service.unsubscribe(observer);
    service.shutdown();
    let health = service.health();
    info!(
        "Service finished at t={} (running: {})",
        health.simulation_time, health.simulation_running
    );
    Ok(service)
}
