use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use nav_tracker_rs::position::{open_trace, PositionUpdate};
use nav_tracker_rs::{
    DirectRouting, NavigationConfig, NavigationController, NavigationEvent, Route, RoutingService,
};
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;

/// Offline replay of a recorded walk against a saved route.
///
/// Fixes are applied with the clock taken from their own timestamps, so the
/// recalculation debounce behaves as it did on the device. Recalculations are
/// answered with straight-line routes.
#[derive(Parser, Debug)]
struct Args {
    /// Route JSON (as printed in a route_updated event or saved by a client)
    #[arg(long)]
    route: PathBuf,

    /// Position trace (.jsonl or .jsonl.gz)
    #[arg(long)]
    trace: PathBuf,

    /// Navigation thresholds JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only print the summary
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    fixes: u64,
    location_errors: u64,
    steps_advanced: u64,
    recalculations: u64,
    recalculation_failures: u64,
    location_lost: u64,
    arrived: bool,
    final_step: usize,
    remaining_distance_m: Option<f64>,
}

impl Summary {
    fn record(&mut self, event: &NavigationEvent) {
        match event {
            NavigationEvent::StepAdvanced { .. } => self.steps_advanced += 1,
            NavigationEvent::RecalculationStarted => self.recalculations += 1,
            NavigationEvent::RecalculationFailed => self.recalculation_failures += 1,
            NavigationEvent::LocationUnavailable { .. } => self.location_lost += 1,
            NavigationEvent::Arrived => self.arrived = true,
            NavigationEvent::RouteUpdated { .. } | NavigationEvent::LocationRestored => {}
        }
    }
}

fn load_route(path: &Path) -> anyhow::Result<Route> {
    let file = File::open(path)?;
    let route = serde_json::from_reader(BufReader::new(file))?;
    Ok(route)
}

async fn replay(
    controller: &mut NavigationController,
    updates: Vec<PositionUpdate>,
    quiet: bool,
) -> anyhow::Result<Summary> {
    let routing = DirectRouting;
    let base = Instant::now();
    let mut first_ts = None;
    let mut summary = Summary::default();

    for update in updates {
        let events = match update {
            Ok(position) => {
                summary.fixes += 1;
                let t0 = *first_ts.get_or_insert(position.timestamp);
                let offset = (position.timestamp - t0).to_std().unwrap_or_default();
                let outcome = controller.on_position(position, base + offset);

                let mut events = outcome.events;
                if let Some(request) = outcome.recalculation {
                    let result = routing.request_route(request.origin, request.destination).await;
                    events.extend(controller.on_recalculation_result(request.ticket, result));
                }
                events
            }
            Err(error) => {
                summary.location_errors += 1;
                controller.on_location_error(&error)
            }
        };

        for event in &events {
            summary.record(event);
            if !quiet {
                let line = json!({
                    "fix": summary.fixes,
                    "event": event,
                    "step_index": controller.current_step_index(),
                });
                println!("{}", serde_json::to_string(&line)?);
            }
        }

        if controller.is_finished() {
            break;
        }
    }

    summary.final_step = controller.current_step_index();
    summary.remaining_distance_m = controller.remaining_distance_m();
    Ok(summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let route = load_route(&args.route)
        .with_context(|| format!("Failed to load route {}", args.route.display()))?;
    let updates = open_trace(&args.trace)
        .with_context(|| format!("Failed to load trace {}", args.trace.display()))?;
    let config = match &args.config {
        Some(path) => NavigationConfig::from_json_file(path)?,
        None => NavigationConfig::default(),
    };

    println!(
        "Replaying {} updates over {} steps ({:.0} m)",
        updates.len(),
        route.steps().len(),
        route.total_distance_m()
    );

    let mut controller = NavigationController::new(route, &config)?;
    let summary = replay(&mut controller, updates, args.quiet).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
