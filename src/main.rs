use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use nav_tracker_rs::position::{
    open_trace, ChannelPositionSource, Detour, PositionFeed, ReplayPositionSource, SimulatedWalk,
};
use nav_tracker_rs::{
    DirectRouting, GeoPoint, NavigationConfig, NavigationController, NavigationEvent,
    NavigationSession, OrsRoutingService, PositionSource, Position, Route, RoutingConfig,
    RoutingService, SessionHandle, SessionOutcome,
};
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use tokio::time::{sleep, Duration};

#[derive(Parser, Debug)]
#[command(name = "nav_tracker")]
#[command(about = "Walking navigation: follow a route and print guidance events", long_about = None)]
struct Args {
    /// Start point as LAT,LON
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    from: GeoPoint,

    /// Destination as LAT,LON
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    to: GeoPoint,

    /// Recorded trace (.jsonl or .jsonl.gz) instead of a simulated walk
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Navigation thresholds JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the off-route threshold (m)
    #[arg(long)]
    off_route_m: Option<f64>,

    /// Override the arrival threshold (m)
    #[arg(long)]
    arrival_m: Option<f64>,

    /// Straight-line routing, no network
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Simulated walking speed (m/s)
    #[arg(long, default_value = "1.4")]
    speed: f64,

    /// Milliseconds between simulated fixes
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Push part of the simulated walk this far off the route (m)
    #[arg(long, default_value = "0")]
    detour_m: f64,
}

fn parse_point(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{s}'"))?;
    let point = GeoPoint::new(
        lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?,
        lon.trim().parse().map_err(|e| format!("bad longitude: {e}"))?,
    );
    if !point.is_valid() {
        return Err(format!("coordinates out of range: {s}"));
    }
    Ok(point)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NavigationConfig::from_json_file(path)?,
        None => NavigationConfig::default(),
    };
    if let Some(m) = args.off_route_m {
        config.off_route_threshold_m = m;
    }
    if let Some(m) = args.arrival_m {
        config.arrival_threshold_m = m;
    }
    config.validate()?;

    if args.offline {
        navigate(&args, &config, &DirectRouting).await
    } else {
        let routing = OrsRoutingService::new(RoutingConfig::from_env());
        navigate(&args, &config, &routing).await
    }
}

async fn navigate<R: RoutingService>(
    args: &Args,
    config: &NavigationConfig,
    routing: &R,
) -> Result<()> {
    println!("[{}] Requesting route", ts_now());
    let route = routing
        .request_route(args.from, args.to)
        .await
        .context("Initial route request failed")?;
    println!(
        "[{}] Route: {} steps, {:.0} m",
        ts_now(),
        route.steps().len(),
        route.total_distance_m()
    );

    let controller = NavigationController::new(route.clone(), config)?;
    let (session, handle) = NavigationSession::new(controller);

    let outcome = match &args.trace {
        Some(path) => {
            let updates = open_trace(path)
                .with_context(|| format!("Failed to load trace {}", path.display()))?;
            println!("[{}] Replaying {} updates from {}", ts_now(), updates.len(), path.display());
            let mut source = ReplayPositionSource::new(updates);
            drive(session, handle, &mut source, routing, async {}).await?
        }
        None => {
            let interval = Duration::from_millis(args.interval_ms);
            let positions = simulated_walk(&route, args).positions(Utc::now(), interval);
            let (mut source, feed) = ChannelPositionSource::new();
            drive(session, handle, &mut source, routing, feed_walk(feed, positions, interval)).await?
        }
    };

    println!("[{}] Session ended: {:?}", ts_now(), outcome);
    Ok(())
}

fn simulated_walk(route: &Route, args: &Args) -> SimulatedWalk {
    let spacing = args.speed * args.interval_ms as f64 / 1000.0;
    let walk = SimulatedWalk::new(route.geometry().to_vec(), spacing);
    if args.detour_m > 0.0 {
        walk.with_detour(Detour {
            start_m: route.total_distance_m() / 3.0,
            length_m: 60.0,
            offset_m: args.detour_m,
        })
    } else {
        walk
    }
}

async fn feed_walk(feed: PositionFeed, positions: Vec<Position>, interval: Duration) {
    for position in positions {
        if !feed.fix(position) {
            break;
        }
        sleep(interval).await;
    }
    feed.close();
}

/// Run the session next to `feeder` on this task, printing events as JSON lines
async fn drive<S, R, F>(
    mut session: NavigationSession,
    mut handle: SessionHandle,
    source: &mut S,
    routing: &R,
    feeder: F,
) -> Result<SessionOutcome>
where
    S: PositionSource,
    R: RoutingService,
    F: Future<Output = ()>,
{
    let driver = async {
        let run = session.run(source, routing);
        tokio::pin!(run);

        let outcome = loop {
            tokio::select! {
                outcome = &mut run => break outcome?,
                Some(event) = handle.events.recv() => print_event(&event, &handle)?,
                _ = tokio::signal::ctrl_c() => {
                    println!("[{}] Ctrl-C, cancelling", ts_now());
                    handle.cancel();
                }
            }
        };

        while let Ok(event) = handle.events.try_recv() {
            print_event(&event, &handle)?;
        }
        Ok::<_, anyhow::Error>(outcome)
    };

    let (outcome, _) = tokio::join!(driver, feeder);
    let outcome = outcome?;

    let snapshot = handle.snapshot();
    let summary = json!({
        "outcome": outcome,
        "phase": snapshot.phase,
        "step_index": snapshot.step_index,
        "remaining_distance_m": session.controller().remaining_distance_m(),
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(outcome)
}

fn print_event(event: &NavigationEvent, handle: &SessionHandle) -> Result<()> {
    let snapshot = handle.snapshot();
    let line = json!({
        "ts": ts_now(),
        "event": event,
        "step_index": snapshot.step_index,
        "position": snapshot.position.map(|p| p.point),
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S%.3f").to_string()
}
