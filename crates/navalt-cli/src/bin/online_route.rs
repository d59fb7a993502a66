//! CLI tool to fetch online routes for an offline route, the way a live
//! session would once the device has moved along it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use navalt_core::{
    DirectionsRoute, Location, LocationMatcherResult, NavigationRoute, RouteOptions, RouteProgress,
    RouteProgressData, RouterOrigin,
};
use navalt_directions::DirectionsClient;
use navalt_session::{
    run_online_alternatives_loop, Config, OnlineAlternativesInputs, RoutesEvent,
};
use tokio::sync::{broadcast, mpsc, watch};

/// Request online routes replacing an offline route
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directions request URL of the offline route
    request_url: String,

    /// Current longitude
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,

    /// Current latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Current bearing in degrees
    #[arg(long)]
    bearing: Option<f64>,

    /// Current speed in m/s
    #[arg(long)]
    speed: Option<f64>,

    /// Waypoints still ahead (default: all but the origin)
    #[arg(long)]
    remaining_waypoints: Option<usize>,

    /// Give up after this many seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    navalt_cli::init_tracing()?;
    let args = Args::parse();
    let config = Config::from_env();

    let options = RouteOptions::from_url(&args.request_url).context("Invalid request url")?;
    let remaining_waypoints = args
        .remaining_waypoints
        .unwrap_or_else(|| options.coordinates.len().saturating_sub(1));
    let offline = NavigationRoute {
        id: "offline#0".to_string(),
        origin: RouterOrigin::Onboard,
        route_options: options,
        directions_route: DirectionsRoute::default(),
        route_index: 0,
        response_uuid: None,
    };

    let client = DirectionsClient::new(
        config.directions_url.clone(),
        config.access_token.clone(),
        config.connect_timeout,
        config.read_timeout,
    )?;

    let (routes_tx, routes) = mpsc::unbounded_channel();
    let (_progress_tx, route_progress) = watch::channel(Some(RouteProgress {
        navigation_route: offline.clone(),
        progress: RouteProgressData::default(),
        remaining_waypoints,
    }));
    let (_location_tx, location) = watch::channel(Some(LocationMatcherResult {
        enhanced_location: Location {
            longitude: args.lon,
            latitude: args.lat,
            bearing: args.bearing,
            speed: args.speed,
            timestamp: Utc::now(),
        },
    }));
    let (output_tx, mut output) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn(run_online_alternatives_loop(
        OnlineAlternativesInputs {
            routes,
            route_progress,
            location,
        },
        Arc::new(client),
        config.online_alternatives(),
        output_tx,
        shutdown_rx,
    ));

    println!("Requesting online routes for {} ...", args.request_url);
    routes_tx.send(RoutesEvent::Committed(vec![offline]))?;

    let result = tokio::time::timeout(Duration::from_secs(args.timeout), output.recv()).await;
    let _ = shutdown_tx.send(());
    task.await?;

    let routes = match result {
        Ok(Some(routes)) => routes,
        Ok(None) => bail!("Online alternatives loop stopped"),
        Err(_) => bail!("No online route within {}s", args.timeout),
    };

    println!("Received {} online routes", routes.len());
    for route in &routes {
        println!(
            "  {}: {:.0} m, {:.0} s, {} legs",
            route.id,
            route.directions_route.distance,
            route.directions_route.duration,
            route.directions_route.legs.len()
        );
    }
    Ok(())
}
