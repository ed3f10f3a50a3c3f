//! skyquery: CLI + web server for live aircraft area queries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skyquery_core::area::{AircraftFilter, AreaQueryEngine};
use skyquery_core::config::{self, Config};
use skyquery_core::distance::{estimate_route, DistanceUnit, DEFAULT_CRUISE_KTS};
use skyquery_core::feed::{SnapshotProvider, StaticSnapshot};
use skyquery_core::types::{AreaQueryResult, Coordinate};

mod opensky;
mod web;

use opensky::OpenSkyClient;

#[derive(Parser)]
#[command(name = "skyquery", version, about = "Live aircraft area queries")]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API
    Serve {
        /// Bind address
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Bind port
        #[arg(long, env = "PORT")]
        port: Option<u16>,

        #[command(flatten)]
        feed: FeedArgs,
    },

    /// List aircraft within a radius of a point
    Query {
        /// Center latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Center longitude
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Radius in nautical miles
        #[arg(long)]
        radius: f64,

        /// Minimum altitude in feet
        #[arg(long)]
        altitude_min: Option<f64>,

        /// Maximum altitude in feet
        #[arg(long)]
        altitude_max: Option<f64>,

        /// Match against icao24 or callsign
        #[arg(long)]
        ident: Option<String>,

        /// Read a saved states/all JSON response instead of the live feed
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        feed: FeedArgs,
    },

    /// Great-circle distance and flight time between two points
    Distance {
        /// Origin as lat,lon
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,

        /// Destination as lat,lon
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,

        /// nautical_miles, kilometers, or statute_miles
        #[arg(long, default_value = "nautical_miles")]
        unit: DistanceUnit,

        /// Average ground speed in knots
        #[arg(long, default_value_t = DEFAULT_CRUISE_KTS)]
        speed: f64,
    },

    /// Show the effective configuration
    Config {
        /// Write it to ~/.skyquery/config.yaml
        #[arg(long)]
        save: bool,

        #[command(flatten)]
        feed: FeedArgs,
    },
}

/// Feed settings that may come from flags or the environment.
#[derive(Args, Clone, Default)]
struct FeedArgs {
    /// OpenSky username
    #[arg(long, env = "OPENSKY_USERNAME")]
    username: Option<String>,

    /// OpenSky password
    #[arg(long, env = "OPENSKY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// OpenSky API base URL
    #[arg(long, env = "OPENSKY_URL")]
    feed_url: Option<String>,
}

impl FeedArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(u) = &self.username {
            config.feed.username = Some(u.clone());
        }
        if let Some(p) = &self.password {
            config.feed.password = Some(p.clone());
        }
        if let Some(url) = &self.feed_url {
            config.feed.base_url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut config = config::load_config();

    match cli.command {
        Commands::Serve { host, port, feed } => {
            feed.apply(&mut config);
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            cmd_serve(&config).await
        }
        Commands::Query {
            lat,
            lon,
            radius,
            altitude_min,
            altitude_max,
            ident,
            snapshot,
            json,
            feed,
        } => {
            feed.apply(&mut config);
            let filter = AircraftFilter {
                altitude_min_ft: altitude_min,
                altitude_max_ft: altitude_max,
                ident,
            };
            cmd_query(&config, lat, lon, radius, &filter, snapshot.as_deref(), json).await
        }
        Commands::Distance {
            from,
            to,
            unit,
            speed,
        } => cmd_distance(from, to, unit, speed),
        Commands::Config { save, feed } => {
            feed.apply(&mut config);
            cmd_config(&config, save)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Live feed, or a saved response when `snapshot` is given.
fn build_provider(
    config: &Config,
    snapshot: Option<&Path>,
) -> Result<Arc<dyn SnapshotProvider>, String> {
    match snapshot {
        Some(path) => {
            let body = std::fs::read(path)
                .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
            let provider = StaticSnapshot::from_json(&body)
                .map_err(|e| format!("Error parsing {}: {e}", path.display()))?;
            Ok(Arc::new(provider))
        }
        None => {
            let client = OpenSkyClient::new(&config.feed)
                .map_err(|e| format!("Error building feed client: {e}"))?;
            tracing::info!(
                url = %config.feed.base_url,
                authenticated = client.is_authenticated(),
                "using OpenSky feed"
            );
            Ok(Arc::new(client))
        }
    }
}

async fn cmd_serve(config: &Config) {
    let provider = build_provider(config, None).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let engine = AreaQueryEngine::new(config.engine, provider);

    tracing::info!(
        max_radius_nm = config.engine.max_radius_nm,
        "starting skyquery API"
    );

    if let Err(e) = web::serve(engine, &config.server.host, config.server.port).await {
        eprintln!(
            "Error serving on {}:{}: {e}",
            config.server.host, config.server.port
        );
        std::process::exit(1);
    }
}

async fn cmd_query(
    config: &Config,
    lat: f64,
    lon: f64,
    radius: f64,
    filter: &AircraftFilter,
    snapshot: Option<&Path>,
    as_json: bool,
) {
    let provider = build_provider(config, snapshot).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let engine = AreaQueryEngine::new(config.engine, provider);

    let result = match Coordinate::new(lat, lon) {
        Ok(center) => engine.query_area_filtered(center, radius, filter).await,
        Err(e) => Err(e),
    };
    let result = result.unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    if as_json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    print_result(&result);
}

fn cmd_distance(from: Coordinate, to: Coordinate, unit: DistanceUnit, speed: f64) {
    let est = estimate_route(from, to, unit, speed).unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    println!();
    println!("  From:      {}", est.origin);
    println!("  To:        {}", est.destination);
    println!("  Distance:  {:.2} {}", est.distance, est.unit);
    println!(
        "  Time:      {:.2} h ({:.0} min) at {} kts",
        est.flight_time_hours, est.flight_time_minutes, est.average_speed_kts
    );
    println!();
}

/// Effective configuration for display. The password never appears.
fn render_config(config: &Config) -> String {
    config::serialize_config(&config.redacted())
}

fn cmd_config(config: &Config, save: bool) {
    print!("{}", render_config(config));
    if save {
        match config::save_config(config) {
            Ok(path) => eprintln!("Saved {}", path.display()),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_result(result: &AreaQueryResult) {
    let circle = &result.search_area.circle;
    println!();
    println!(
        "{} aircraft within {} nm of {}",
        result.aircraft_count,
        circle.radius_nm(),
        circle.center()
    );
    println!();

    if result.aircraft.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ICAO24", "Callsign", "Country", "Dist (nm)", "Alt (ft)", "Speed (kts)", "Track",
        "Lat", "Lon", "Ground",
    ]);

    for ac in &result.aircraft {
        let sv = &ac.state;
        table.add_row(vec![
            Cell::new(sv.icao24),
            Cell::new(sv.callsign.as_deref().unwrap_or("-")),
            Cell::new(sv.origin_country.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.2}", ac.distance_nm())),
            Cell::new(
                ac.altitude_ft
                    .map(|a| a.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                ac.velocity_kts
                    .map(|s| s.to_string())
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                sv.true_track_deg
                    .map(|h| format!("{h:.1}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                sv.position
                    .map(|p| format!("{:.4}", p.lat()))
                    .unwrap_or("-".into()),
            ),
            Cell::new(
                sv.position
                    .map(|p| format!("{:.4}", p.lon()))
                    .unwrap_or("-".into()),
            ),
            Cell::new(if sv.on_ground { "yes" } else { "no" }),
        ]);
    }

    println!("{table}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
