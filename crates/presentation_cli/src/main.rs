//! TRIAS CLI
//!
//! Command-line front end for TRIAS endpoints: one-shot queries and a
//! polling mode that prints every refreshed state.

#![allow(clippy::print_stdout)]

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use integration_trias::{
    HttpTriasClient, RequestTime, TriasClient, TriasConfig, TriasCoordinator,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// TRIAS CLI
#[derive(Parser)]
#[command(name = "trias-cli")]
#[command(author, version, about = "Query TRIAS public transit endpoints", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./trias.toml, if present)
    #[arg(short, long, env = "TRIAS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the next departures at a stop
    Departures {
        /// Stop point reference (e.g. de:08111:6115)
        stop: String,

        /// Number of departures (default: departure_limit from the config)
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Departure time, RFC 3339 (default: now)
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Find connections between two stops
    Trip {
        /// Origin stop point reference
        from: String,

        /// Destination stop point reference
        to: String,

        /// Number of connections (default: trip_limit from the config)
        #[arg(short = 'n', long)]
        count: Option<u32>,

        /// Departure time, RFC 3339 (default: now)
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Show the course of a single journey
    TripInfo {
        /// Journey reference, as found in departures
        journey: String,

        /// Operating day (YYYY-MM-DD)
        day: String,
    },

    /// Search stops by name
    Search {
        /// Search text
        text: String,

        /// Maximum number of results
        #[arg(short = 'n', long, default_value = "4")]
        count: u32,
    },

    /// Look up the best matching stop for a name or reference
    Station {
        /// Stop name or reference
        name: String,
    },

    /// Check that the endpoint answers and accepts the API key
    TestConnection,

    /// Poll the configured stops and trips until Ctrl-C
    Watch,
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn parse_time(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value).map_err(|e| format!("expected RFC 3339 time: {e}"))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch(client: Arc<dyn TriasClient>, config: TriasConfig) -> anyhow::Result<()> {
    let mut coordinator = TriasCoordinator::new(client, config);
    coordinator.setup().await;

    if coordinator.stops().is_empty() && coordinator.trips().is_empty() {
        anyhow::bail!("nothing to watch: no stop or trip could be set up");
    }

    let mut updates = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            match serde_json::to_string_pretty(&*snapshot) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!(error = %e, "Could not render snapshot"),
            }
        }
    });

    coordinator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    // closes the update channel, which ends the printer
    drop(coordinator);
    printer.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = log_filter_from_verbosity(cli.verbose);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = settings::load(cli.config.as_deref())?;
    config.validate()?;
    info!(endpoint = %config.base_url, "Configuration loaded");

    let client = Arc::new(HttpTriasClient::new(&config)?);

    match cli.command {
        Commands::Departures { stop, count, at } => {
            let departures = client
                .get_departures(&stop, count, at.map(RequestTime::from))
                .await?;
            print_json(&departures)?;
        },

        Commands::Trip {
            from,
            to,
            count,
            at,
        } => {
            let trips = client
                .get_trip(&from, &to, count, at.map(RequestTime::from))
                .await?;
            print_json(&trips)?;
        },

        Commands::TripInfo { journey, day } => {
            let info = client.get_trip_info(&journey, &day).await?;
            print_json(&info)?;
        },

        Commands::Search { text, count } => {
            let matches = client.search_locations(&text, count).await?;
            print_json(&matches)?;
        },

        Commands::Station { name } => {
            let station = client.get_station_data(&name).await?;
            print_json(&station)?;
        },

        Commands::TestConnection => match client.test_connection().await {
            Ok(()) => println!("✅ Connected to {}", config.base_url),
            Err(e) => {
                println!("❌ Connection failed: {e}");
                std::process::exit(1);
            },
        },

        Commands::Watch => watch(client, config).await?,
    }

    Ok(())
}
