//! Operator CLI for the geofencing engine.
//!
//! Imports coverage polygons from KML files, remote KML links and ZIP code
//! lists, printing storable service-area records, and checks coordinates
//! against a stored record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use geofence::config::GeofenceConfig;
use geofence::kml::{parse_document, KmlDocument};
use geofence::models::{AreaGeometry, LatLng, ServiceArea};
use geofence::pip::MatchPolicy;
use geofence::postal::PostalResolver;
use geofence::remote::RemoteResolver;
use geofence::storage::{parse_polygon_input, ServiceAreaRecord};

#[derive(Parser, Debug)]
#[command(name = "geofence")]
#[command(about = "Import service-area polygons and check coordinates against them")]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a local KML file into a service-area record
    Parse {
        file: PathBuf,

        /// Service area name
        #[arg(long)]
        name: Option<String>,
    },

    /// Fetch a remote KML document (following one NetworkLink)
    Fetch {
        url: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// Resolve ZIP codes found in a file ("-" reads stdin)
    Zips {
        input: String,

        #[arg(long)]
        name: Option<String>,
    },

    /// Check whether a coordinate falls inside a stored area
    Check {
        /// Service-area record or bare polygon JSON ("-" reads stdin)
        #[arg(long)]
        area: String,

        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        /// Accept points this many degrees from a zone edge
        #[arg(long)]
        tolerance: Option<f64>,

        /// Use the configured boundary tolerance
        #[arg(long)]
        lenient: bool,

        /// Report every matching zone instead of the first
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine readable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GeofenceConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => GeofenceConfig::default(),
    };

    match args.command {
        Command::Parse { file, name } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            match parse_document(&text)? {
                KmlDocument::Polygons { polygons, labels } => {
                    info!("Parsed {} polygons from {}", polygons.len(), file.display());
                    let geometry = AreaGeometry::new(polygons).with_labels(labels);
                    print_record(name.unwrap_or_else(|| default_name(&file)), geometry)?;
                }
                KmlDocument::NetworkLink(target) => {
                    anyhow::bail!(
                        "{} only links to {}; import it with `geofence fetch {}`",
                        file.display(),
                        target,
                        target
                    );
                }
            }
        }

        Command::Fetch { url, name } => {
            let resolver = RemoteResolver::from_config(&config.remote)?;
            let document = resolver.resolve(&url).await?;
            info!(
                "Resolved {} polygons from {}{}",
                document.polygons.len(),
                document.url,
                if document.from_cache { " (cached)" } else { "" }
            );
            print_record(
                name.unwrap_or_else(|| "Imported area".to_string()),
                document.into_geometry(),
            )?;
        }

        Command::Zips { input, name } => {
            let text = read_input(&input)?;
            let resolver = PostalResolver::from_config(&config.postal)?;
            let batch = resolver.resolve_text(&text).await?;

            if !batch.is_complete() {
                warn!("Unresolved ZIP codes: {}", batch.failed.join(", "));
            }
            if batch.polygons.is_empty() {
                anyhow::bail!("No ZIP code could be resolved: {}", batch.summary());
            }
            print_record(
                name.unwrap_or_else(|| "ZIP code area".to_string()),
                batch.into_geometry(),
            )?;
        }

        Command::Check {
            area,
            lat,
            lng,
            tolerance,
            lenient,
            all,
        } => {
            let text = read_input(&area)?;
            let value: Value =
                serde_json::from_str(&text).context("Area is not valid JSON")?;
            let area = load_area(value)?;

            let mut lookup = area.lookup();
            let tolerance =
                tolerance.or_else(|| lenient.then_some(config.containment.boundary_tolerance));
            if let Some(t) = tolerance {
                lookup = lookup.with_tolerance(t);
            }

            let policy = if all { MatchPolicy::All } else { MatchPolicy::First };
            let hits = lookup.locate(LatLng::new(lat, lng), policy);

            let out = json!({
                "inside": !hits.is_empty(),
                "zones": hits,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

/// Accept either a full record or a bare polygon value
fn load_area(value: Value) -> Result<ServiceArea> {
    if value.get("polygon").is_some() {
        let record: ServiceAreaRecord =
            serde_json::from_value(value).context("Invalid service-area record")?;
        return Ok(record.into_area());
    }

    let polygons = parse_polygon_input(&value)
        .context("Invalid polygon JSON")?
        .into_list();
    Ok(ServiceArea::new(
        Uuid::nil(),
        "inline",
        AreaGeometry::new(polygons),
    ))
}

fn print_record(name: String, geometry: AreaGeometry) -> Result<()> {
    let area = ServiceArea::new(Uuid::nil(), name, geometry);
    let record = ServiceAreaRecord::from_area(&area)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        return io::read_to_string(io::stdin()).context("Failed to read stdin");
    }
    fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
}

fn default_name(file: &Path) -> String {
    file.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Imported area")
        .to_string()
}
