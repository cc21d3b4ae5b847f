use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use catalog::{CATALOG_FILE_NAME, Catalog};
use clap::{Parser, Subcommand};
use engine::{BoundaryAggregator, DissolveEngine, EngineHandle};
use foundation::AdminLevel;
use layers::{InMemoryMap, Reconciler, StyleTable};
use session::{RecordedViewport, TiledSession};
use streaming::{ResourceSource, TileEndpoints, is_remote_root, open_data_root};
use tools::{DEFAULT_SIMPLIFY_TOLERANCE, build_catalog, export_country, simplify_regions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "GADM boundary data tools")]
struct Args {
    /// Directory or http(s):// base URL holding countries.json and the
    /// per-country raw-row files
    #[arg(long, env = "GADM_DATA_ROOT", default_value = "data", global = true)]
    data_root: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the data root and write countries.json
    Catalog {
        /// Output path (default: <data_root>/countries.json)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Tolerance recorded in the catalog, in degrees
        #[arg(long, default_value_t = DEFAULT_SIMPLIFY_TOLERANCE)]
        simplify_tolerance: f64,
    },

    /// Write simplified level_<L>.geojson files per country
    Export {
        #[arg(long, default_value = "exports")]
        out: PathBuf,

        /// Countries to export (default: all)
        #[arg(long)]
        country: Vec<String>,

        #[arg(long, default_value_t = DEFAULT_SIMPLIFY_TOLERANCE)]
        simplify_tolerance: f64,
    },

    /// Aggregate one country at one level and print GeoJSON
    Aggregate {
        #[arg(long)]
        country: String,

        #[arg(long)]
        level: u8,

        /// Simplification tolerance in degrees (0 disables)
        #[arg(long, default_value_t = 0.0)]
        simplify_tolerance: f64,
    },

    /// Print the map layers the tiled viewer would create
    Layers {
        #[arg(long)]
        country: String,

        /// Levels to toggle on
        #[arg(long)]
        level: Vec<u8>,

        #[arg(long, env = "GADM_TILE_URL", default_value = streaming::DEFAULT_TILE_URL_TEMPLATE)]
        tile_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Catalog {
            out,
            simplify_tolerance,
        } => {
            if is_remote_root(&args.data_root) {
                bail!("catalog scanning needs a local data root, got {}", args.data_root);
            }
            let data_root = PathBuf::from(&args.data_root);
            let catalog = build_catalog(&data_root, Some(simplify_tolerance))?;
            let out = out.unwrap_or_else(|| data_root.join(CATALOG_FILE_NAME));
            tokio::fs::write(&out, catalog.to_json_pretty()?)
                .await
                .with_context(|| format!("write {}", out.display()))?;
            info!(countries = catalog.len(), path = %out.display(), "catalog written");
        }
        Command::Export {
            out,
            country,
            simplify_tolerance,
        } => {
            let catalog = load_catalog(&args.data_root).await?;
            let aggregator = aggregator(&args.data_root).await?;
            let selected: Vec<_> = if country.is_empty() {
                catalog.countries().iter().collect()
            } else {
                country
                    .iter()
                    .map(|name| catalog.get(name).with_context(|| format!("unknown country {name:?}")))
                    .collect::<Result<_>>()?
            };
            let mut files = 0;
            for c in selected {
                files += export_country(&aggregator, c, &out, simplify_tolerance)
                    .await?
                    .len();
            }
            info!(files, out = %out.display(), "export finished");
        }
        Command::Aggregate {
            country,
            level,
            simplify_tolerance,
        } => {
            let catalog = load_catalog(&args.data_root).await?;
            let Some(entry) = catalog.get(&country) else {
                bail!("unknown country {country:?}");
            };
            let Some(level) = AdminLevel::new(level).filter(|l| entry.has_level(*l)) else {
                bail!("level {level} is not available for {country}");
            };
            let aggregator = aggregator(&args.data_root).await?;
            let mut regions = aggregator.aggregate(level, entry).await?;
            simplify_regions(&mut regions, simplify_tolerance);
            println!("{}", regions.to_geojson_string());
        }
        Command::Layers {
            country,
            level,
            tile_url,
        } => {
            let catalog = Arc::new(load_catalog(&args.data_root).await?);
            let reconciler = Reconciler::new(TileEndpoints::new(tile_url), StyleTable::default());
            let mut session = TiledSession::new(
                catalog,
                reconciler,
                InMemoryMap::new(),
                RecordedViewport::default(),
            );
            session.select_country(&country)?;
            for l in level {
                session.toggle_level(l)?;
            }
            info!(view = ?session.viewport().state, "dry run");
            println!("{}", serde_json::to_string_pretty(&session.map().to_style_json())?);
        }
    }
    Ok(())
}

async fn load_catalog(data_root: &str) -> Result<Catalog> {
    let source = open_data_root(data_root);
    Catalog::load(source.as_ref(), CATALOG_FILE_NAME)
        .await
        .with_context(|| format!("loading catalog from {}", source.describe()))
}

async fn aggregator(data_root: &str) -> Result<BoundaryAggregator> {
    let handle = Arc::new(EngineHandle::new(Arc::new(DissolveEngine::new())));
    handle.initialize().await?;
    Ok(BoundaryAggregator::new(handle, open_data_root(data_root)))
}
