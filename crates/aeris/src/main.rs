//! `aeris` command-line front end.

use alopex_aeris::daterange::parse_instant;
use alopex_aeris::{
    AerisConfig, DataType, Daterange, Engine, IngestRequest, ObservationTable, SearchQuery,
    StoreConfig,
};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "aeris", version, about = "Versioned store for atmospheric observations")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Store data under this directory, overriding the configured store.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Bucket name, overriding the configured bucket.
    #[arg(long, global = true, value_name = "NAME")]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest observation files.
    Ingest(IngestArgs),
    /// Print the segment keys matching a query.
    Search(QueryArgs),
    /// Print the data matching a query.
    Fetch(QueryArgs),
    /// Delete a datasource and all of its data.
    Delete {
        /// Datasource id.
        id: Uuid,
    },
    /// List the datasources for a site and species.
    Sources {
        /// Three-letter site code.
        #[arg(long)]
        site: String,
        /// Species name.
        #[arg(long)]
        species: String,
    },
    /// Print the primary datasource for a site and species at an instant.
    Primary {
        /// Three-letter site code.
        #[arg(long)]
        site: String,
        /// Species name.
        #[arg(long)]
        species: String,
        /// Instant to resolve.
        #[arg(long, value_parser = parse_time)]
        at: DateTime<Utc>,
    },
    /// Rank a datasource over a date range.
    Rank {
        /// Datasource id.
        id: Uuid,
        /// Tier, 1 being the most preferred.
        #[arg(long)]
        tier: u32,
        /// Range start.
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,
        /// Range end.
        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,
    },
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Files to ingest.
    files: Vec<PathBuf>,
    /// Data type: CRDS, GC or FOOTPRINT.
    #[arg(long = "data-type", default_value = "CRDS")]
    data_type: DataType,
    /// Ingest every matching file below this directory instead.
    #[arg(long, value_name = "DIR")]
    folder: Option<PathBuf>,
    /// Extension used with --folder.
    #[arg(long, default_value = "dat")]
    extension: String,
    /// Site code override.
    #[arg(long)]
    site: Option<String>,
    /// Network name.
    #[arg(long)]
    network: Option<String>,
    /// Instrument name override.
    #[arg(long)]
    instrument: Option<String>,
    /// Replace covered data and re-ingest seen files.
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Data type: CRDS, GC or FOOTPRINT.
    #[arg(long = "data-type", default_value = "CRDS")]
    data_type: DataType,
    /// Search term; repeatable.
    #[arg(long = "term")]
    terms: Vec<String>,
    /// Location; repeatable.
    #[arg(long = "location")]
    locations: Vec<String>,
    /// Window start.
    #[arg(long, value_parser = parse_time)]
    start: Option<DateTime<Utc>>,
    /// Window end.
    #[arg(long, value_parser = parse_time)]
    end: Option<DateTime<Utc>>,
    /// Require every term to match.
    #[arg(long)]
    require_all: bool,
}

impl QueryArgs {
    fn query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.data_type)
            .with_terms(self.terms.iter().cloned())
            .with_locations(self.locations.iter().cloned())
            .with_require_all(self.require_all);
        query.start = self.start;
        query.end = self.end;
        query
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(raw).map_err(|err| err.to_string())
}

fn load_config(cli: &Cli) -> anyhow::Result<AerisConfig> {
    let mut config = match &cli.config {
        Some(path) => AerisConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => AerisConfig::default(),
    };
    if let Some(root) = &cli.root {
        config = config.with_local_store(root.clone());
    }
    if let Some(bucket) = &cli.bucket {
        config = config.with_bucket(bucket.clone());
    }
    Ok(config)
}

fn init_tracing(config: &AerisConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn table_json(table: &ObservationTable) -> Value {
    let columns: BTreeMap<&str, Vec<Option<f64>>> = table
        .columns()
        .map(|(name, values)| {
            let values = values
                .iter()
                .map(|v| if v.is_nan() { None } else { Some(*v) })
                .collect();
            (name, values)
        })
        .collect();
    json!({
        "timestamps": table.timestamps(),
        "columns": columns,
        "attributes": table.attributes(),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config);

    if matches!(config.store, StoreConfig::Memory) {
        warn!("Using the in-memory store; nothing will persist after exit");
    }
    let mut engine = Engine::open(config).context("opening store")?;

    match cli.command {
        Command::Ingest(args) => {
            let mut request = IngestRequest::new(args.data_type)
                .with_paths(args.files)
                .with_overwrite(args.overwrite);
            request.site = args.site;
            request.network = args.network;
            request.instrument = args.instrument;

            let report = match &args.folder {
                Some(dir) => engine.read_folder(dir, &args.extension, &request)?,
                None => engine.read_file(&request)?,
            };
            print_json(&report)?;
            if !report.is_success() {
                bail!("{} file(s) failed to ingest", report.failed.len());
            }
        }
        Command::Search(args) => {
            print_json(&engine.search(&args.query())?)?;
        }
        Command::Fetch(args) => {
            let results = engine.search(&args.query())?;
            let tables: BTreeMap<String, Value> = engine
                .get_data(&results)?
                .iter()
                .map(|(group, table)| (group.clone(), table_json(table)))
                .collect();
            print_json(&tables)?;
        }
        Command::Delete { id } => {
            engine.delete(&id)?;
            print_json(&json!({ "deleted": id }))?;
        }
        Command::Sources { site, species } => {
            print_json(&engine.get_sources(&site, &species)?)?;
        }
        Command::Primary { site, species, at } => {
            print_json(&json!({ "primary": engine.primary_source(&site, &species, at)? }))?;
        }
        Command::Rank {
            id,
            tier,
            start,
            end,
        } => {
            let daterange = Daterange::new(start, end)?;
            engine.set_rank(&id, tier, daterange)?;
            print_json(&engine.catalog().rank_data(&id))?;
        }
    }
    Ok(())
}
