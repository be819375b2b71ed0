//! File ingestion.
//!
//! For each file: hash the content, refuse already-seen content unless
//! overwriting, parse it into per-species tables, merge each species into
//! its datasource and save it, and only then register the datasources and
//! the file hash in the catalog.
//!
//! Files are independent. A failing file is reported in
//! [`IngestReport::failed`] and the remaining files still run. Datasources
//! saved for a file that then fails are rolled back, so the file can be
//! ingested again.

pub mod parser;

pub use parser::{
    DelimitedParser, ObservationParser, ParseContext, ParsedSpecies, ParserRegistry,
};

use crate::catalog::{Catalog, DataType};
use crate::datasource::Datasource;
use crate::error::{AerisError, Result};
use crate::segment::SegmentPolicy;
use crate::store::Bucket;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_128;

/// Files to ingest and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// Input files.
    pub paths: Vec<PathBuf>,
    /// Data type selecting the parser.
    pub data_type: DataType,
    /// Site override.
    pub site: Option<String>,
    /// Network override.
    pub network: Option<String>,
    /// Instrument override.
    pub instrument: Option<String>,
    /// Replace covered data and re-ingest seen files.
    pub overwrite: bool,
}

impl IngestRequest {
    /// Creates a request with no files.
    pub fn new(data_type: DataType) -> Self {
        Self {
            paths: Vec::new(),
            data_type,
            site: None,
            network: None,
            instrument: None,
            overwrite: false,
        }
    }

    /// Adds one input file.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Replaces the input files.
    pub fn with_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the site override.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Sets the network override.
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Sets the instrument override.
    pub fn with_instrument(mut self, instrument: impl Into<String>) -> Self {
        self.instrument = Some(instrument.into());
        self
    }

    /// Sets the overwrite flag.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn context(&self) -> ParseContext {
        ParseContext {
            data_type: self.data_type,
            site: self.site.clone(),
            network: self.network.clone(),
            instrument: self.instrument.clone(),
        }
    }
}

/// Outcome of a multi-file ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Filename to species to datasource id.
    pub ingested: BTreeMap<String, BTreeMap<String, Uuid>>,
    /// Filename to error message.
    pub failed: BTreeMap<String, String>,
}

impl IngestReport {
    /// Returns true if no file failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Content hash used for dedup: xxh3-128 as 32 hex digits.
pub fn hash_content(content: &[u8]) -> String {
    format!("{:032x}", xxh3_128(content))
}

/// Ingests every file in `request`.
///
/// # Errors
///
/// Fails up front only if no parser is registered for the data type;
/// per-file errors land in the report.
pub fn read_file(
    bucket: &Bucket,
    catalog: &mut Catalog,
    parsers: &ParserRegistry,
    policy: &SegmentPolicy,
    request: &IngestRequest,
) -> Result<IngestReport> {
    let parser = parsers.get(request.data_type)?;
    let context = request.context();
    let mut report = IngestReport::default();

    for path in &request.paths {
        let filename = display_name(path);
        match ingest_one(bucket, catalog, parser.as_ref(), policy, request, &context, path) {
            Ok(species) => {
                info!("Ingested {} ({} species)", filename, species.len());
                report.ingested.insert(filename, species);
            }
            Err(err) => {
                warn!("Failed to ingest {}: {}", filename, err);
                report.failed.insert(filename, err.to_string());
            }
        }
    }
    Ok(report)
}

/// Ingests every file under `dir` (recursively) whose extension matches,
/// in sorted path order. Paths already in `request` are replaced.
///
/// # Errors
///
/// Returns `AerisError::NotFound` if no file matches.
pub fn read_folder(
    bucket: &Bucket,
    catalog: &mut Catalog,
    parsers: &ParserRegistry,
    policy: &SegmentPolicy,
    dir: &Path,
    extension: &str,
    request: &IngestRequest,
) -> Result<IngestReport> {
    let extension = extension.trim_start_matches('.');
    let mut paths = Vec::new();
    collect_files(dir, extension, &mut paths)?;
    if paths.is_empty() {
        return Err(AerisError::NotFound {
            kind: "data files",
            id: format!("{}/**/*.{extension}", dir.display()),
        });
    }
    paths.sort();
    let request = request.clone().with_paths(paths);
    read_file(bucket, catalog, parsers, policy, &request)
}

fn ingest_one(
    bucket: &Bucket,
    catalog: &mut Catalog,
    parser: &dyn ObservationParser,
    policy: &SegmentPolicy,
    request: &IngestRequest,
    context: &ParseContext,
    path: &Path,
) -> Result<BTreeMap<String, Uuid>> {
    let filename = display_name(path);
    let content = fs::read(path)?;
    let hash = hash_content(&content);
    if let Some(previous) = catalog.ingested_as(&hash) {
        if !request.overwrite {
            return Err(AerisError::DuplicateIngest {
                filename: previous.to_string(),
                hash,
            });
        }
    }

    let parsed = parser.parse(path, &content, context)?;
    if parsed.is_empty() {
        return Err(AerisError::validation(format!("{filename}: no species found")));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    let mut assigned = BTreeMap::new();
    let mut touched = Vec::with_capacity(parsed.len());
    let outcome = parsed.into_iter().try_for_each(|species| -> Result<()> {
        let name = format!("{stem}_{}", species.species);
        let mut datasource = resolve(bucket, catalog, &name)?.with_policy(*policy);
        let before = datasource.revision().map(|_| datasource.clone());
        touched.push((name, datasource.id(), before));
        datasource.add_data(&species.metadata, species.table, request.overwrite)?;
        datasource.save(bucket)?;
        assigned.insert(species.species, datasource.id());
        Ok(())
    });

    let outcome = outcome.and_then(|()| {
        let before = catalog.clone();
        for (name, id, _) in &touched {
            catalog.register(name, *id, request.data_type);
        }
        catalog.record_hash(&hash, &filename);
        catalog.save(bucket).map_err(|err| {
            *catalog = before;
            err
        })
    });

    if let Err(err) = outcome {
        roll_back(bucket, &filename, &touched);
        return Err(err);
    }
    Ok(assigned)
}

/// Reverts every datasource a failed file wrote to, newest first, so the
/// file can be ingested again.
fn roll_back(bucket: &Bucket, filename: &str, touched: &[(String, Uuid, Option<Datasource>)]) {
    for (name, id, before) in touched.iter().rev() {
        if let Err(err) = Datasource::rollback(bucket, id, before.as_ref()) {
            warn!(
                "Could not roll back datasource {} ({}) after {} failed: {}",
                name, id, filename, err
            );
        }
    }
}

/// Finds the datasource for `name` through the catalog, then the name index,
/// or creates a new one.
fn resolve(bucket: &Bucket, catalog: &Catalog, name: &str) -> Result<Datasource> {
    if let Some(id) = catalog.datasource_id(name) {
        match Datasource::load(bucket, &id, true) {
            Ok(datasource) => return Ok(datasource),
            Err(AerisError::NotFound { .. }) => {
                warn!("Catalog entry {} points at missing datasource {}", name, id);
            }
            Err(err) => return Err(err),
        }
    }
    if let Some(id) = Datasource::find_by_name(bucket, name)? {
        warn!("Recovered unregistered datasource {} for {}", id, name);
        return Datasource::load(bucket, &id, true);
    }
    Datasource::create(name)
}

fn collect_files(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, extension, out)?;
        } else if path.extension().is_some_and(|e| e == extension) {
            out.push(path);
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
