//! Service-level entry point.

use crate::catalog::{Catalog, DataType, SourceInfo};
use crate::config::AerisConfig;
use crate::daterange::Daterange;
use crate::datasource::Datasource;
use crate::error::Result;
use crate::ingest::{self, IngestReport, IngestRequest, ObservationParser, ParserRegistry};
use crate::search::{self, SearchQuery, SearchResults};
use crate::store::Bucket;
use crate::table::ObservationTable;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Owns the bucket handle, configuration, catalog and parsers, and exposes
/// every operation of the store.
///
/// # Examples
/// ```rust,ignore
/// use alopex_aeris::{AerisConfig, DataType, Engine, IngestRequest, SearchQuery};
///
/// let mut engine = Engine::open(AerisConfig::default().with_local_store("/data"))?;
/// engine.read_file(&IngestRequest::new(DataType::Crds).with_path("bsd.picarro.1minute.248m.dat"))?;
/// let results = engine.search(&SearchQuery::new(DataType::Crds).with_terms(["co2"]))?;
/// ```
#[derive(Debug)]
pub struct Engine {
    bucket: Bucket,
    config: AerisConfig,
    catalog: Catalog,
    parsers: ParserRegistry,
}

impl Engine {
    /// Opens the configured store and loads the catalog.
    pub fn open(config: AerisConfig) -> Result<Self> {
        let bucket = config.open_bucket()?;
        Self::with_bucket(bucket, config)
    }

    /// Uses an existing bucket handle instead of opening one from `config`.
    pub fn with_bucket(bucket: Bucket, config: AerisConfig) -> Result<Self> {
        let catalog = Catalog::load(&bucket)?;
        info!(
            "Opened bucket {} with {} datasources",
            bucket.name(),
            catalog.data().datasource_uuids.len()
        );
        Ok(Self {
            bucket,
            config,
            catalog,
            parsers: ParserRegistry::default(),
        })
    }

    /// Replaces the parser registry.
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Registers a parser for one data type.
    pub fn register_parser(&mut self, data_type: DataType, parser: Arc<dyn ObservationParser>) {
        self.parsers.register(data_type, parser);
    }

    /// Bucket handle.
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Configuration.
    pub fn config(&self) -> &AerisConfig {
        &self.config
    }

    /// Catalog as last loaded or saved.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Re-reads the catalog, discarding unsaved changes.
    pub fn reload_catalog(&mut self) -> Result<()> {
        self.catalog = Catalog::load(&self.bucket)?;
        Ok(())
    }

    /// Ingests the files in `request`.
    pub fn read_file(&mut self, request: &IngestRequest) -> Result<IngestReport> {
        ingest::read_file(
            &self.bucket,
            &mut self.catalog,
            &self.parsers,
            &self.config.segment_policy(),
            request,
        )
    }

    /// Ingests every `*.{extension}` file below `dir`.
    pub fn read_folder(
        &mut self,
        dir: &Path,
        extension: &str,
        request: &IngestRequest,
    ) -> Result<IngestReport> {
        ingest::read_folder(
            &self.bucket,
            &mut self.catalog,
            &self.parsers,
            &self.config.segment_policy(),
            dir,
            extension,
            request,
        )
    }

    /// Resolves a query to segment keys.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchResults> {
        search::search(&self.bucket, &self.catalog, query)
    }

    /// Fetches one concatenated table per search result group.
    pub fn get_data(&self, results: &SearchResults) -> Result<BTreeMap<String, ObservationTable>> {
        search::get_data(&self.bucket, results)
    }

    /// Loads one datasource.
    pub fn datasource(&self, id: &Uuid, shallow: bool) -> Result<Datasource> {
        Datasource::load(&self.bucket, id, shallow)
    }

    /// Deletes a datasource and all its data.
    pub fn delete(&mut self, id: &Uuid) -> Result<()> {
        self.catalog.delete(&self.bucket, id)
    }

    /// Lists candidate datasources for a site and species.
    pub fn get_sources(&self, site: &str, species: &str) -> Result<BTreeMap<String, SourceInfo>> {
        self.catalog.get_sources(&self.bucket, site, species)
    }

    /// Ranks a datasource over `daterange` and saves the catalog.
    pub fn set_rank(&mut self, id: &Uuid, tier: u32, daterange: Daterange) -> Result<()> {
        let before = self.catalog.clone();
        self.catalog.set_rank(id, tier, daterange)?;
        if let Err(err) = self.catalog.save(&self.bucket) {
            self.catalog = before;
            return Err(err);
        }
        info!("Ranked datasource {} as tier {} over {}", id, tier, daterange);
        Ok(())
    }

    /// Primary datasource for a site and species at `at`.
    pub fn primary_source(
        &self,
        site: &str,
        species: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        self.catalog.primary_source(&self.bucket, site, species, at)
    }
}
