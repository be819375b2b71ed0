//! Aeris - versioned observation store
//!
//! This crate catalogs atmospheric measurement time series and footprint
//! output in an object store, keeps a version history per stream, and
//! answers metadata searches with the storage keys of matching segments.
//!
//! # Components
//!
//! - [`Daterange`]: canonical, sortable date range keys
//! - [`segment`]: size-bounded calendar splitting and the Gorilla-compressed
//!   segment payload format
//! - [`store`]: the [`ObjectStore`] trait with in-memory and local backends
//! - [`Datasource`]: one versioned stream and its merge rules
//! - [`Catalog`]: name, dedup and ranking registry
//! - [`ingest`]: file hashing, parsing and routing
//! - [`search`]: metadata and date window resolution
//! - [`Engine`]: the aggregate root tying them together
//!
//! # Example
//!
//! ```rust,ignore
//! use alopex_aeris::{AerisConfig, DataType, Engine, IngestRequest, SearchQuery};
//!
//! let mut engine = Engine::open(AerisConfig::default().with_local_store("/data/aeris"))?;
//!
//! // Ingest raw instrument files
//! let report = engine.read_file(
//!     &IngestRequest::new(DataType::Crds)
//!         .with_path("bsd.picarro.1minute.248m.dat")
//!         .with_network("DECC"),
//! )?;
//!
//! // Find the CO2 segments for Bilsdale within a window
//! let results = engine.search(
//!     &SearchQuery::new(DataType::Crds)
//!         .with_terms(["co2"])
//!         .with_locations(["bsd"]),
//! )?;
//! let tables = engine.get_data(&results)?;
//! ```

#![deny(missing_docs)]

pub mod catalog;
pub mod config;
pub mod datasource;
pub mod daterange;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod search;
pub mod segment;
pub mod store;
pub mod table;

pub use catalog::{Catalog, DataType, SourceInfo};
pub use config::{AerisConfig, ByteSize, StoreConfig};
pub use datasource::{DataKind, Datasource};
pub use daterange::Daterange;
pub use engine::Engine;
pub use error::{AerisError, Result};
pub use ingest::{IngestReport, IngestRequest};
pub use metadata::Metadata;
pub use search::{SearchQuery, SearchResults};
pub use segment::{Segment, SegmentPolicy};
pub use store::{Bucket, LocalStore, MemoryStore, ObjectStore, StoreError};
pub use table::{ObservationTable, Timestamp};
