//! The observation catalog.
//!
//! One JSON document, stored under a fixed id, maps datasource names to ids
//! and back, records the content hash of every ingested file, the data type
//! each datasource was registered under, and ranking overrides.
//!
//! The catalog is an explicit value: [`crate::Engine`] loads it once and
//! passes it by reference. Saves are guarded by the same revision check as
//! datasource descriptors.

pub mod rank;

pub use rank::{validate_site, SourceInfo};

use crate::daterange::Daterange;
use crate::datasource::{DataKind, Datasource};
use crate::error::{AerisError, Result};
use crate::store::{keys, Bucket, StoreError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

/// Supported observation data types.
///
/// Parsing any other name fails with [`AerisError::NotImplemented`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Cavity ring-down surface measurements.
    Crds,
    /// Gas chromatograph measurements.
    Gc,
    /// Footprint model output.
    Footprint,
}

impl DataType {
    /// All supported types.
    pub const ALL: [DataType; 3] = [Self::Crds, Self::Gc, Self::Footprint];

    /// Canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crds => "CRDS",
            Self::Gc => "GC",
            Self::Footprint => "FOOTPRINT",
        }
    }

    /// Storage shape used for streams of this type.
    pub fn kind(self) -> DataKind {
        match self {
            Self::Footprint => DataKind::Footprint,
            Self::Crds | Self::Gc => DataKind::Timeseries,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = AerisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRDS" | "SURFACE" => Ok(Self::Crds),
            "GC" => Ok(Self::Gc),
            "FOOTPRINT" => Ok(Self::Footprint),
            _ => Err(AerisError::NotImplemented(format!("data type {s}"))),
        }
    }
}

/// Persisted form of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogData {
    /// Datasource name to id.
    #[serde(default)]
    pub datasource_names: BTreeMap<String, Uuid>,
    /// Datasource id to name.
    #[serde(default)]
    pub datasource_uuids: BTreeMap<Uuid, String>,
    /// Content hash to the filename first ingested with it.
    #[serde(default)]
    pub file_hashes: BTreeMap<String, String>,
    /// Datasource id to ranked tiers (1 is best) and their ranges.
    #[serde(default)]
    pub rank_data: BTreeMap<Uuid, BTreeMap<u32, Vec<Daterange>>>,
    /// Datasource id to the data type it was ingested as.
    #[serde(default)]
    pub datasource_types: BTreeMap<Uuid, DataType>,
    /// Optimistic concurrency counter.
    #[serde(default)]
    pub revision: u64,
}

/// Name and dedup registry for all datasources in a bucket.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    data: CatalogData,
    /// Revision of the stored document this value was loaded from.
    loaded: Option<u64>,
}

impl Catalog {
    /// Creates an empty, unsaved catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the catalog, or returns a fresh one if none is stored.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Format` if the stored document does not parse.
    pub fn load(bucket: &Bucket) -> Result<Self> {
        let key = keys::catalog();
        match bucket.get(&key) {
            Ok(bytes) => {
                let value: serde_json::Value =
                    serde_json::from_slice(&bytes).map_err(|err| AerisError::format(&key, err))?;
                Self::from_data(value)
            }
            Err(StoreError::NotFound { .. }) => Ok(Self::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the catalog, bumping its revision.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::ConcurrentModification` if another writer saved
    /// the catalog since it was loaded.
    pub fn save(&mut self, bucket: &Bucket) -> Result<()> {
        self.check_revision(bucket)?;
        let key = keys::catalog();
        let mut data = self.data.clone();
        data.revision = self.loaded.map_or(1, |r| r + 1);
        bucket.set_json(&key, &data)?;
        self.data = data;
        self.loaded = Some(self.data.revision);
        info!(
            "Saved catalog at revision {} ({} datasources)",
            self.data.revision,
            self.data.datasource_uuids.len()
        );
        Ok(())
    }

    /// Fails with `AerisError::ConcurrentModification` if the stored
    /// document is no longer the one this value was loaded from.
    fn check_revision(&self, bucket: &Bucket) -> Result<()> {
        let key = keys::catalog();
        let found = bucket.revision_of(&key)?;
        if found != self.loaded {
            return Err(AerisError::ConcurrentModification {
                key,
                expected: self.loaded,
                found,
            });
        }
        Ok(())
    }

    /// Serializes the catalog document.
    pub fn to_data(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.data)?)
    }

    /// Rebuilds a catalog from a stored document.
    pub fn from_data(value: serde_json::Value) -> Result<Self> {
        let data: CatalogData =
            serde_json::from_value(value).map_err(|err| AerisError::format(keys::catalog(), err))?;
        let loaded = Some(data.revision);
        Ok(Self { data, loaded })
    }

    /// The raw maps.
    pub fn data(&self) -> &CatalogData {
        &self.data
    }

    /// Id registered for `name`.
    pub fn datasource_id(&self, name: &str) -> Option<Uuid> {
        self.data.datasource_names.get(name).copied()
    }

    /// Name registered for `id`.
    pub fn datasource_name(&self, id: &Uuid) -> Option<&str> {
        self.data.datasource_uuids.get(id).map(String::as_str)
    }

    /// Returns true if `id` is registered.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.datasource_uuids.contains_key(id)
    }

    /// All registered ids, sorted.
    pub fn datasource_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.data.datasource_uuids.keys()
    }

    /// Ids registered under `data_type`, sorted.
    pub fn ids_for_type(&self, data_type: DataType) -> Vec<Uuid> {
        self.data
            .datasource_types
            .iter()
            .filter(|(_, t)| **t == data_type)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Records the name↔id mapping and the data type of a datasource.
    pub fn register(&mut self, name: &str, id: Uuid, data_type: DataType) {
        if let Some(previous) = self.data.datasource_names.insert(name.to_string(), id) {
            if previous != id {
                warn!("Datasource name {} moved from {} to {}", name, previous, id);
                self.data.datasource_uuids.remove(&previous);
                self.data.datasource_types.remove(&previous);
            }
        }
        self.data.datasource_uuids.insert(id, name.to_string());
        self.data.datasource_types.insert(id, data_type);
    }

    /// Filename first ingested with content `hash`.
    pub fn ingested_as(&self, hash: &str) -> Option<&str> {
        self.data.file_hashes.get(hash).map(String::as_str)
    }

    /// Records that content `hash` was ingested from `filename`.
    pub fn record_hash(&mut self, hash: &str, filename: &str) {
        self.data
            .file_hashes
            .insert(hash.to_string(), filename.to_string());
    }

    /// Removes `id` from every map. Returns true if anything was removed.
    pub fn forget(&mut self, id: &Uuid) -> bool {
        let name = self.data.datasource_uuids.remove(id);
        if let Some(name) = &name {
            if self.data.datasource_names.get(name) == Some(id) {
                self.data.datasource_names.remove(name);
            }
        }
        let ranked = self.data.rank_data.remove(id).is_some();
        let typed = self.data.datasource_types.remove(id).is_some();
        name.is_some() || ranked || typed
    }

    /// Deletes a datasource and everything it stored, then saves the catalog.
    ///
    /// Tolerates datasources with no segments and catalog entries whose
    /// descriptor is already gone.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::NotFound` if neither the catalog nor the store
    /// knows `id`, and `AerisError::ConcurrentModification` before touching
    /// anything if this catalog is stale. A failed save leaves the in-memory
    /// catalog unchanged.
    pub fn delete(&mut self, bucket: &Bucket, id: &Uuid) -> Result<()> {
        self.check_revision(bucket)?;
        let stored = Datasource::exists(bucket, id)?;
        if !stored && !self.contains(id) {
            return Err(AerisError::NotFound {
                kind: "datasource",
                id: id.to_string(),
            });
        }

        if stored {
            Datasource::purge(bucket, id)?;
        } else {
            warn!("Datasource {} has no descriptor; sweeping payloads only", id);
            for key in bucket.list_names(&keys::data_prefix(id))? {
                bucket.delete(&key)?;
            }
            if let Some(name) = self.datasource_name(id) {
                bucket.delete(&keys::name_entry(name, id))?;
            }
        }

        let before = self.clone();
        self.forget(id);
        if let Err(err) = self.save(bucket) {
            *self = before;
            return Err(err);
        }
        info!("Deleted datasource {}", id);
        Ok(())
    }
}
