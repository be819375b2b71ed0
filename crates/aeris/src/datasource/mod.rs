//! Versioned container for one logical observation stream.
//!
//! A [`Datasource`] owns the working set of segments for a stream, the
//! version history of what has been persisted, and the merge rules that keep
//! segments from silently overlapping.
//!
//! # Persistence
//!
//! `save` writes every segment added since the last save under a new
//! version label, then the JSON descriptor at `datasource/uuid/{id}`, then
//! the name index marker. Payloads are always in place before the
//! descriptor that references them.
//!
//! Descriptors carry a `revision`. `save` fails with
//! [`AerisError::ConcurrentModification`] if the stored revision changed
//! since this value was loaded.

pub mod version;

pub use version::{snapshot, Version, VersionIndex, LATEST};

use crate::daterange::Daterange;
use crate::error::{AerisError, Result};
use crate::metadata::{keys as md, Metadata};
use crate::segment::codec::{decode_table, SegmentWriter};
use crate::segment::{split, SegmentPolicy};
use crate::store::{keys, Bucket, StoreError};
use crate::table::ObservationTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Site reported when the metadata carries none.
pub const UNKNOWN_SITE: &str = "unknown";

/// Storage shape of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Date-partitioned time series.
    #[default]
    Timeseries,
    /// Model output stored as a single segment.
    Footprint,
}

impl DataKind {
    /// Value written to the `data_type` metadata tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeseries => "timeseries",
            Self::Footprint => "footprint",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Descriptor {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    data_type: DataKind,
    start_datetime: Option<DateTime<Utc>>,
    end_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    versions: VersionIndex,
    revision: u64,
}

/// One logical stream: a site/species/inlet series or a footprint.
#[derive(Debug, Clone)]
pub struct Datasource {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    metadata: Metadata,
    kind: DataKind,
    segments: BTreeMap<Daterange, ObservationTable>,
    versions: VersionIndex,
    /// Ranges added since the last save.
    pending: BTreeSet<Daterange>,
    /// Persisted ranges dropped since the last save.
    superseded: BTreeSet<Daterange>,
    bounds: Option<Daterange>,
    policy: SegmentPolicy,
    /// Revision of the stored descriptor this value was loaded from.
    revision: Option<u64>,
}

impl Datasource {
    /// Creates an empty, unsaved datasource with a fresh id.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Validation` if `name` is blank.
    pub fn create(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AerisError::validation("datasource name must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
            metadata: Metadata::new(),
            kind: DataKind::default(),
            segments: BTreeMap::new(),
            versions: VersionIndex::new(),
            pending: BTreeSet::new(),
            superseded: BTreeSet::new(),
            bounds: None,
            policy: SegmentPolicy::default(),
            revision: None,
        })
    }

    /// Sets the segmentation policy used by later `add_data` calls.
    pub fn with_policy(mut self, policy: SegmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merges `table` into the stream.
    ///
    /// Metadata is merged first-wins-last: keys in `metadata` replace stored
    /// ones. A `data_type` of `footprint` switches the stream to single-segment
    /// storage.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Overlap` if the stream already holds data, the
    /// incoming range lies entirely inside its coverage, and `overwrite`
    /// is false. Nothing is modified in that case.
    ///
    /// # Examples
    /// ```rust,ignore
    /// let mut ds = Datasource::create("bsd.picarro.1minute.248m_co2")?;
    /// ds.add_data(&metadata, table, false)?;
    /// ds.save(&bucket)?;
    /// ```
    pub fn add_data(
        &mut self,
        metadata: &Metadata,
        table: ObservationTable,
        overwrite: bool,
    ) -> Result<()> {
        let Some(incoming) = table.daterange()? else {
            debug!("Ignoring empty table for datasource {}", self.name);
            return Ok(());
        };

        let existing = self.existing_ranges();
        if let Some(coverage) = Daterange::hull(&existing) {
            if coverage.contains(&incoming) && !overwrite {
                return Err(AerisError::Overlap {
                    name: self.name.clone(),
                    incoming: incoming.to_string(),
                    existing: coverage.to_string(),
                });
            }
        }

        self.metadata.merge(metadata);
        if metadata.get(md::DATA_TYPE) == Some(DataKind::Footprint.as_str()) {
            self.kind = DataKind::Footprint;
        }

        let segments = match self.kind {
            DataKind::Timeseries => split::split(&table, &self.policy)?,
            DataKind::Footprint => split::whole(&table)?,
        };

        let persisted = self.versions.latest_keys();
        for range in existing {
            if segments.iter().any(|s| s.daterange.overlaps(&range)) {
                self.segments.remove(&range);
                self.pending.remove(&range);
                if persisted.contains_key(&range) {
                    self.superseded.insert(range);
                }
                debug!("Datasource {} drops segment {}", self.name, range);
            }
        }

        for segment in segments {
            self.pending.insert(segment.daterange);
            self.segments.insert(segment.daterange, segment.table);
        }

        self.metadata.insert(md::DATA_TYPE, self.kind.as_str());
        self.bounds = Daterange::hull(&self.existing_ranges());
        Ok(())
    }

    /// Persists pending segments and the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::ConcurrentModification` if the stored descriptor
    /// changed since this value was loaded, and propagates store errors.
    pub fn save(&mut self, bucket: &Bucket) -> Result<()> {
        let key = keys::datasource(&self.id);
        let found = bucket.revision_of(&key)?;
        if found != self.revision {
            return Err(AerisError::ConcurrentModification {
                key,
                expected: self.revision,
                found,
            });
        }

        if !self.pending.is_empty() {
            let label = self.versions.next_label();
            let writer = SegmentWriter::new();
            let mut written = BTreeMap::new();
            for range in &self.pending {
                let Some(table) = self.segments.get(range) else {
                    continue;
                };
                let segment_key = keys::segment(&self.id, &label, range);
                let mut tmp = NamedTempFile::new()?;
                writer.write_to(table, tmp.as_file_mut())?;
                bucket.set_from_file(&segment_key, tmp.path())?;
                debug!("Wrote segment {} ({} rows)", segment_key, table.len());
                written.insert(*range, segment_key);
            }
            let next = snapshot(&self.versions.latest_keys(), &written, &self.superseded);
            self.versions.push(next, Utc::now());
        }

        let revision = self.revision.map_or(1, |r| r + 1);
        bucket.set_json(&key, &self.descriptor(revision))?;
        bucket.set(&keys::name_entry(&self.name, &self.id), self.id.to_string().as_bytes())?;

        self.revision = Some(revision);
        self.pending.clear();
        self.superseded.clear();
        info!(
            "Saved datasource {} ({}) at revision {} with {} versions",
            self.name,
            self.id,
            revision,
            self.versions.len()
        );
        Ok(())
    }

    /// Loads a datasource. A shallow load reads only the descriptor; a deep
    /// load also materializes every segment of the latest version.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::NotFound` if no descriptor exists and
    /// `AerisError::Format` if it cannot be parsed.
    pub fn load(bucket: &Bucket, id: &Uuid, shallow: bool) -> Result<Self> {
        let key = keys::datasource(id);
        let bytes = match bucket.get(&key) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => {
                return Err(AerisError::NotFound {
                    kind: "datasource",
                    id: id.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        let descriptor: Descriptor =
            serde_json::from_slice(&bytes).map_err(|err| AerisError::format(&key, err))?;

        let bounds = match (descriptor.start_datetime, descriptor.end_datetime) {
            (Some(start), Some(end)) => Some(Daterange::new(start, end)?),
            _ => None,
        };
        let mut datasource = Self {
            id: descriptor.id,
            name: descriptor.name,
            created_at: descriptor.created_at,
            metadata: descriptor.metadata,
            kind: descriptor.data_type,
            segments: BTreeMap::new(),
            versions: descriptor.versions,
            pending: BTreeSet::new(),
            superseded: BTreeSet::new(),
            bounds,
            policy: SegmentPolicy::default(),
            revision: Some(descriptor.revision),
        };
        if !shallow {
            datasource.load_segments(bucket)?;
        }
        Ok(datasource)
    }

    /// Reads every segment of the latest version into the working set.
    pub fn load_segments(&mut self, bucket: &Bucket) -> Result<()> {
        for (range, key) in self.versions.latest_keys() {
            if self.segments.contains_key(&range) {
                continue;
            }
            let table = decode_table(&bucket.get(&key)?)?;
            self.segments.insert(range, table);
        }
        Ok(())
    }

    /// Returns true if a descriptor exists for `id`.
    pub fn exists(bucket: &Bucket, id: &Uuid) -> Result<bool> {
        Ok(bucket.exists(&keys::datasource(id))?)
    }

    /// Resolves a datasource id from the name index.
    ///
    /// Markers whose descriptor is missing are skipped.
    pub fn find_by_name(bucket: &Bucket, name: &str) -> Result<Option<Uuid>> {
        for entry in bucket.list_names(&keys::name_prefix(name))? {
            let Some(id) = entry.rsplit('/').next().and_then(|s| Uuid::parse_str(s).ok()) else {
                warn!("Skipping malformed name index entry {}", entry);
                continue;
            };
            if Self::exists(bucket, &id)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Removes every stored trace of the datasource `id` and returns the
    /// number of payloads deleted.
    ///
    /// Deletes each key referenced by any version, any payload left under the
    /// datasource's data prefix, the descriptor, and its name index marker.
    pub fn purge(bucket: &Bucket, id: &Uuid) -> Result<usize> {
        let datasource = Self::load(bucket, id, true)?;
        let mut payloads = datasource.versions.all_keys();
        payloads.extend(bucket.list_names(&keys::data_prefix(id))?);
        for key in &payloads {
            bucket.delete(key)?;
        }
        bucket.delete(&keys::datasource(id))?;
        bucket.delete(&keys::name_entry(&datasource.name, id))?;
        info!(
            "Purged datasource {} ({}) and {} payloads",
            datasource.name,
            id,
            payloads.len()
        );
        Ok(payloads.len())
    }

    /// Undoes the saves made to datasource `id` since `before` was loaded.
    ///
    /// With no `before` the datasource did not exist and is purged. Otherwise
    /// every payload under the data prefix that `before` does not reference
    /// is deleted and, if the descriptor moved on, `before` is written back
    /// under the next revision. Returns the number of payloads deleted.
    pub fn rollback(bucket: &Bucket, id: &Uuid, before: Option<&Datasource>) -> Result<usize> {
        let Some(before) = before else {
            if Self::exists(bucket, id)? {
                return Self::purge(bucket, id);
            }
            let orphans = bucket.list_names(&keys::data_prefix(id))?;
            for key in &orphans {
                bucket.delete(key)?;
            }
            return Ok(orphans.len());
        };

        let kept = before.versions.all_keys();
        let mut removed = 0;
        for key in bucket.list_names(&keys::data_prefix(id))? {
            if !kept.contains(&key) {
                bucket.delete(&key)?;
                removed += 1;
            }
        }

        let key = keys::datasource(id);
        if let Some(found) = bucket.revision_of(&key)? {
            if Some(found) != before.revision {
                bucket.set_json(&key, &before.descriptor(found + 1))?;
            }
        }
        info!(
            "Rolled datasource {} ({}) back to {} versions, {} payloads removed",
            before.name,
            id,
            before.versions.len(),
            removed
        );
        Ok(removed)
    }

    fn descriptor(&self, revision: u64) -> Descriptor {
        Descriptor {
            id: self.id,
            name: self.name.clone(),
            created_at: self.created_at,
            metadata: self.metadata.clone(),
            data_type: self.kind,
            start_datetime: self.bounds.map(|b| b.start()),
            end_datetime: self.bounds.map(|b| b.end()),
            versions: self.versions.clone(),
            revision,
        }
    }

    /// Working-set ranges plus persisted ranges not yet superseded.
    fn existing_ranges(&self) -> BTreeSet<Daterange> {
        self.versions
            .latest_keys()
            .into_keys()
            .filter(|range| !self.superseded.contains(range))
            .chain(self.segments.keys().copied())
            .collect()
    }

    /// Datasource id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Storage shape of the stream.
    pub fn data_type(&self) -> DataKind {
        self.kind
    }

    /// Overall coverage, or `None` for an empty stream.
    ///
    /// Falls back to the hull of the latest version's ranges when the
    /// descriptor carried no bounds.
    pub fn daterange(&self) -> Option<Daterange> {
        self.bounds
            .or_else(|| Daterange::hull(self.versions.latest_keys().keys()))
    }

    /// Normalized metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns true if any metadata value equals `term`, ignoring case.
    pub fn search_metadata(&self, term: &str) -> bool {
        self.metadata.matches_value(term)
    }

    /// `species` metadata value.
    pub fn species(&self) -> Option<&str> {
        self.metadata.get(md::SPECIES)
    }

    /// `inlet` metadata value.
    pub fn inlet(&self) -> Option<&str> {
        self.metadata.get(md::INLET)
    }

    /// `site` metadata value, or [`UNKNOWN_SITE`].
    pub fn site(&self) -> &str {
        self.metadata.get(md::SITE).unwrap_or(UNKNOWN_SITE)
    }

    /// Version history.
    pub fn versions(&self) -> &VersionIndex {
        &self.versions
    }

    /// Segment keys of the latest version, in daterange order.
    pub fn data_keys(&self) -> Vec<String> {
        self.versions.latest_keys().into_values().collect()
    }

    /// In-memory working set.
    pub fn segments(&self) -> &BTreeMap<Daterange, ObservationTable> {
        &self.segments
    }

    /// Revision of the stored descriptor, or `None` if never saved.
    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    /// Returns true if data was added since the last save.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> i64 {
        Utc.with_ymd_and_hms(2019, 1, d, 0, 0, 0).unwrap().timestamp()
    }

    fn hourly(from: i64, hours: i64, base: f64) -> ObservationTable {
        let rows: Vec<(i64, Vec<f64>)> = (0..hours)
            .map(|i| (from + i * 3600, vec![base + i as f64]))
            .collect();
        ObservationTable::from_rows(&["co2"], &rows).unwrap()
    }

    fn co2_metadata() -> Metadata {
        Metadata::normalize([("site", "BSD"), ("species", "CO2"), ("inlet", "248m")])
    }

    #[test]
    fn test_create_rejects_blank_name() {
        assert!(matches!(
            Datasource::create("  "),
            Err(AerisError::Validation(_))
        ));
    }

    #[test]
    fn test_add_data_sets_metadata_and_bounds() {
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 48, 400.0), false)
            .unwrap();
        assert_eq!(ds.site(), "bsd");
        assert_eq!(ds.species(), Some("co2"));
        assert_eq!(ds.metadata().get("data_type"), Some("timeseries"));
        let bounds = ds.daterange().unwrap();
        assert_eq!(bounds.start().timestamp(), day(1));
        assert_eq!(bounds.end().timestamp(), day(1) + 47 * 3600);
        assert!(ds.has_pending());
    }

    #[test]
    fn test_contained_data_needs_overwrite() {
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 240, 400.0), false)
            .unwrap();
        let before = ds.segments().clone();

        let err = ds
            .add_data(&co2_metadata(), hourly(day(3), 24, 500.0), false)
            .unwrap_err();
        assert!(matches!(err, AerisError::Overlap { .. }));
        assert_eq!(ds.segments(), &before);

        ds.add_data(&co2_metadata(), hourly(day(3), 24, 500.0), true)
            .unwrap();
        let values: Vec<f64> = ds
            .segments()
            .values()
            .flat_map(|t| t.column("co2").unwrap().to_vec())
            .collect();
        assert!(values.contains(&500.0));
    }

    #[test]
    fn test_extending_data_drops_overlapping_segments() {
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 48, 400.0), false)
            .unwrap();
        ds.add_data(&co2_metadata(), hourly(day(2), 48, 500.0), false)
            .unwrap();
        assert_eq!(ds.segments().len(), 1);
        let (range, table) = ds.segments().iter().next().unwrap();
        assert_eq!(range.start().timestamp(), day(2));
        assert_eq!(table.column("co2").unwrap()[0], 500.0);
        assert_eq!(ds.daterange().unwrap().start().timestamp(), day(2));
    }

    #[test]
    fn test_footprint_is_one_segment() {
        let mut ds = Datasource::create("tac_footprint")
            .unwrap()
            .with_policy(SegmentPolicy::default().with_max_segment_size(1));
        let mut metadata = co2_metadata();
        metadata.insert("data_type", "footprint");
        ds.add_data(&metadata, hourly(day(1), 72, 1.0), false).unwrap();
        assert_eq!(ds.data_type(), DataKind::Footprint);
        assert_eq!(ds.segments().len(), 1);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 48, 400.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();
        assert_eq!(ds.revision(), Some(1));
        assert_eq!(ds.versions().len(), 1);
        assert!(!ds.has_pending());

        let shallow = Datasource::load(&bucket, &ds.id(), true).unwrap();
        assert!(shallow.segments().is_empty());
        assert_eq!(shallow.data_keys(), ds.data_keys());
        assert_eq!(shallow.daterange(), ds.daterange());
        assert_eq!(shallow.metadata(), ds.metadata());

        let deep = Datasource::load(&bucket, &ds.id(), false).unwrap();
        assert_eq!(deep.segments(), ds.segments());
        assert_eq!(
            Datasource::find_by_name(&bucket, "bsd_co2").unwrap(),
            Some(ds.id())
        );
    }

    #[test]
    fn test_shallow_load_still_guards_overlap() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 240, 400.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();

        let mut shallow = Datasource::load(&bucket, &ds.id(), true).unwrap();
        assert!(matches!(
            shallow.add_data(&co2_metadata(), hourly(day(2), 5, 1.0), false),
            Err(AerisError::Overlap { .. })
        ));
    }

    #[test]
    fn test_missing_and_corrupt_descriptor() {
        let bucket = Bucket::in_memory("obs");
        let id = Uuid::new_v4();
        assert!(matches!(
            Datasource::load(&bucket, &id, true),
            Err(AerisError::NotFound { .. })
        ));
        bucket.set(&keys::datasource(&id), b"{not json").unwrap();
        assert!(matches!(
            Datasource::load(&bucket, &id, true),
            Err(AerisError::Format { .. })
        ));
    }

    #[test]
    fn test_daterange_falls_back_to_latest_keys() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 24, 400.0), false)
            .unwrap();
        ds.add_data(&co2_metadata(), hourly(day(20), 24, 410.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();

        let key = keys::datasource(&ds.id());
        let mut stored: serde_json::Value = bucket.get_json(&key).unwrap();
        let fields = stored.as_object_mut().unwrap();
        fields.remove("start_datetime");
        fields.remove("end_datetime");
        bucket.set_json(&key, &stored).unwrap();

        let loaded = Datasource::load(&bucket, &ds.id(), true).unwrap();
        let bounds = loaded.daterange().unwrap();
        assert_eq!(bounds.start().timestamp(), day(1));
        assert_eq!(bounds.end().timestamp(), day(20) + 23 * 3600);
        assert!(Datasource::create("empty").unwrap().daterange().is_none());
    }

    #[test]
    fn test_rollback_restores_previous_version() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 24, 400.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();
        let before = Datasource::load(&bucket, &ds.id(), true).unwrap();

        ds.add_data(&co2_metadata(), hourly(day(5), 24, 410.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();
        assert_eq!(ds.versions().len(), 2);

        let removed = Datasource::rollback(&bucket, &ds.id(), Some(&before)).unwrap();
        assert_eq!(removed, 1);

        let restored = Datasource::load(&bucket, &ds.id(), true).unwrap();
        assert_eq!(restored.versions().len(), 1);
        assert_eq!(restored.revision(), Some(3));
        assert_eq!(restored.daterange(), before.daterange());
        assert_eq!(
            bucket.list_names(&keys::data_prefix(&ds.id())).unwrap(),
            before.data_keys()
        );
    }

    #[test]
    fn test_rollback_of_new_datasource_purges_it() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 24, 400.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();

        assert_eq!(Datasource::rollback(&bucket, &ds.id(), None).unwrap(), 1);
        assert!(bucket.list_names("").unwrap().is_empty());
        assert_eq!(Datasource::rollback(&bucket, &ds.id(), None).unwrap(), 0);
    }

    #[test]
    fn test_stale_copy_cannot_save() {
        let bucket = Bucket::in_memory("obs");
        let mut ds = Datasource::create("bsd_co2").unwrap();
        ds.add_data(&co2_metadata(), hourly(day(1), 24, 400.0), false)
            .unwrap();
        ds.save(&bucket).unwrap();

        let mut first = Datasource::load(&bucket, &ds.id(), true).unwrap();
        let mut second = Datasource::load(&bucket, &ds.id(), true).unwrap();
        first
            .add_data(&co2_metadata(), hourly(day(5), 24, 1.0), false)
            .unwrap();
        first.save(&bucket).unwrap();

        second
            .add_data(&co2_metadata(), hourly(day(9), 24, 2.0), false)
            .unwrap();
        assert!(matches!(
            second.save(&bucket),
            Err(AerisError::ConcurrentModification {
                expected: Some(1),
                found: Some(2),
                ..
            })
        ));
    }
}
