//! Version history of a datasource.
//!
//! Every save that adds data appends a version holding the complete set of
//! segment keys that make up the stream at that point. The serialized form
//! is a map from label to version, with `latest` aliasing the newest entry:
//!
//! ```text
//! {
//!   "v1":     {"created_at": "...", "keys": {"<daterange>": "data/uuid/<id>/v1/<daterange>"}},
//!   "v2":     {...},
//!   "latest": {...same as v2...}
//! }
//! ```

use crate::daterange::Daterange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Alias label for the newest version.
pub const LATEST: &str = "latest";

/// Segment keys by daterange.
pub type KeyMap = BTreeMap<Daterange, String>;

/// One entry of the version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// When the version was written.
    pub created_at: DateTime<Utc>,
    /// Every segment key live in this version.
    pub keys: KeyMap,
}

/// Ordered version history, `v1` first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Version>",
    into = "BTreeMap<String, Version>"
)]
pub struct VersionIndex {
    versions: Vec<Version>,
}

impl VersionIndex {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of versions, not counting the `latest` alias.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Returns true if nothing has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Label the next pushed version will get.
    pub fn next_label(&self) -> String {
        label(self.versions.len() + 1)
    }

    /// Newest version.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last()
    }

    /// Keys of the newest version, or an empty map.
    pub fn latest_keys(&self) -> KeyMap {
        self.latest().map(|v| v.keys.clone()).unwrap_or_default()
    }

    /// Looks up a version by label; accepts `latest`.
    pub fn get(&self, name: &str) -> Option<&Version> {
        if name == LATEST {
            return self.latest();
        }
        let index = parse_label(name)?;
        self.versions.get(index - 1)
    }

    /// Appends a version and returns its label.
    pub fn push(&mut self, keys: KeyMap, created_at: DateTime<Utc>) -> String {
        self.versions.push(Version { created_at, keys });
        label(self.versions.len())
    }

    /// Iterates `(label, version)` oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (String, &Version)> {
        self.versions
            .iter()
            .enumerate()
            .map(|(i, v)| (label(i + 1), v))
    }

    /// Every key referenced by any version.
    pub fn all_keys(&self) -> BTreeSet<String> {
        self.versions
            .iter()
            .flat_map(|v| v.keys.values().cloned())
            .collect()
    }
}

impl TryFrom<BTreeMap<String, Version>> for VersionIndex {
    type Error = String;

    fn try_from(mut map: BTreeMap<String, Version>) -> Result<Self, Self::Error> {
        let latest = map.remove(LATEST);
        let mut numbered = BTreeMap::new();
        for (name, version) in map {
            let index = parse_label(&name).ok_or_else(|| format!("invalid version label {name}"))?;
            numbered.insert(index, version);
        }
        if numbered.keys().copied().ne(1..=numbered.len()) {
            return Err("version labels are not contiguous from v1".to_string());
        }
        let versions: Vec<Version> = numbered.into_values().collect();
        if latest.as_ref() != versions.last() {
            return Err("latest does not match the newest version".to_string());
        }
        Ok(Self { versions })
    }
}

impl From<VersionIndex> for BTreeMap<String, Version> {
    fn from(index: VersionIndex) -> Self {
        let mut map: BTreeMap<String, Version> = BTreeMap::new();
        if let Some(last) = index.versions.last() {
            map.insert(LATEST.to_string(), last.clone());
        }
        for (i, version) in index.versions.into_iter().enumerate() {
            map.insert(label(i + 1), version);
        }
        map
    }
}

/// Computes the key set of a new version.
///
/// Starts from `previous`, removes every `superseded` range and every range
/// overlapping a newly `written` one, then adds `written`.
pub fn snapshot(previous: &KeyMap, written: &KeyMap, superseded: &BTreeSet<Daterange>) -> KeyMap {
    let mut keys: KeyMap = previous
        .iter()
        .filter(|(range, _)| !superseded.contains(range))
        .filter(|(range, _)| !written.keys().any(|w| w.overlaps(range)))
        .map(|(range, key)| (*range, key.clone()))
        .collect();
    keys.extend(written.iter().map(|(range, key)| (*range, key.clone())));
    keys
}

fn label(index: usize) -> String {
    format!("v{index}")
}

fn parse_label(name: &str) -> Option<usize> {
    let index: usize = name.strip_prefix('v')?.parse().ok()?;
    (index > 0).then_some(index)
}
