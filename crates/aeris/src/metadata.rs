//! Case-normalized metadata maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known metadata keys.
pub mod keys {
    /// Three-letter site code.
    pub const SITE: &str = "site";
    /// Measured species, e.g. `co2`.
    pub const SPECIES: &str = "species";
    /// Inlet label, e.g. `248m`.
    pub const INLET: &str = "inlet";
    /// Inlet height, used by some instruments instead of `inlet`.
    pub const HEIGHT: &str = "height";
    /// Instrument name.
    pub const INSTRUMENT: &str = "instrument";
    /// Measurement network.
    pub const NETWORK: &str = "network";
    /// Sampling resolution, e.g. `1_minute`.
    pub const TIME_RESOLUTION: &str = "time_resolution";
    /// Stream kind tag, `timeseries` or `footprint`.
    pub const DATA_TYPE: &str = "data_type";
}

/// A flat string map whose keys and values are always lowercase.
///
/// Every way of building a `Metadata` goes through [`Metadata::normalize`],
/// including deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from arbitrary key/value pairs, lowercasing both sides.
    /// Later pairs win on key collisions.
    pub fn normalize<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| {
                    (
                        k.as_ref().trim().to_lowercase(),
                        v.as_ref().trim().to_lowercase(),
                    )
                })
                .collect(),
        )
    }

    /// Inserts one pair, normalizing it.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.0.insert(
            key.as_ref().trim().to_lowercase(),
            value.as_ref().trim().to_lowercase(),
        );
    }

    /// Merges `other` into `self`; keys from `other` win.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Looks up a key (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Returns true if any value equals `term`, ignoring case.
    pub fn matches_value(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        self.0.values().any(|v| *v == term)
    }

    /// Iterates pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for Metadata {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::normalize(map)
    }
}

impl From<Metadata> for BTreeMap<String, String> {
    fn from(metadata: Metadata) -> Self {
        metadata.0
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::normalize(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_keys_and_values() {
        let md = Metadata::normalize([("Site", "BSD"), ("SPECIES", " CO2 ")]);
        assert_eq!(md.get("site"), Some("bsd"));
        assert_eq!(md.get("Species"), Some("co2"));
    }

    #[test]
    fn test_merge_new_keys_win() {
        let mut md = Metadata::normalize([("site", "bsd"), ("inlet", "108m")]);
        md.merge(&Metadata::normalize([("inlet", "248m"), ("port", "9")]));
        assert_eq!(md.get("inlet"), Some("248m"));
        assert_eq!(md.get("site"), Some("bsd"));
        assert_eq!(md.len(), 3);
    }

    #[test]
    fn test_matches_value_is_exact() {
        let md = Metadata::normalize([("species", "co2")]);
        assert!(md.matches_value("CO2"));
        assert!(!md.matches_value("co"));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let md: Metadata = serde_json::from_str(r#"{"Site": "TAC"}"#).unwrap();
        assert_eq!(md.get("site"), Some("tac"));
        assert_eq!(serde_json::to_string(&md).unwrap(), r#"{"site":"tac"}"#);
    }
}
