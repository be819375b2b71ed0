//! Metadata search over the catalog.
//!
//! A query names a data type, optional locations, optional search terms and
//! a date window. The result maps a composite key per matched group to the
//! segment keys of the latest version that lie fully inside the window.
//!
//! Key shapes:
//!
//! ```text
//! any term:    {location}_{term}_{inlet}
//! all terms:   {location}_{sorted terms joined by _}_{inlet}
//! no terms:    {location}_{species}_{inlet}
//! ```
//!
//! The inlet part joins the datasource's `inlet` and `height` values and is
//! left out when both are missing.

use crate::catalog::{Catalog, DataType};
use crate::daterange::Daterange;
use crate::datasource::Datasource;
use crate::error::{AerisError, Result};
use crate::metadata::keys;
use crate::segment::decode_table;
use crate::store::Bucket;
use crate::table::ObservationTable;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Composite key to segment keys.
pub type SearchResults = BTreeMap<String, Vec<String>>;

/// A search request.
///
/// # Examples
/// ```rust,ignore
/// use alopex_aeris::{DataType, SearchQuery};
///
/// let query = SearchQuery::new(DataType::Crds)
///     .with_terms(["co2", "ch4"])
///     .with_locations(["bsd"])
///     .with_require_all(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Data type to search.
    pub data_type: DataType,
    /// Metadata values to match, e.g. species names.
    pub terms: Vec<String>,
    /// Metadata values defining groups, e.g. site codes.
    pub locations: Vec<String>,
    /// Window start; the Unix epoch when unset.
    pub start: Option<DateTime<Utc>>,
    /// Window end; now when unset.
    pub end: Option<DateTime<Utc>>,
    /// Require every term to match one datasource.
    pub require_all: bool,
}

impl SearchQuery {
    /// Creates a query with no filters.
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            terms: Vec::new(),
            locations: Vec::new(),
            start: None,
            end: None,
            require_all: false,
        }
    }

    /// Sets the search terms.
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the locations.
    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the window start.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the window end.
    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Sets AND matching of terms.
    pub fn with_require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    fn window(&self) -> Result<Daterange> {
        let start = self.start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = self.end.unwrap_or_else(Utc::now);
        if start > end {
            return Err(AerisError::validation(format!(
                "search start {start} is after end {end}"
            )));
        }
        Daterange::new(start, end)
    }
}

/// Resolves `query` to segment keys.
///
/// # Errors
///
/// Returns `AerisError::Validation` if the window is inverted; store errors
/// propagate.
pub fn search(bucket: &Bucket, catalog: &Catalog, query: &SearchQuery) -> Result<SearchResults> {
    let window = query.window()?;
    let terms = normalized(&query.terms);
    let locations = normalized(&query.locations);

    let mut datasources = Vec::new();
    for id in catalog.ids_for_type(query.data_type) {
        match Datasource::load(bucket, &id, true) {
            Ok(datasource) => datasources.push(datasource),
            Err(AerisError::NotFound { .. }) => {
                warn!("Catalog lists datasource {} but its descriptor is missing", id);
            }
            Err(err) => return Err(err),
        }
    }

    let groups: Vec<(String, Vec<&Datasource>)> = if locations.is_empty() {
        let mut by_site: BTreeMap<String, Vec<&Datasource>> = BTreeMap::new();
        for datasource in &datasources {
            by_site
                .entry(datasource.site().to_string())
                .or_default()
                .push(datasource);
        }
        by_site.into_iter().collect()
    } else {
        locations
            .iter()
            .map(|location| {
                let members = datasources
                    .iter()
                    .filter(|d| d.search_metadata(location))
                    .collect();
                (location.clone(), members)
            })
            .collect()
    };

    let mut results = SearchResults::new();
    for (location, members) in groups {
        for datasource in members {
            if terms.is_empty() {
                let species = datasource.species().unwrap_or(datasource.name());
                let key = composite_key(&location, species, datasource);
                add_keys(&mut results, key, datasource, &window);
            } else if query.require_all {
                if terms.iter().all(|t| datasource.search_metadata(t)) {
                    let mut sorted = terms.clone();
                    sorted.sort();
                    let key = composite_key(&location, &sorted.join("_"), datasource);
                    add_keys(&mut results, key, datasource, &window);
                }
            } else {
                for term in terms.iter().filter(|t| datasource.search_metadata(t)) {
                    let key = composite_key(&location, term, datasource);
                    add_keys(&mut results, key, datasource, &window);
                }
            }
        }
    }

    debug!(
        "Search over {} {} datasources matched {} groups",
        datasources.len(),
        query.data_type,
        results.len()
    );
    Ok(results)
}

/// Fetches and concatenates the segments of each result group.
pub fn get_data(bucket: &Bucket, results: &SearchResults) -> Result<BTreeMap<String, ObservationTable>> {
    let mut tables = BTreeMap::new();
    for (group, keys) in results {
        let segments = keys
            .iter()
            .map(|key| decode_table(&bucket.get(key)?))
            .collect::<Result<Vec<_>>>()?;
        tables.insert(group.clone(), ObservationTable::concat(&segments)?);
    }
    Ok(tables)
}

fn normalized(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();
    let mut seen = BTreeSet::new();
    out.retain(|v| seen.insert(v.clone()));
    out
}

fn composite_key(location: &str, middle: &str, datasource: &Datasource) -> String {
    let mut key = format!("{location}_{middle}");
    for part in [datasource.inlet(), datasource.metadata().get(keys::HEIGHT)]
        .into_iter()
        .flatten()
    {
        key.push('_');
        key.push_str(part);
    }
    key
}

fn add_keys(results: &mut SearchResults, key: String, datasource: &Datasource, window: &Daterange) {
    let Some(latest) = datasource.versions().latest() else {
        return;
    };
    let matching: Vec<String> = latest
        .keys
        .iter()
        .filter(|(range, _)| window.contains(range))
        .map(|(_, key)| key.clone())
        .collect();
    if matching.is_empty() {
        return;
    }
    let entry = results.entry(key).or_default();
    entry.extend(matching);
    entry.sort();
    entry.dedup();
}
