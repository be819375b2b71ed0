//! Ranking overrides: which datasource is primary for a site and species
//! over which dates.

use super::Catalog;
use crate::daterange::Daterange;
use crate::datasource::Datasource;
use crate::error::{AerisError, Result};
use crate::store::Bucket;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A candidate datasource for one site and species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    /// Datasource id.
    pub uuid: Uuid,
    /// Best (lowest) tier assigned, if ranked.
    pub rank: Option<u32>,
    /// Overall coverage of the datasource.
    pub daterange: Option<Daterange>,
}

/// Checks that `site` is a three-letter alphabetic code and lowercases it.
///
/// # Errors
///
/// Returns `AerisError::Validation` otherwise.
pub fn validate_site(site: &str) -> Result<String> {
    let site = site.trim();
    if site.len() != 3 || !site.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AerisError::validation(format!(
            "{site} is not a valid site code"
        )));
    }
    Ok(site.to_ascii_lowercase())
}

impl Catalog {
    /// Records `daterange` under `tier` for datasource `id`.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::NotFound` for an unregistered id and
    /// `AerisError::Validation` for tier 0.
    pub fn set_rank(&mut self, id: &Uuid, tier: u32, daterange: Daterange) -> Result<()> {
        if !self.contains(id) {
            return Err(AerisError::NotFound {
                kind: "datasource",
                id: id.to_string(),
            });
        }
        if tier == 0 {
            return Err(AerisError::validation("rank tiers start at 1"));
        }
        let ranges = self
            .data
            .rank_data
            .entry(*id)
            .or_default()
            .entry(tier)
            .or_default();
        if !ranges.contains(&daterange) {
            ranges.push(daterange);
            ranges.sort();
        }
        Ok(())
    }

    /// Ranked tiers of datasource `id`.
    pub fn rank_data(&self, id: &Uuid) -> Option<&BTreeMap<u32, Vec<Daterange>>> {
        self.data.rank_data.get(id)
    }

    /// Lists every registered datasource measuring `species` at `site`.
    ///
    /// Keys are `{site}_{species}_{inlet}`, without the inlet part when the
    /// datasource has none.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Validation` for a malformed site code.
    pub fn get_sources(
        &self,
        bucket: &Bucket,
        site: &str,
        species: &str,
    ) -> Result<BTreeMap<String, SourceInfo>> {
        let site = validate_site(site)?;
        let species = species.trim().to_lowercase();
        let mut sources = BTreeMap::new();

        for id in self.datasource_ids() {
            let datasource = Datasource::load(bucket, id, true)?;
            if datasource.site() != site || datasource.species() != Some(species.as_str()) {
                continue;
            }
            let mut key = format!("{site}_{species}");
            if let Some(inlet) = datasource.inlet() {
                key.push('_');
                key.push_str(inlet);
            }
            if sources.contains_key(&key) {
                key = datasource.name().to_string();
            }
            let rank = self
                .rank_data(id)
                .and_then(|tiers| tiers.keys().next().copied());
            sources.insert(
                key,
                SourceInfo {
                    uuid: *id,
                    rank,
                    daterange: datasource.daterange(),
                },
            );
        }
        Ok(sources)
    }

    /// Picks the datasource whose best tier covering `at` is lowest.
    pub fn primary_source(
        &self,
        bucket: &Bucket,
        site: &str,
        species: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let sources = self.get_sources(bucket, site, species)?;
        let best = sources
            .values()
            .filter_map(|info| {
                let tiers = self.rank_data(&info.uuid)?;
                let tier = tiers
                    .iter()
                    .find(|(_, ranges)| ranges.iter().any(|r| r.contains_instant(at)))?
                    .0;
                Some((*tier, info.uuid))
            })
            .min();
        Ok(best.map(|(_, id)| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::metadata::Metadata;
    use crate::table::ObservationTable;
    use chrono::TimeZone;

    fn range(from: u32, to: u32) -> Daterange {
        Daterange::new(
            Utc.with_ymd_and_hms(2019, from, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2019, to, 28, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn stored(bucket: &Bucket, catalog: &mut Catalog, name: &str, inlet: &str) -> Uuid {
        let mut ds = Datasource::create(name).unwrap();
        let metadata = Metadata::normalize([("site", "bsd"), ("species", "co2"), ("inlet", inlet)]);
        let table = ObservationTable::from_rows(&["co2"], &[(1_546_300_800, vec![410.0])]).unwrap();
        ds.add_data(&metadata, table, false).unwrap();
        ds.save(bucket).unwrap();
        catalog.register(name, ds.id(), DataType::Crds);
        ds.id()
    }

    #[test]
    fn test_validate_site() {
        assert_eq!(validate_site("BSD").unwrap(), "bsd");
        assert!(validate_site("bs").is_err());
        assert!(validate_site("b5d").is_err());
        assert!(validate_site("bsdx").is_err());
    }

    #[test]
    fn test_set_rank_validation() {
        let mut catalog = Catalog::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            catalog.set_rank(&id, 1, range(1, 2)),
            Err(AerisError::NotFound { .. })
        ));
        catalog.register("bsd_co2", id, DataType::Crds);
        assert!(matches!(
            catalog.set_rank(&id, 0, range(1, 2)),
            Err(AerisError::Validation(_))
        ));
        catalog.set_rank(&id, 1, range(3, 4)).unwrap();
        catalog.set_rank(&id, 1, range(1, 2)).unwrap();
        catalog.set_rank(&id, 1, range(1, 2)).unwrap();
        assert_eq!(catalog.rank_data(&id).unwrap()[&1], vec![range(1, 2), range(3, 4)]);
    }

    #[test]
    fn test_get_sources_and_primary() {
        let bucket = Bucket::in_memory("obs");
        let mut catalog = Catalog::new();
        let low = stored(&bucket, &mut catalog, "bsd_co2_42m", "42m");
        let high = stored(&bucket, &mut catalog, "bsd_co2_248m", "248m");

        let sources = catalog.get_sources(&bucket, "BSD", "CO2").unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["bsd_co2_42m"].uuid, low);
        assert_eq!(sources["bsd_co2_248m"].rank, None);
        assert!(catalog.get_sources(&bucket, "tac", "co2").unwrap().is_empty());
        assert!(matches!(
            catalog.get_sources(&bucket, "bsdx", "co2"),
            Err(AerisError::Validation(_))
        ));

        catalog.set_rank(&high, 1, range(1, 6)).unwrap();
        catalog.set_rank(&low, 2, range(1, 12)).unwrap();
        let march = Utc.with_ymd_and_hms(2019, 3, 10, 0, 0, 0).unwrap();
        let october = Utc.with_ymd_and_hms(2019, 10, 10, 0, 0, 0).unwrap();
        assert_eq!(catalog.primary_source(&bucket, "bsd", "co2", march).unwrap(), Some(high));
        assert_eq!(catalog.primary_source(&bucket, "bsd", "co2", october).unwrap(), Some(low));
        let next_year = Utc.with_ymd_and_hms(2020, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(catalog.primary_source(&bucket, "bsd", "co2", next_year).unwrap(), None);
    }
}
