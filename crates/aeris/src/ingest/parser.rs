//! Observation file parsers.
//!
//! Instrument formats vary; the ingest pipeline only needs each file turned
//! into one table and metadata map per species. [`ObservationParser`] is
//! that seam, and [`ParserRegistry`] picks a parser by data type.

use crate::catalog::DataType;
use crate::daterange::parse_instant;
use crate::error::{AerisError, Result};
use crate::metadata::{keys, Metadata};
use crate::table::{ObservationTable, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Caller-supplied values that override what a parser infers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContext {
    /// Data type the file is ingested as.
    pub data_type: DataType,
    /// Site code.
    pub site: Option<String>,
    /// Network name.
    pub network: Option<String>,
    /// Instrument name.
    pub instrument: Option<String>,
}

impl ParseContext {
    /// Creates a context with no overrides.
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            site: None,
            network: None,
            instrument: None,
        }
    }
}

/// The data for one species extracted from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSpecies {
    /// Species name, lowercase.
    pub species: String,
    /// Metadata to merge into the datasource.
    pub metadata: Metadata,
    /// The readings.
    pub table: ObservationTable,
}

/// Turns raw file content into per-species tables.
pub trait ObservationParser: Send + Sync {
    /// Parses `content`, read from `path`.
    fn parse(&self, path: &Path, content: &[u8], context: &ParseContext)
        -> Result<Vec<ParsedSpecies>>;
}

/// Parsers by data type.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<DataType, Arc<dyn ObservationParser>>,
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.parsers.keys().collect();
        types.sort();
        f.debug_struct("ParserRegistry")
            .field("types", &types)
            .finish()
    }
}

impl Default for ParserRegistry {
    /// Registers [`DelimitedParser`] for every data type.
    fn default() -> Self {
        let delimited: Arc<dyn ObservationParser> = Arc::new(DelimitedParser);
        Self {
            parsers: DataType::ALL
                .into_iter()
                .map(|t| (t, Arc::clone(&delimited)))
                .collect(),
        }
    }
}

impl ParserRegistry {
    /// Creates a registry with no parsers.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Registers `parser` for `data_type`, replacing any previous one.
    pub fn register(&mut self, data_type: DataType, parser: Arc<dyn ObservationParser>) {
        self.parsers.insert(data_type, parser);
    }

    /// Parser for `data_type`.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::NotImplemented` if none is registered.
    pub fn get(&self, data_type: DataType) -> Result<Arc<dyn ObservationParser>> {
        self.parsers
            .get(&data_type)
            .cloned()
            .ok_or_else(|| AerisError::NotImplemented(format!("no parser for {data_type}")))
    }
}

/// Generic parser for comma- or whitespace-delimited text.
///
/// ```text
/// # comment lines start with '#'
/// time,co2,co2_stdev,co2_n_meas,ch4,ch4_stdev
/// 2019-01-01T00:00:00,410.2,0.1,19,1950.3,nan
/// ```
///
/// - The first header column is the time column. A leading `date time`
///   column pair is joined into one timestamp. Times are epoch seconds or
///   anything [`parse_instant`] accepts.
/// - Columns are grouped into species by the text before the first `_`.
/// - Empty cells and `nan` are missing readings.
/// - File names shaped `{site}.{instrument}.{resolution}.{inlet}.{ext}`
///   contribute metadata; context values win over them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedParser;

impl ObservationParser for DelimitedParser {
    fn parse(
        &self,
        path: &Path,
        content: &[u8],
        context: &ParseContext,
    ) -> Result<Vec<ParsedSpecies>> {
        let file = path.display().to_string();
        let text = std::str::from_utf8(content)
            .map_err(|err| AerisError::format(&file, format!("not UTF-8: {err}")))?;

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

        let Some((_, header_line)) = lines.next() else {
            return Err(AerisError::format(&file, "no header row"));
        };
        let comma = header_line.contains(',');
        let header: Vec<String> = split_fields(header_line, comma)
            .map(|h| h.to_lowercase())
            .collect();
        let time_width = if header.len() > 1 && header[0] == "date" && header[1] == "time" {
            2
        } else {
            1
        };
        let names = &header[time_width.min(header.len())..];
        if names.is_empty() {
            return Err(AerisError::format(&file, "no value columns"));
        }
        if names.iter().any(String::is_empty) {
            return Err(AerisError::format(&file, "empty column name"));
        }

        let mut timestamps: Vec<Timestamp> = Vec::new();
        let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (line_no, line) in lines {
            let fields: Vec<&str> = split_fields(line, comma).collect();
            if fields.len() != header.len() {
                return Err(AerisError::validation(format!(
                    "{file}:{line_no}: expected {} fields, found {}",
                    header.len(),
                    fields.len()
                )));
            }
            let time = fields[..time_width].join(" ");
            timestamps.push(parse_time(&time).map_err(|err| {
                AerisError::validation(format!("{file}:{line_no}: {err}"))
            })?);
            for (column, raw) in values.iter_mut().zip(&fields[time_width..]) {
                column.push(parse_value(raw).ok_or_else(|| {
                    AerisError::validation(format!("{file}:{line_no}: bad value '{raw}'"))
                })?);
            }
        }

        let base = file_metadata(path, context);
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
        for (name, column) in names.iter().zip(values) {
            let species = name.split('_').next().unwrap_or(name).to_string();
            grouped
                .entry(species)
                .or_default()
                .insert(name.clone(), column);
        }

        grouped
            .into_iter()
            .map(|(species, columns)| {
                let mut metadata = base.clone();
                metadata.insert(keys::SPECIES, &species);
                let table = ObservationTable::new(timestamps.clone(), columns)?
                    .with_attributes(metadata.as_map().clone());
                Ok(ParsedSpecies {
                    species,
                    metadata,
                    table,
                })
            })
            .collect()
    }
}

fn split_fields(line: &str, comma: bool) -> Box<dyn Iterator<Item = &str> + '_> {
    if comma {
        Box::new(line.split(',').map(str::trim))
    } else {
        Box::new(line.split_whitespace())
    }
}

fn parse_time(raw: &str) -> Result<Timestamp> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Ok(secs);
    }
    Ok(parse_instant(raw)?.timestamp())
}

fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

/// Maps the resolution token of a file name to a metadata value.
pub fn resolution_label(token: &str) -> &'static str {
    match token.to_ascii_lowercase().as_str() {
        "1minute" => "1_minute",
        "hourly" => "1_hour",
        _ => "not_read",
    }
}

fn file_metadata(path: &Path, context: &ParseContext) -> Metadata {
    let mut metadata = Metadata::new();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() >= 5 {
        metadata.insert(keys::SITE, parts[0]);
        metadata.insert(keys::INSTRUMENT, parts[1]);
        metadata.insert(keys::TIME_RESOLUTION, resolution_label(parts[2]));
        metadata.insert(keys::INLET, parts[3]);
    }

    let overrides = [
        (keys::SITE, &context.site),
        (keys::NETWORK, &context.network),
        (keys::INSTRUMENT, &context.instrument),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            metadata.insert(key, value);
        }
    }
    if context.data_type == DataType::Footprint {
        metadata.insert(keys::DATA_TYPE, "footprint");
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
# Picarro export
time,co2,co2_stdev,co2_n_meas,ch4,ch4_stdev
2019-01-01T00:01:00,410.5,0.2,19,1950.1,0.5
2019-01-01T00:00:00,410.1,0.1,20,1949.8,nan
";

    fn parse(name: &str, content: &str, context: &ParseContext) -> Result<Vec<ParsedSpecies>> {
        DelimitedParser.parse(Path::new(name), content.as_bytes(), context)
    }

    #[test]
    fn test_groups_columns_by_species() {
        let parsed = parse("bsd.picarro.1minute.248m.dat", CSV, &ParseContext::new(DataType::Crds)).unwrap();
        assert_eq!(parsed.len(), 2);
        let ch4 = &parsed[0];
        let co2 = &parsed[1];
        assert_eq!(ch4.species, "ch4");
        assert_eq!(co2.table.column_count(), 3);
        assert_eq!(co2.table.timestamps(), &[1_546_300_800, 1_546_300_860]);
        assert_eq!(co2.table.column("co2").unwrap(), &[410.1, 410.5]);
        assert!(ch4.table.column("ch4_stdev").unwrap()[0].is_nan());
    }

    #[test]
    fn test_metadata_from_filename_and_context() {
        let mut context = ParseContext::new(DataType::Crds);
        context.network = Some("DECC".to_string());
        context.site = Some("TAC".to_string());
        let parsed = parse("bsd.picarro.1minute.248m.dat", CSV, &context).unwrap();
        let md = &parsed[1].metadata;
        assert_eq!(md.get("site"), Some("tac"));
        assert_eq!(md.get("instrument"), Some("picarro"));
        assert_eq!(md.get("time_resolution"), Some("1_minute"));
        assert_eq!(md.get("inlet"), Some("248m"));
        assert_eq!(md.get("network"), Some("decc"));
        assert_eq!(md.get("species"), Some("co2"));
        assert_eq!(parsed[1].table.attributes().get("inlet").map(String::as_str), Some("248m"));
    }

    #[test]
    fn test_resolution_labels() {
        assert_eq!(resolution_label("1minute"), "1_minute");
        assert_eq!(resolution_label("hourly"), "1_hour");
        assert_eq!(resolution_label("30sec"), "not_read");
    }

    #[test]
    fn test_whitespace_with_date_time_pair() {
        let content = "date time co co_stdev\n2019-01-01 00:00:00 120.5 1.0\n2019-01-01 01:00:00 NaN 1.1\n";
        let parsed = parse("x.dat", content, &ParseContext::new(DataType::Gc)).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].table.timestamps()[1] - parsed[0].table.timestamps()[0], 3600);
        assert!(parsed[0].table.column("co").unwrap()[1].is_nan());
        assert!(parsed[0].metadata.get("site").is_none());
    }

    #[test]
    fn test_epoch_seconds_and_footprint_tag() {
        let content = "time,fp\n100,1.5\n200,\n";
        let parsed = parse("fp.csv", content, &ParseContext::new(DataType::Footprint)).unwrap();
        assert_eq!(parsed[0].table.timestamps(), &[100, 200]);
        assert!(parsed[0].table.column("fp").unwrap()[1].is_nan());
        assert_eq!(parsed[0].metadata.get("data_type"), Some("footprint"));
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let context = ParseContext::new(DataType::Crds);
        assert!(matches!(
            parse("a.dat", "time,co2\n2019-01-01,1,2\n", &context),
            Err(AerisError::Validation(_))
        ));
        assert!(matches!(
            parse("a.dat", "time,co2\nyesterday,1\n", &context),
            Err(AerisError::Validation(_))
        ));
        assert!(matches!(
            parse("a.dat", "time,co2\n2019-01-01,abc\n", &context),
            Err(AerisError::Validation(_))
        ));
        assert!(matches!(
            parse("a.dat", "# only comments\n", &context),
            Err(AerisError::Format { .. })
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ParserRegistry::default();
        assert!(registry.get(DataType::Gc).is_ok());
        assert!(matches!(
            ParserRegistry::empty().get(DataType::Crds),
            Err(AerisError::NotImplemented(_))
        ));
    }
}
