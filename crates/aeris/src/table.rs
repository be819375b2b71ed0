//! Time-indexed numeric tables with string attributes.

use crate::daterange::Daterange;
use crate::error::{AerisError, Result};
use std::collections::BTreeMap;
use std::ops::Range;

/// Seconds since the Unix epoch (UTC).
pub type Timestamp = i64;

/// A table of named `f64` columns sharing one sorted time index.
///
/// Missing readings are stored as NaN. Attributes carry free-form string
/// metadata alongside the data and travel with it into segment payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationTable {
    timestamps: Vec<Timestamp>,
    columns: BTreeMap<String, Vec<f64>>,
    attributes: BTreeMap<String, String>,
}

impl ObservationTable {
    /// Builds a table, sorting rows by timestamp if needed.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Validation` if a column length differs from the
    /// number of timestamps or a column name is empty.
    pub fn new(timestamps: Vec<Timestamp>, columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        for (name, values) in &columns {
            if name.is_empty() {
                return Err(AerisError::validation("column name must not be empty"));
            }
            if values.len() != timestamps.len() {
                return Err(AerisError::validation(format!(
                    "column {name} has {} values for {} timestamps",
                    values.len(),
                    timestamps.len()
                )));
            }
        }

        let mut table = Self {
            timestamps,
            columns,
            attributes: BTreeMap::new(),
        };
        table.sort_by_time();
        Ok(table)
    }

    /// Builds a table from row tuples. Each row must have one value per column.
    pub fn from_rows(names: &[&str], rows: &[(Timestamp, Vec<f64>)]) -> Result<Self> {
        let mut columns: BTreeMap<String, Vec<f64>> = names
            .iter()
            .map(|n| (n.to_string(), Vec::with_capacity(rows.len())))
            .collect();
        let mut timestamps = Vec::with_capacity(rows.len());
        for (ts, values) in rows {
            if values.len() != names.len() {
                return Err(AerisError::validation(format!(
                    "row at {ts} has {} values for {} columns",
                    values.len(),
                    names.len()
                )));
            }
            timestamps.push(*ts);
            for (name, value) in names.iter().zip(values) {
                if let Some(column) = columns.get_mut(*name) {
                    column.push(*value);
                }
            }
        }
        Self::new(timestamps, columns)
    }

    /// Replaces the attribute map.
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Sets a single attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Attribute map.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Sorted time index.
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// Values of one column.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Iterates `(name, values)` in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// First and last timestamp.
    pub fn time_bounds(&self) -> Option<(Timestamp, Timestamp)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Daterange spanning the first and last row, or `None` for an empty table.
    pub fn daterange(&self) -> Result<Option<Daterange>> {
        self.time_bounds()
            .map(|(start, end)| Daterange::from_timestamps(start, end))
            .transpose()
    }

    /// Copies a contiguous row range into a new table, keeping attributes.
    pub fn slice(&self, rows: Range<usize>) -> Self {
        let rows = rows.start.min(self.len())..rows.end.min(self.len());
        Self {
            timestamps: self.timestamps[rows.clone()].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), values[rows.clone()].to_vec()))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }

    /// In-memory footprint estimate used for segment sizing.
    pub fn estimated_size(&self) -> u64 {
        let index = self.timestamps.len() as u64 * 8;
        let values = self.columns.len() as u64 * self.timestamps.len() as u64 * 8;
        let attrs: u64 = self
            .attributes
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        index + values + attrs
    }

    /// Concatenates tables row-wise. Columns missing from a table are
    /// filled with NaN; attributes of later tables win.
    pub fn concat(tables: &[ObservationTable]) -> Result<Self> {
        let names: std::collections::BTreeSet<&str> = tables
            .iter()
            .flat_map(|t| t.columns.keys().map(String::as_str))
            .collect();
        let rows: usize = tables.iter().map(ObservationTable::len).sum();

        let mut timestamps = Vec::with_capacity(rows);
        let mut columns: BTreeMap<String, Vec<f64>> = names
            .iter()
            .map(|n| (n.to_string(), Vec::with_capacity(rows)))
            .collect();
        let mut attributes = BTreeMap::new();

        for table in tables {
            timestamps.extend_from_slice(&table.timestamps);
            for (name, column) in columns.iter_mut() {
                match table.columns.get(name) {
                    Some(values) => column.extend_from_slice(values),
                    None => column.extend(std::iter::repeat(f64::NAN).take(table.len())),
                }
            }
            attributes.extend(table.attributes.clone());
        }

        Ok(Self::new(timestamps, columns)?.with_attributes(attributes))
    }

    fn sort_by_time(&mut self) {
        if self.timestamps.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.timestamps.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);
        let timestamps: Vec<Timestamp> = order.iter().map(|&i| self.timestamps[i]).collect();
        self.timestamps = timestamps;
        for values in self.columns.values_mut() {
            let sorted: Vec<f64> = order.iter().map(|&i| values[i]).collect();
            *values = sorted;
        }
    }
}
