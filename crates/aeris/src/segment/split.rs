//! Calendar-aligned splitting of tables under a size budget.

use crate::daterange::{instant_from_secs, Daterange};
use crate::error::{AerisError, Result};
use crate::segment::{Segment, SegmentPolicy};
use crate::table::{ObservationTable, Timestamp};
use chrono::{Datelike, Days, NaiveDate, TimeDelta, Timelike};
use tracing::debug;

const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Partition width, coarsest first.
///
/// # Examples
/// ```rust,ignore
/// use alopex_aeris::segment::Granularity;
///
/// assert_eq!(Granularity::Monthly.periods_per_year(), 12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    /// Calendar years starting Jan 1.
    Yearly,
    /// Calendar months starting on the 1st.
    Monthly,
    /// ISO weeks starting on Monday.
    Weekly,
    /// Days starting at midnight UTC.
    Daily,
    /// Hours starting on the hour.
    Hourly,
}

impl Granularity {
    /// All granularities, coarsest first.
    pub const ALL: [Granularity; 5] = [
        Self::Yearly,
        Self::Monthly,
        Self::Weekly,
        Self::Daily,
        Self::Hourly,
    ];

    /// Number of partitions in one year.
    pub fn periods_per_year(self) -> u64 {
        match self {
            Self::Yearly => 1,
            Self::Monthly => 12,
            Self::Weekly => 52,
            Self::Daily => 365,
            Self::Hourly => 8760,
        }
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Weekly => "weekly",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
        }
    }

    /// Start of the partition holding `timestamp`, in epoch seconds.
    pub fn partition_start(self, timestamp: Timestamp) -> Result<Timestamp> {
        let instant = instant_from_secs(timestamp)?;
        let date = instant.date_naive();
        let start = match self {
            Self::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Self::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Self::Weekly => {
                date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            }
            Self::Daily | Self::Hourly => Some(date),
        };
        let hour = if self == Self::Hourly { instant.hour() } else { 0 };
        start
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| {
                AerisError::validation(format!(
                    "no {} partition for timestamp {timestamp}",
                    self.as_str()
                ))
            })
    }
}

/// Picks the coarsest granularity whose per-partition estimate fits `budget`.
///
/// Spans shorter than a year count as one year. Falls back to
/// [`Granularity::Hourly`] when nothing fits.
pub fn choose_granularity(total_size: u64, span: TimeDelta, budget: u64) -> Granularity {
    let years = (span.num_seconds() as f64 / SECONDS_PER_YEAR).max(1.0);
    Granularity::ALL
        .into_iter()
        .find(|g| total_size as f64 / (years * g.periods_per_year() as f64) <= budget as f64)
        .unwrap_or(Granularity::Hourly)
}

/// Splits `table` into non-empty calendar-aligned segments.
///
/// Each segment's daterange runs from its first to its last row.
pub fn split(table: &ObservationTable, policy: &SegmentPolicy) -> Result<Vec<Segment>> {
    let Some((first, last)) = table.time_bounds() else {
        return Ok(Vec::new());
    };
    let granularity = choose_granularity(
        table.estimated_size(),
        TimeDelta::seconds(last - first),
        policy.max_segment_size,
    );
    let segments = split_at(table, granularity)?;
    debug!(
        "Split {} rows into {} {} segments",
        table.len(),
        segments.len(),
        granularity.as_str()
    );
    Ok(segments)
}

/// Splits `table` on `granularity` boundaries.
pub fn split_at(table: &ObservationTable, granularity: Granularity) -> Result<Vec<Segment>> {
    let timestamps = table.timestamps();
    let mut segments = Vec::new();
    let mut run_start = 0;
    let mut run_partition = None;

    for (row, &ts) in timestamps.iter().enumerate() {
        let partition = granularity.partition_start(ts)?;
        match run_partition {
            Some(current) if current == partition => {}
            Some(_) => {
                segments.push(segment_of(table, run_start..row)?);
                run_start = row;
                run_partition = Some(partition);
            }
            None => run_partition = Some(partition),
        }
    }
    if run_partition.is_some() {
        segments.push(segment_of(table, run_start..timestamps.len())?);
    }
    Ok(segments)
}

/// Wraps a whole table as a single segment.
pub fn whole(table: &ObservationTable) -> Result<Vec<Segment>> {
    match table.time_bounds() {
        Some(_) => Ok(vec![segment_of(table, 0..table.len())?]),
        None => Ok(Vec::new()),
    }
}

fn segment_of(table: &ObservationTable, rows: std::ops::Range<usize>) -> Result<Segment> {
    let timestamps = table.timestamps();
    let daterange = Daterange::from_timestamps(timestamps[rows.start], timestamps[rows.end - 1])?;
    Ok(Segment {
        daterange,
        table: table.slice(rows),
    })
}
