//! Segments: date-bounded chunks of one stream and their payload format.
//!
//! - [`split`]: picks a calendar granularity under a size budget and splits
//!   a table on its boundaries
//! - [`codec`]: the checksummed binary payload of one segment
//! - [`gorilla`]: timestamp and value compression used by the codec

pub mod codec;
pub mod gorilla;
pub mod split;

pub use codec::{decode_table, encode_table, CompressionType, SegmentReader, SegmentWriter};
pub use split::{choose_granularity, Granularity};

use crate::daterange::Daterange;
use crate::table::ObservationTable;

/// Default size budget per segment (5 MiB).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 5 * 1024 * 1024;

/// A table tagged with the range of its first and last row.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Range covered by the rows.
    pub daterange: Daterange,
    /// The rows.
    pub table: ObservationTable,
}

/// Segmentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPolicy {
    /// Estimated in-memory bytes allowed per segment.
    pub max_segment_size: u64,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
        }
    }
}

impl SegmentPolicy {
    /// Sets the per-segment size budget.
    pub fn with_max_segment_size(mut self, bytes: u64) -> Self {
        self.max_segment_size = bytes;
        self
    }
}
