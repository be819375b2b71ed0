//! Segment payload format.
//!
//! One segment is one [`ObservationTable`] serialized as a self-describing,
//! checksummed byte string. Payloads are written to a temporary file and
//! uploaded whole, and read back from the bytes the object store returns.
//!
//! ## Payload Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Header (32 bytes)                                           │
//! │  - Magic: "ASEG" (4 bytes)                                   │
//! │  - Version: u16 (2 bytes) = 1                                │
//! │  - Min Timestamp: i64 (8 bytes)                              │
//! │  - Max Timestamp: i64 (8 bytes)                              │
//! │  - Row Count: u32 (4 bytes)                                  │
//! │  - Column Count: u16 (2 bytes)                               │
//! │  - Compression: u8 (1 byte)                                  │
//! │  - Reserved: 3 bytes                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Attribute block                                             │
//! │  Time block (delta-of-delta or raw)                          │
//! │  Value block per column (Gorilla XOR or raw)                 │
//! │  - each block carries its own CRC32                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Footer (24 bytes)                                           │
//! │  - Body offset and size, payload CRC, reverse magic          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{AerisError, Result};
use crate::segment::gorilla::{self, Bits};
use crate::table::{ObservationTable, Timestamp};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

/// Magic bytes for the segment header: "ASEG"
pub const SEGMENT_MAGIC: [u8; 4] = *b"ASEG";

/// Reverse magic bytes for the segment footer: "GESA"
pub const SEGMENT_MAGIC_REVERSE: [u8; 4] = *b"GESA";

/// Current segment format version.
pub const SEGMENT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// Footer size in bytes.
pub const FOOTER_SIZE: usize = 24;

/// Compression policy for a whole payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression (raw data).
    Raw = 0,
    /// Gorilla compression, with per-block raw fallback.
    #[default]
    Gorilla = 1,
}

impl CompressionType {
    /// Creates a CompressionType from a u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Raw),
            1 => Some(Self::Gorilla),
            _ => None,
        }
    }
}

/// Timestamp encoding of a time block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimestampEncoding {
    /// Raw encoding (8 bytes × N).
    Raw = 0,
    /// Delta-of-Delta encoding (Gorilla timestamps).
    DeltaOfDelta = 1,
}

/// Value encoding of a column block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueEncoding {
    /// Raw encoding (8 bytes × N).
    Raw = 0,
    /// Gorilla XOR compression.
    GorillaXor = 1,
}

/// Kind of a payload block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockKind {
    /// String attributes.
    Attributes = 0,
    /// The shared time index.
    Time = 1,
    /// One value column.
    Values = 2,
}

impl BlockKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Attributes),
            1 => Some(Self::Time),
            2 => Some(Self::Values),
            _ => None,
        }
    }
}

/// Segment header (32 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic bytes: "ASEG"
    pub magic: [u8; 4],
    /// Format version.
    pub version: u16,
    /// Minimum timestamp in the segment.
    pub min_timestamp: Timestamp,
    /// Maximum timestamp in the segment.
    pub max_timestamp: Timestamp,
    /// Number of rows.
    pub row_count: u32,
    /// Number of value columns.
    pub column_count: u16,
    /// Compression policy used when writing.
    pub compression: CompressionType,
}

impl SegmentHeader {
    /// Writes the header using little-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.min_timestamp.to_le_bytes())?;
        writer.write_all(&self.max_timestamp.to_le_bytes())?;
        writer.write_all(&self.row_count.to_le_bytes())?;
        writer.write_all(&self.column_count.to_le_bytes())?;
        writer.write_all(&[self.compression as u8])?;
        writer.write_all(&[0u8; 3])?;
        Ok(())
    }

    /// Reads a header.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::InvalidMagic` if the magic bytes don't match and
    /// `AerisError::UnsupportedVersion` for a newer format version.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let magic = array::<4>(&buf, 0);
        if magic != SEGMENT_MAGIC {
            return Err(AerisError::InvalidMagic(magic));
        }

        let version = u16::from_le_bytes(array(&buf, 4));
        if version > SEGMENT_VERSION {
            return Err(AerisError::UnsupportedVersion(version));
        }

        let compression = CompressionType::from_u8(buf[28])
            .ok_or(AerisError::UnsupportedVersion(u16::from(buf[28])))?;

        Ok(Self {
            magic,
            version,
            min_timestamp: i64::from_le_bytes(array(&buf, 6)),
            max_timestamp: i64::from_le_bytes(array(&buf, 14)),
            row_count: u32::from_le_bytes(array(&buf, 22)),
            column_count: u16::from_le_bytes(array(&buf, 26)),
            compression,
        })
    }
}

/// Segment footer (24 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentFooter {
    /// Offset of the first block from payload start.
    pub body_offset: u64,
    /// Total size of all blocks.
    pub body_size: u64,
    /// CRC32 of header and body.
    pub payload_crc32: u32,
    /// Reverse magic bytes: "GESA"
    pub magic_reverse: [u8; 4],
}

impl SegmentFooter {
    /// Writes the footer using little-endian byte order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.body_offset.to_le_bytes())?;
        writer.write_all(&self.body_size.to_le_bytes())?;
        writer.write_all(&self.payload_crc32.to_le_bytes())?;
        writer.write_all(&self.magic_reverse)?;
        Ok(())
    }

    /// Reads a footer.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::InvalidMagic` if the reverse magic bytes don't match.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;

        let magic_reverse = array::<4>(&buf, 20);
        if magic_reverse != SEGMENT_MAGIC_REVERSE {
            return Err(AerisError::InvalidMagic(magic_reverse));
        }

        Ok(Self {
            body_offset: u64::from_le_bytes(array(&buf, 0)),
            body_size: u64::from_le_bytes(array(&buf, 8)),
            payload_crc32: u32::from_le_bytes(array(&buf, 16)),
            magic_reverse,
        })
    }
}

/// One checksummed block of a payload.
///
/// ## Binary Layout
///
/// ```text
/// Size    Field
/// ----    -----
/// 1       kind (u8)
/// 1       encoding (u8)
/// 2       name_len (u16 LE)
/// N       name (UTF-8)
/// 4       count (u32 LE)
/// 4       data_len (u32 LE)
/// M       data
/// 4       block_crc32 (u32 LE)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// What the block holds.
    pub kind: BlockKind,
    /// Encoding tag, interpreted per kind.
    pub encoding: u8,
    /// Column name; empty for attribute and time blocks.
    pub name: String,
    /// Number of entries (rows or attributes).
    pub count: u32,
    /// Encoded data.
    pub data: Vec<u8>,
    /// CRC32 of every preceding field.
    pub block_crc32: u32,
}

impl DataBlock {
    fn new(kind: BlockKind, encoding: u8, name: &str, count: u32, data: Vec<u8>) -> Self {
        let mut block = Self {
            kind,
            encoding,
            name: name.to_string(),
            count,
            data,
            block_crc32: 0,
        };
        block.block_crc32 = block.calculate_crc();
        block
    }

    fn calculate_crc(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[self.kind as u8, self.encoding]);
        hasher.update(&(self.name.len() as u16).to_le_bytes());
        hasher.update(self.name.as_bytes());
        hasher.update(&self.count.to_le_bytes());
        hasher.update(&(self.data.len() as u32).to_le_bytes());
        hasher.update(&self.data);
        hasher.finalize()
    }

    /// Verifies the block's CRC32 checksum.
    pub fn verify_crc(&self) -> bool {
        self.block_crc32 == self.calculate_crc()
    }

    /// Writes the block.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.kind as u8, self.encoding])?;
        writer.write_all(&(self.name.len() as u16).to_le_bytes())?;
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(&self.count.to_le_bytes())?;
        writer.write_all(&(self.data.len() as u32).to_le_bytes())?;
        writer.write_all(&self.data)?;
        writer.write_all(&self.block_crc32.to_le_bytes())?;
        Ok(())
    }

    /// Reads a block and verifies its CRC.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::ChecksumMismatch` if CRC verification fails.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf2 = [0u8; 2];
        reader.read_exact(&mut buf2)?;
        let kind = BlockKind::from_u8(buf2[0])
            .ok_or(AerisError::UnsupportedVersion(u16::from(buf2[0])))?;
        let encoding = buf2[1];

        reader.read_exact(&mut buf2)?;
        let name_len = u16::from_le_bytes(buf2) as usize;
        let mut name_bytes = vec![0u8; name_len];
        reader.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes).map_err(|e| {
            AerisError::DecompressionError(format!("Invalid UTF-8 in column name: {e}"))
        })?;

        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let count = u32::from_le_bytes(buf4);
        reader.read_exact(&mut buf4)?;
        let data_len = u32::from_le_bytes(buf4) as usize;
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data)?;
        reader.read_exact(&mut buf4)?;
        let block_crc32 = u32::from_le_bytes(buf4);

        let block = Self {
            kind,
            encoding,
            name,
            count,
            data,
            block_crc32,
        };

        let calculated = block.calculate_crc();
        if calculated != block_crc32 {
            return Err(AerisError::ChecksumMismatch {
                expected: block_crc32,
                actual: calculated,
            });
        }
        Ok(block)
    }
}

/// Serializes tables into segment payloads.
#[derive(Debug, Clone, Default)]
pub struct SegmentWriter {
    compression: CompressionType,
}

impl SegmentWriter {
    /// Creates a writer using Gorilla compression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression policy.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Encodes `table` into a byte vector.
    pub fn encode(&self, table: &ObservationTable) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(table, &mut out)?;
        Ok(out)
    }

    /// Writes the payload for `table` and returns its header.
    ///
    /// # Errors
    ///
    /// Returns `AerisError::Validation` if the table exceeds the format's
    /// row, column or name limits.
    pub fn write_to<W: Write>(&self, table: &ObservationTable, writer: &mut W) -> Result<SegmentHeader> {
        let row_count = u32::try_from(table.len())
            .map_err(|_| AerisError::validation("segment exceeds u32::MAX rows"))?;
        let column_count = u16::try_from(table.column_count())
            .map_err(|_| AerisError::validation("segment exceeds u16::MAX columns"))?;
        let (min_timestamp, max_timestamp) = table.time_bounds().unwrap_or((i64::MAX, i64::MIN));

        let header = SegmentHeader {
            magic: SEGMENT_MAGIC,
            version: SEGMENT_VERSION,
            min_timestamp,
            max_timestamp,
            row_count,
            column_count,
            compression: self.compression,
        };

        let mut payload = Vec::with_capacity(HEADER_SIZE + table.estimated_size() as usize);
        header.write_to(&mut payload)?;

        encode_attributes(table.attributes())?.write_to(&mut payload)?;
        self.encode_time(table.timestamps(), row_count).write_to(&mut payload)?;
        for (name, values) in table.columns() {
            if name.len() > u16::MAX as usize {
                return Err(AerisError::validation(format!(
                    "column name too long: {} bytes",
                    name.len()
                )));
            }
            self.encode_column(name, values, row_count).write_to(&mut payload)?;
        }

        let footer = SegmentFooter {
            body_offset: HEADER_SIZE as u64,
            body_size: (payload.len() - HEADER_SIZE) as u64,
            payload_crc32: crc32fast::hash(&payload),
            magic_reverse: SEGMENT_MAGIC_REVERSE,
        };
        footer.write_to(&mut payload)?;

        writer.write_all(&payload)?;
        writer.flush()?;
        Ok(header)
    }

    fn encode_time(&self, timestamps: &[Timestamp], count: u32) -> DataBlock {
        let compressed = match self.compression {
            CompressionType::Gorilla => gorilla::encode_timestamps(timestamps),
            CompressionType::Raw => None,
        };
        match compressed {
            Some(bits) => DataBlock::new(
                BlockKind::Time,
                TimestampEncoding::DeltaOfDelta as u8,
                "",
                count,
                bits.into_vec(),
            ),
            None => {
                let data = timestamps.iter().flat_map(|ts| ts.to_le_bytes()).collect();
                DataBlock::new(BlockKind::Time, TimestampEncoding::Raw as u8, "", count, data)
            }
        }
    }

    fn encode_column(&self, name: &str, values: &[f64], count: u32) -> DataBlock {
        match self.compression {
            CompressionType::Gorilla => DataBlock::new(
                BlockKind::Values,
                ValueEncoding::GorillaXor as u8,
                name,
                count,
                gorilla::encode_values(values).into_vec(),
            ),
            CompressionType::Raw => {
                let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
                DataBlock::new(BlockKind::Values, ValueEncoding::Raw as u8, name, count, data)
            }
        }
    }
}

fn encode_attributes(attributes: &BTreeMap<String, String>) -> Result<DataBlock> {
    let count = u32::try_from(attributes.len())
        .map_err(|_| AerisError::validation("too many attributes"))?;
    let mut data = Vec::new();
    for (key, value) in attributes {
        let key_len = u16::try_from(key.len())
            .map_err(|_| AerisError::validation(format!("attribute key too long: {key}")))?;
        let value_len = u32::try_from(value.len())
            .map_err(|_| AerisError::validation(format!("attribute value too long: {key}")))?;
        data.extend_from_slice(&key_len.to_le_bytes());
        data.extend_from_slice(key.as_bytes());
        data.extend_from_slice(&value_len.to_le_bytes());
        data.extend_from_slice(value.as_bytes());
    }
    Ok(DataBlock::new(BlockKind::Attributes, 0, "", count, data))
}

/// Parsed, checksum-verified segment payload.
#[derive(Debug, Clone)]
pub struct SegmentReader {
    header: SegmentHeader,
    footer: SegmentFooter,
    blocks: Vec<DataBlock>,
}

impl SegmentReader {
    /// Parses a payload.
    ///
    /// This method:
    /// 1. Reads and validates the header
    /// 2. Reads and validates the footer
    /// 3. Verifies the payload CRC
    /// 4. Reads every block, verifying block CRCs
    ///
    /// # Errors
    ///
    /// Returns an error if the magic bytes are invalid, the version is
    /// unsupported, or any checksum fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(AerisError::DecompressionError(format!(
                "payload too short: {} bytes",
                bytes.len()
            )));
        }

        let header = SegmentHeader::read_from(&mut &bytes[..HEADER_SIZE])?;
        let footer_start = bytes.len() - FOOTER_SIZE;
        let footer = SegmentFooter::read_from(&mut &bytes[footer_start..])?;

        let calculated = crc32fast::hash(&bytes[..footer_start]);
        if calculated != footer.payload_crc32 {
            return Err(AerisError::ChecksumMismatch {
                expected: footer.payload_crc32,
                actual: calculated,
            });
        }

        let body_end = footer.body_offset.checked_add(footer.body_size);
        if footer.body_offset != HEADER_SIZE as u64 || body_end != Some(footer_start as u64) {
            return Err(AerisError::DecompressionError(
                "footer body bounds do not match payload".to_string(),
            ));
        }

        let body = &bytes[HEADER_SIZE..footer_start];
        let mut cursor = Cursor::new(body);
        let mut blocks = Vec::with_capacity(header.column_count as usize + 2);
        while (cursor.position() as usize) < body.len() {
            blocks.push(DataBlock::read_from(&mut cursor)?);
        }

        Ok(Self {
            header,
            footer,
            blocks,
        })
    }

    /// Returns the payload header.
    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// Returns the payload footer.
    pub fn footer(&self) -> &SegmentFooter {
        &self.footer
    }

    /// Returns all blocks in payload order.
    pub fn blocks(&self) -> &[DataBlock] {
        &self.blocks
    }

    /// Decodes the attribute block.
    pub fn attributes(&self) -> Result<BTreeMap<String, String>> {
        let Some(block) = self.blocks.iter().find(|b| b.kind == BlockKind::Attributes) else {
            return Ok(BTreeMap::new());
        };
        decode_attributes(block)
    }

    /// Decodes the full table.
    pub fn read_table(&self) -> Result<ObservationTable> {
        let rows = self.header.row_count as usize;
        let time = self
            .blocks
            .iter()
            .find(|b| b.kind == BlockKind::Time)
            .ok_or_else(|| AerisError::DecompressionError("missing time block".to_string()))?;
        let timestamps = decode_time(time, rows)?;

        let mut columns = BTreeMap::new();
        for block in self.blocks.iter().filter(|b| b.kind == BlockKind::Values) {
            columns.insert(block.name.clone(), decode_column(block, rows)?);
        }
        if columns.len() != self.header.column_count as usize {
            return Err(AerisError::DecompressionError(format!(
                "expected {} columns, found {}",
                self.header.column_count,
                columns.len()
            )));
        }

        Ok(ObservationTable::new(timestamps, columns)?.with_attributes(self.attributes()?))
    }
}

/// Encodes a table with the default writer.
pub fn encode_table(table: &ObservationTable) -> Result<Vec<u8>> {
    SegmentWriter::new().encode(table)
}

/// Decodes a payload produced by [`SegmentWriter`].
pub fn decode_table(bytes: &[u8]) -> Result<ObservationTable> {
    SegmentReader::from_bytes(bytes)?.read_table()
}

fn decode_time(block: &DataBlock, rows: usize) -> Result<Vec<Timestamp>> {
    check_count(block, rows)?;
    match block.encoding {
        e if e == TimestampEncoding::DeltaOfDelta as u8 => {
            let bits = Bits::from_vec(block.data.clone());
            gorilla::decode_timestamps(&bits, rows).ok_or_else(|| {
                AerisError::DecompressionError("truncated timestamp stream".to_string())
            })
        }
        e if e == TimestampEncoding::Raw as u8 => Ok(raw_words(block, rows)?
            .map(i64::from_le_bytes)
            .collect()),
        other => Err(AerisError::UnsupportedVersion(u16::from(other))),
    }
}

fn decode_column(block: &DataBlock, rows: usize) -> Result<Vec<f64>> {
    check_count(block, rows)?;
    match block.encoding {
        e if e == ValueEncoding::GorillaXor as u8 => {
            let bits = Bits::from_vec(block.data.clone());
            gorilla::decode_values(&bits, rows).ok_or_else(|| {
                AerisError::DecompressionError(format!("truncated column {}", block.name))
            })
        }
        e if e == ValueEncoding::Raw as u8 => Ok(raw_words(block, rows)?
            .map(f64::from_le_bytes)
            .collect()),
        other => Err(AerisError::UnsupportedVersion(u16::from(other))),
    }
}

fn check_count(block: &DataBlock, rows: usize) -> Result<()> {
    if block.count as usize != rows {
        return Err(AerisError::DecompressionError(format!(
            "block {:?} '{}' holds {} rows, header says {rows}",
            block.kind, block.name, block.count
        )));
    }
    Ok(())
}

fn raw_words(block: &DataBlock, rows: usize) -> Result<impl Iterator<Item = [u8; 8]> + '_> {
    if block.data.len() != rows * 8 {
        return Err(AerisError::DecompressionError(format!(
            "raw block '{}' has {} bytes for {rows} rows",
            block.name,
            block.data.len()
        )));
    }
    Ok(block.data.chunks_exact(8).map(|c| array::<8>(c, 0)))
}

fn decode_attributes(block: &DataBlock) -> Result<BTreeMap<String, String>> {
    let mut reader = block.data.as_slice();
    let mut attributes = BTreeMap::new();
    for _ in 0..block.count {
        let mut buf2 = [0u8; 2];
        reader.read_exact(&mut buf2)?;
        let key = read_string(&mut reader, u16::from_le_bytes(buf2) as usize)?;
        let mut buf4 = [0u8; 4];
        reader.read_exact(&mut buf4)?;
        let value = read_string(&mut reader, u32::from_le_bytes(buf4) as usize)?;
        attributes.insert(key, value);
    }
    Ok(attributes)
}

fn read_string(reader: &mut &[u8], len: usize) -> Result<String> {
    if reader.len() < len {
        return Err(AerisError::DecompressionError(
            "attribute block truncated".to_string(),
        ));
    }
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|e| AerisError::DecompressionError(format!("Invalid UTF-8 in attribute: {e}")))
}

/// Copies `N` bytes at `offset`. Callers guarantee the bounds.
fn array<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..offset + N]);
    out
}
