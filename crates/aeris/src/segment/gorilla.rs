//! Gorilla compression for segment columns.
//!
//! The time index and each value column of a segment are compressed
//! independently, so unlike a paired `(timestamp, value)` stream the two
//! codecs here work on separate bit streams that share a row count.
//!
//! # Timestamp Encoding (Delta-of-Delta)
//!
//! - First value: 64 bits raw
//! - Subsequent values use variable-length encoding based on delta-of-delta:
//!   - `0`: `'0'` (1 bit)
//!   - `[-63, 64]`: `'10'` + 7 bits
//!   - `[-255, 256]`: `'110'` + 9 bits
//!   - `[-2047, 2048]`: `'1110'` + 12 bits
//!   - else: `'1111'` + 32 bits
//!
//! A delta-of-delta that does not fit in 32 bits cannot be represented;
//! [`encode_timestamps`] reports this and the caller falls back to raw.
//!
//! # Value Encoding (XOR-based)
//!
//! - First value: 64 bits raw (IEEE 754)
//! - Subsequent values:
//!   - XOR = 0: `'0'` (1 bit)
//!   - Same window: `'10'` + meaningful bits
//!   - New window: `'11'` + 5 bits leading + 6 bits length + meaningful bits
//!
//! NaN payloads survive because values are compared bitwise.

use bitvec::prelude::*;

/// Bit buffer type shared by all encoders.
pub type Bits = BitVec<u8, Msb0>;

/// Compresses a sorted time index.
///
/// Returns `None` if some delta-of-delta falls outside the 32-bit range.
pub fn encode_timestamps(timestamps: &[i64]) -> Option<Bits> {
    let mut output = Bits::new();
    let mut encoder = TimestampEncoder::new();
    for &ts in timestamps {
        encoder.encode(ts, &mut output)?;
    }
    Some(output)
}

/// Decompresses `count` timestamps. Returns `None` on truncated input.
pub fn decode_timestamps(bits: &BitSlice<u8, Msb0>, count: usize) -> Option<Vec<i64>> {
    let mut decoder = TimestampDecoder::new(bits);
    (0..count).map(|_| decoder.decode_next()).collect()
}

/// Compresses a value column.
pub fn encode_values(values: &[f64]) -> Bits {
    let mut output = Bits::new();
    let mut encoder = ValueEncoder::new();
    for &value in values {
        encoder.encode(value, &mut output);
    }
    output
}

/// Decompresses `count` values. Returns `None` on truncated input.
pub fn decode_values(bits: &BitSlice<u8, Msb0>, count: usize) -> Option<Vec<f64>> {
    let mut decoder = ValueDecoder::new(bits);
    (0..count).map(|_| decoder.decode_next()).collect()
}

fn push_bits(output: &mut Bits, value: u64, width: u32) {
    for i in (0..width).rev() {
        output.push((value >> i) & 1 == 1);
    }
}

/// Bounds-checked reader over a bit slice.
struct BitCursor<'a> {
    data: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitCursor<'a> {
    fn new(data: &'a BitSlice<u8, Msb0>) -> Self {
        Self { data, pos: 0 }
    }

    fn bit(&mut self) -> Option<bool> {
        let bit = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(bit)
    }

    fn bits(&mut self, width: u32) -> Option<u64> {
        if self.pos + width as usize > self.data.len() {
            return None;
        }
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | u64::from(self.data[self.pos]);
            self.pos += 1;
        }
        Some(value)
    }
}

/// Encoder for timestamps using delta-of-delta encoding.
#[derive(Debug, Default)]
pub struct TimestampEncoder {
    started: bool,
    prev_ts: i64,
    prev_delta: i64,
}

impl TimestampEncoder {
    /// Creates a new timestamp encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a timestamp into the output bit vector.
    ///
    /// Returns `None`, leaving the encoder state untouched, if the
    /// delta-of-delta does not fit in 32 bits.
    pub fn encode(&mut self, timestamp: i64, output: &mut Bits) -> Option<()> {
        if !self.started {
            self.started = true;
            self.prev_ts = timestamp;
            self.prev_delta = 0;
            push_bits(output, timestamp as u64, 64);
            return Some(());
        }

        let delta = timestamp.checked_sub(self.prev_ts)?;
        let dod = delta.checked_sub(self.prev_delta)?;

        match dod {
            0 => output.push(false),
            -63..=64 => {
                push_bits(output, 0b10, 2);
                push_bits(output, (dod + 63) as u64, 7);
            }
            -255..=256 => {
                push_bits(output, 0b110, 3);
                push_bits(output, (dod + 255) as u64, 9);
            }
            -2047..=2048 => {
                push_bits(output, 0b1110, 4);
                push_bits(output, (dod + 2047) as u64, 12);
            }
            _ => {
                let narrow = i32::try_from(dod).ok()?;
                push_bits(output, 0b1111, 4);
                push_bits(output, u64::from(narrow as u32), 32);
            }
        }

        self.prev_delta = delta;
        self.prev_ts = timestamp;
        Some(())
    }
}

/// Decoder for delta-of-delta encoded timestamps.
pub struct TimestampDecoder<'a> {
    cursor: BitCursor<'a>,
    started: bool,
    prev_ts: i64,
    prev_delta: i64,
}

impl<'a> TimestampDecoder<'a> {
    /// Creates a new timestamp decoder.
    pub fn new(data: &'a BitSlice<u8, Msb0>) -> Self {
        Self {
            cursor: BitCursor::new(data),
            started: false,
            prev_ts: 0,
            prev_delta: 0,
        }
    }

    /// Decodes the next timestamp from the bit stream.
    pub fn decode_next(&mut self) -> Option<i64> {
        if !self.started {
            let ts = self.cursor.bits(64)? as i64;
            self.started = true;
            self.prev_ts = ts;
            self.prev_delta = 0;
            return Some(ts);
        }

        let dod = if !self.cursor.bit()? {
            0
        } else if !self.cursor.bit()? {
            self.cursor.bits(7)? as i64 - 63
        } else if !self.cursor.bit()? {
            self.cursor.bits(9)? as i64 - 255
        } else if !self.cursor.bit()? {
            self.cursor.bits(12)? as i64 - 2047
        } else {
            i64::from(self.cursor.bits(32)? as u32 as i32)
        };

        let delta = self.prev_delta.checked_add(dod)?;
        let ts = self.prev_ts.checked_add(delta)?;
        self.prev_delta = delta;
        self.prev_ts = ts;
        Some(ts)
    }
}

/// Encoder for float values using XOR compression.
#[derive(Debug, Default)]
pub struct ValueEncoder {
    started: bool,
    prev_value: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl ValueEncoder {
    /// Creates a new value encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a float value into the output bit vector.
    pub fn encode(&mut self, value: f64, output: &mut Bits) {
        let bits = value.to_bits();

        if !self.started {
            self.started = true;
            self.prev_value = bits;
            push_bits(output, bits, 64);
            return;
        }

        let xor = bits ^ self.prev_value;
        if xor == 0 {
            output.push(false);
        } else {
            // Leading zeros are stored in 5 bits, so cap before deriving the width.
            let leading = xor.leading_zeros().min(31);
            let trailing = xor.trailing_zeros();

            if self.prev_leading + self.prev_trailing > 0
                && leading >= self.prev_leading
                && trailing >= self.prev_trailing
            {
                push_bits(output, 0b10, 2);
                let width = 64 - self.prev_leading - self.prev_trailing;
                push_bits(output, xor >> self.prev_trailing, width);
            } else {
                push_bits(output, 0b11, 2);
                let width = 64 - leading - trailing;
                push_bits(output, u64::from(leading), 5);
                push_bits(output, u64::from(width - 1), 6);
                push_bits(output, xor >> trailing, width);
                self.prev_leading = leading;
                self.prev_trailing = trailing;
            }
        }

        self.prev_value = bits;
    }
}

/// Decoder for XOR-encoded float values.
pub struct ValueDecoder<'a> {
    cursor: BitCursor<'a>,
    started: bool,
    prev_value: u64,
    prev_leading: u32,
    prev_trailing: u32,
}

impl<'a> ValueDecoder<'a> {
    /// Creates a new value decoder.
    pub fn new(data: &'a BitSlice<u8, Msb0>) -> Self {
        Self {
            cursor: BitCursor::new(data),
            started: false,
            prev_value: 0,
            prev_leading: 0,
            prev_trailing: 0,
        }
    }

    /// Decodes the next float value from the bit stream.
    pub fn decode_next(&mut self) -> Option<f64> {
        if !self.started {
            let bits = self.cursor.bits(64)?;
            self.started = true;
            self.prev_value = bits;
            return Some(f64::from_bits(bits));
        }

        let xor = if !self.cursor.bit()? {
            0
        } else if !self.cursor.bit()? {
            let width = 64 - self.prev_leading - self.prev_trailing;
            self.cursor.bits(width)? << self.prev_trailing
        } else {
            let leading = self.cursor.bits(5)? as u32;
            let width = self.cursor.bits(6)? as u32 + 1;
            let trailing = 64u32.checked_sub(leading + width)?;
            self.prev_leading = leading;
            self.prev_trailing = trailing;
            self.cursor.bits(width)? << trailing
        };

        let bits = self.prev_value ^ xor;
        self.prev_value = bits;
        Some(f64::from_bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_ts(timestamps: &[i64]) -> Vec<i64> {
        let bits = encode_timestamps(timestamps).expect("encodable");
        decode_timestamps(&bits, timestamps.len()).expect("decodable")
    }

    fn roundtrip_values(values: &[f64]) -> Vec<f64> {
        let bits = encode_values(values);
        decode_values(&bits, values.len()).expect("decodable")
    }

    #[test]
    fn test_regular_minute_index() {
        let timestamps: Vec<i64> = (0..500).map(|i| 1_546_300_800 + i * 60).collect();
        let bits = encode_timestamps(&timestamps).unwrap();
        // 64 bits for the first value, 2 + 7 for the first delta, then 1 bit each
        assert!(bits.len() < 64 + 9 + 500);
        assert_eq!(decode_timestamps(&bits, timestamps.len()).unwrap(), timestamps);
    }

    #[test]
    fn test_all_dod_classes() {
        let timestamps = vec![
            1000_i64, 1010, 1025, 1035, 1055, // small
            1155, 1405, 1455, // medium
            2455, 5455, 5955, // large
            1_000_000, 100_000_000, 100_001_000, // 32-bit
        ];
        assert_eq!(roundtrip_ts(&timestamps), timestamps);
    }

    #[test]
    fn test_negative_timestamps() {
        let timestamps = vec![-1_000_000_i64, -999_940, -999_880, 0, 60];
        assert_eq!(roundtrip_ts(&timestamps), timestamps);
    }

    #[test]
    fn test_overflowing_dod_rejected() {
        let timestamps = vec![0_i64, 10, 10 + i64::from(i32::MAX) * 4];
        assert!(encode_timestamps(&timestamps).is_none());
    }

    #[test]
    fn test_truncated_input() {
        let timestamps: Vec<i64> = (0..10).map(|i| i * 7 + i * i).collect();
        let bits = encode_timestamps(&timestamps).unwrap();
        let short = &bits[..bits.len() - 3];
        assert!(decode_timestamps(short, timestamps.len()).is_none());
        assert!(decode_values(BitSlice::empty(), 1).is_none());
    }

    #[test]
    fn test_value_roundtrip() {
        let values = vec![1.0_f64, 1.0, 1.1, 1.2, 1.1, 2.0, 0.0, -1.0, 409.87, 409.91];
        assert_eq!(roundtrip_values(&values), values);
    }

    #[test]
    fn test_identical_values_compress() {
        let values = vec![42.5_f64; 10];
        let bits = encode_values(&values);
        assert_eq!(bits.len(), 64 + 9);
        assert_eq!(roundtrip_values(&values), values);
    }

    #[test]
    fn test_wide_leading_zero_run() {
        // XOR of these two has more than 31 leading zeros.
        let a = f64::from_bits(0x4000_0000_0000_0000);
        let b = f64::from_bits(0x4000_0000_0000_0001);
        let c = f64::from_bits(0x4000_0000_0000_0003);
        let values = vec![a, b, c, a];
        let decoded = roundtrip_values(&values);
        for (x, y) in values.iter().zip(&decoded) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_special_floats_bitwise() {
        let values = vec![
            0.0_f64,
            -0.0,
            f64::NAN,
            f64::MIN,
            f64::MAX,
            f64::MIN_POSITIVE,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
        ];
        let decoded = roundtrip_values(&values);
        for (x, y) in values.iter().zip(&decoded) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_empty() {
        assert!(encode_timestamps(&[]).unwrap().is_empty());
        assert!(decode_timestamps(BitSlice::empty(), 0).unwrap().is_empty());
        assert!(encode_values(&[]).is_empty());
    }
}
