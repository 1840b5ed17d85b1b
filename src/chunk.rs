//! Decoding of raw XOR chunks into samples.
//!
//! A chunk is the Prometheus XOR encoding: a 2-byte big-endian sample count
//! followed by an MSB-first bit stream.
//!
//! ```text
//! sample 0:  varint timestamp, 64-bit value
//! sample 1:  uvarint timestamp delta, XOR value
//! sample n:  delta-of-delta timestamp, XOR value
//!
//! delta-of-delta:  0                 dod == 0
//!                  10   + 14 bits    dod in [-8191, 8192]
//!                  110  + 17 bits    dod in [-65535, 65536]
//!                  1110 + 20 bits    dod in [-524287, 524288]
//!                  1111 + 64 bits    otherwise
//!
//! XOR value:       0                 same value
//!                  10 + bits         same leading/trailing zero window
//!                  11 + 5 bits leading + 6 bits length + bits
//! ```
//!
//! Decoding is lazy: [`decode`] validates the header and returns an iterator
//! that reads one sample per step.

use std::error;
use std::fmt;
use std::iter::FusedIterator;
use std::slice;

use store_api::storepb;
use store_api::storepb::chunk::Encoding;

use super::bstream::BitReader;
use super::bstream::BitWriter;
use super::model::Sample;
use super::model::TimeRange;

const HEADER_LEN: usize = 2;

/// Why a chunk, or the chunk sequence of a series, could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The chunk is shorter than its header.
    MissingHeader,
    /// The bit stream ended before the sample count in the header was reached.
    Truncated,
    /// A varint did not fit into 64 bits.
    VarintOverflow,
    /// A chunk has no raw payload; only downsampled aggregates were sent.
    NotRaw,
    /// A raw chunk uses an encoding other than XOR.
    UnsupportedEncoding(i32),
    /// Timestamps inside a chunk did not strictly increase.
    OutOfOrder {
        /// The previous timestamp.
        previous: i64,
        /// The offending timestamp.
        timestamp: i64,
    },
    /// A chunk starts before the previous chunk of the same series ended.
    Overlap {
        /// The last timestamp of the previous chunk.
        previous: i64,
        /// The first timestamp of the offending chunk.
        timestamp: i64,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::DecodeError::*;
        match self {
            MissingHeader => write!(f, "chunk shorter than its header"),
            Truncated => write!(f, "chunk data ends before its last sample"),
            VarintOverflow => write!(f, "varint overflows 64 bits"),
            NotRaw => write!(f, "chunk carries no raw data"),
            UnsupportedEncoding(e) => match Encoding::try_from(*e) {
                Ok(e) => write!(f, "unsupported chunk encoding {}", e.as_str_name()),
                Err(_) => write!(f, "unknown chunk encoding {}", e),
            },
            OutOfOrder {
                previous,
                timestamp,
            } => write!(
                f,
                "sample timestamp {} does not follow {}",
                timestamp, previous
            ),
            Overlap {
                previous,
                timestamp,
            } => write!(
                f,
                "chunk starting at {} overlaps previous chunk ending at {}",
                timestamp, previous
            ),
        }
    }
}

impl error::Error for DecodeError {}

/// Decode one XOR chunk, keeping only the samples inside `range`.
///
/// Samples come out in strictly increasing timestamp order. Samples outside
/// `range` are dropped, never reported as errors. Iteration ends early once a
/// timestamp passes `range.max()`.
///
/// # Errors
///
/// Fails immediately if `data` is shorter than the header; any other
/// corruption is reported by the iterator, after which it yields nothing.
pub fn decode(data: &[u8], range: TimeRange) -> Result<Samples<'_>, DecodeError> {
    Ok(Samples {
        inner: XorIterator::new(data)?,
        range,
    })
}

/// The clipped samples of one chunk. See [`decode`].
pub struct Samples<'a> {
    inner: XorIterator<'a>,
    range: TimeRange,
}

impl<'a> Iterator for Samples<'a> {
    type Item = Result<Sample, DecodeError>;
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(s) if s.timestamp < self.range.min() => continue,
                Ok(s) if s.timestamp > self.range.max() => {
                    self.inner.stop();
                    return None;
                }
                other => return Some(other),
            }
        }
    }
}

impl<'a> FusedIterator for Samples<'a> {}

/// Unclipped XOR decoding.
struct XorIterator<'a> {
    reader: BitReader<'a>,
    total: u16,
    read: u16,
    t: i64,
    t_delta: u64,
    value: u64,
    leading: u32,
    trailing: u32,
    done: bool,
}

impl<'a> XorIterator<'a> {
    fn new(data: &'a [u8]) -> Result<XorIterator<'a>, DecodeError> {
        if data.len() < HEADER_LEN {
            return Err(DecodeError::MissingHeader);
        }
        Ok(XorIterator {
            reader: BitReader::new(&data[HEADER_LEN..]),
            total: u16::from_be_bytes([data[0], data[1]]),
            read: 0,
            t: 0,
            t_delta: 0,
            value: 0,
            leading: 0,
            trailing: 0,
            done: false,
        })
    }

    fn stop(&mut self) {
        self.done = true;
    }

    fn read_sample(&mut self) -> Result<Sample, DecodeError> {
        match self.read {
            0 => {
                self.t = self.reader.read_varint()?;
                self.value = self.reader.read_bits(64)?;
            }
            1 => {
                self.t_delta = self.reader.read_uvarint()?;
                self.advance_time()?;
                self.read_value()?;
            }
            _ => {
                let dod = self.read_dod()?;
                self.t_delta = (self.t_delta as i64).wrapping_add(dod) as u64;
                self.advance_time()?;
                self.read_value()?;
            }
        }
        self.read += 1;
        Ok(Sample::new(self.t, f64::from_bits(self.value)))
    }

    fn advance_time(&mut self) -> Result<(), DecodeError> {
        let previous = self.t;
        self.t = previous.wrapping_add(self.t_delta as i64);
        if self.t <= previous {
            return Err(DecodeError::OutOfOrder {
                previous,
                timestamp: self.t,
            });
        }
        Ok(())
    }

    fn read_dod(&mut self) -> Result<i64, DecodeError> {
        let mut prefix = 0u8;
        for _ in 0..4 {
            prefix <<= 1;
            if !self.reader.read_bit()? {
                break;
            }
            prefix |= 1;
        }
        let size = match prefix {
            0b0 => return Ok(0),
            0b10 => 14,
            0b110 => 17,
            0b1110 => 20,
            _ => return Ok(self.reader.read_bits(64)? as i64),
        };
        let mut bits = self.reader.read_bits(size)? as i64;
        // The value is a two's complement number of `size` bits.
        if bits > 1 << (size - 1) {
            bits -= 1 << size;
        }
        Ok(bits)
    }

    fn read_value(&mut self) -> Result<(), DecodeError> {
        if !self.reader.read_bit()? {
            return Ok(());
        }
        if self.reader.read_bit()? {
            self.leading = self.reader.read_bits(5)? as u32;
            let mut significant = self.reader.read_bits(6)? as u32;
            // 0 significant bits cannot happen, so 0 stands for 64.
            if significant == 0 {
                significant = 64;
            }
            self.trailing = 64u32.saturating_sub(self.leading + significant);
        }
        let significant = 64 - self.leading - self.trailing;
        let bits = self.reader.read_bits(significant)?;
        self.value ^= bits << self.trailing;
        Ok(())
    }
}

impl<'a> Iterator for XorIterator<'a> {
    type Item = Result<Sample, DecodeError>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.read >= self.total {
            return None;
        }
        let sample = self.read_sample();
        if sample.is_err() {
            self.done = true;
        }
        Some(sample)
    }
}

/// The decoded samples of all chunks of one series, clipped to a range.
///
/// Chunks entirely outside the range are skipped without being decoded.
/// Chunks may touch but not overlap: a chunk whose first sample lies before
/// the last sample of the chunk before it is an error.
pub struct SeriesSamples<'a> {
    chunks: slice::Iter<'a, storepb::AggrChunk>,
    current: Option<XorIterator<'a>>,
    range: TimeRange,
    last: Option<i64>,
    first_of_chunk: bool,
    done: bool,
}

impl<'a> SeriesSamples<'a> {
    pub(crate) fn new(chunks: &'a [storepb::AggrChunk], range: TimeRange) -> SeriesSamples<'a> {
        SeriesSamples {
            chunks: chunks.iter(),
            current: None,
            range,
            last: None,
            first_of_chunk: false,
            done: false,
        }
    }

    fn open_next_chunk(&mut self) -> Option<Result<(), DecodeError>> {
        for chunk in self.chunks.by_ref() {
            if !self.range.overlaps(chunk.min_time, chunk.max_time) {
                continue;
            }
            let raw = match &chunk.raw {
                Some(raw) => raw,
                None => return Some(Err(DecodeError::NotRaw)),
            };
            if raw.r#type != Encoding::Xor as i32 {
                return Some(Err(DecodeError::UnsupportedEncoding(raw.r#type)));
            }
            return Some(XorIterator::new(&raw.data).map(|it| {
                self.current = Some(it);
                self.first_of_chunk = true;
            }));
        }
        None
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<Sample, DecodeError>> {
        self.done = true;
        self.current = None;
        Some(Err(err))
    }
}

impl<'a> Iterator for SeriesSamples<'a> {
    type Item = Result<Sample, DecodeError>;
    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let sample = match self.current.as_mut().and_then(|it| it.next()) {
                Some(Ok(sample)) => sample,
                Some(Err(e)) => return self.fail(e),
                None => {
                    self.current = None;
                    match self.open_next_chunk() {
                        Some(Ok(())) => continue,
                        Some(Err(e)) => return self.fail(e),
                        None => {
                            self.done = true;
                            return None;
                        }
                    }
                }
            };
            if self.first_of_chunk {
                self.first_of_chunk = false;
                if let Some(previous) = self.last {
                    if sample.timestamp < previous {
                        return self.fail(DecodeError::Overlap {
                            previous,
                            timestamp: sample.timestamp,
                        });
                    }
                }
            }
            self.last = Some(sample.timestamp);
            if sample.timestamp < self.range.min() {
                continue;
            }
            if sample.timestamp > self.range.max() {
                // Later chunks only hold later samples.
                self.done = true;
                self.current = None;
                return None;
            }
            return Some(Ok(sample));
        }
        None
    }
}

impl<'a> FusedIterator for SeriesSamples<'a> {}

/// Encoder for XOR chunks, producing what [`decode`] reads.
///
/// Timestamps must strictly increase; a chunk holds at most `u16::MAX`
/// samples.
pub struct XorEncoder {
    writer: BitWriter,
    count: u16,
    t: i64,
    t_delta: u64,
    value: u64,
    leading: u32,
    trailing: u32,
}

impl Default for XorEncoder {
    fn default() -> Self {
        XorEncoder::new()
    }
}

impl XorEncoder {
    /// An empty chunk.
    pub fn new() -> XorEncoder {
        XorEncoder {
            writer: BitWriter::new(),
            count: 0,
            t: 0,
            t_delta: 0,
            value: 0,
            leading: u32::MAX,
            trailing: 0,
        }
    }

    /// The number of samples appended so far.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Whether no sample was appended yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append a sample. Returns `false`, leaving the chunk unchanged, if the
    /// chunk is full.
    pub fn append(&mut self, sample: Sample) -> bool {
        if self.count == u16::MAX {
            return false;
        }
        let t = sample.timestamp;
        let value = sample.value.to_bits();
        match self.count {
            0 => {
                self.writer.write_varint(t);
                self.writer.write_bits(value, 64);
            }
            1 => {
                self.t_delta = t.wrapping_sub(self.t) as u64;
                self.writer.write_uvarint(self.t_delta);
                self.write_value(value);
            }
            _ => {
                let t_delta = t.wrapping_sub(self.t) as u64;
                let dod = t_delta.wrapping_sub(self.t_delta) as i64;
                if dod == 0 {
                    self.writer.write_bit(false);
                } else if bit_range(dod, 14) {
                    self.writer.write_bits(0b10, 2);
                    self.writer.write_bits(dod as u64, 14);
                } else if bit_range(dod, 17) {
                    self.writer.write_bits(0b110, 3);
                    self.writer.write_bits(dod as u64, 17);
                } else if bit_range(dod, 20) {
                    self.writer.write_bits(0b1110, 4);
                    self.writer.write_bits(dod as u64, 20);
                } else {
                    self.writer.write_bits(0b1111, 4);
                    self.writer.write_bits(dod as u64, 64);
                }
                self.t_delta = t_delta;
                self.write_value(value);
            }
        }
        self.t = t;
        self.value = value;
        self.count += 1;
        true
    }

    fn write_value(&mut self, value: u64) {
        let delta = value ^ self.value;
        if delta == 0 {
            self.writer.write_bit(false);
            return;
        }
        self.writer.write_bit(true);
        let leading = delta.leading_zeros().min(31);
        let trailing = delta.trailing_zeros();
        if self.leading != u32::MAX && leading >= self.leading && trailing >= self.trailing {
            self.writer.write_bit(false);
            self.writer
                .write_bits(delta >> self.trailing, 64 - self.leading - self.trailing);
            return;
        }
        self.leading = leading;
        self.trailing = trailing;
        self.writer.write_bit(true);
        self.writer.write_bits(leading as u64, 5);
        let significant = 64 - leading - trailing;
        // 64 wraps to 0 in six bits.
        self.writer.write_bits(significant as u64, 6);
        self.writer.write_bits(delta >> trailing, significant);
    }

    /// The encoded chunk, header included.
    pub fn finish(&self) -> Vec<u8> {
        let body = self.writer.as_bytes();
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&self.count.to_be_bytes());
        out.extend_from_slice(body);
        out
    }
}

fn bit_range(x: i64, bits: u32) -> bool {
    -((1 << (bits - 1)) - 1) <= x && x <= 1 << (bits - 1)
}

/// Encode `samples` as one raw XOR chunk, the way a store sends it.
pub fn encode_raw_chunk(samples: &[Sample]) -> storepb::AggrChunk {
    let mut encoder = XorEncoder::new();
    for &sample in samples {
        encoder.append(sample);
    }
    storepb::AggrChunk {
        min_time: samples.first().map_or(0, |s| s.timestamp),
        max_time: samples.last().map_or(0, |s| s.timestamp),
        raw: Some(storepb::Chunk {
            r#type: Encoding::Xor as i32,
            data: encoder.finish(),
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::decode;
    use super::encode_raw_chunk;
    use super::DecodeError;
    use super::SeriesSamples;
    use super::XorEncoder;
    use crate::model::Sample;
    use crate::model::TimeRange;
    use store_api::storepb;

    fn everything() -> TimeRange {
        TimeRange::new(i64::MIN, i64::MAX).unwrap()
    }

    fn encode(samples: &[Sample]) -> Vec<u8> {
        let mut encoder = XorEncoder::new();
        for &s in samples {
            assert!(encoder.append(s));
        }
        encoder.finish()
    }

    fn decode_all(data: &[u8], range: TimeRange) -> Result<Vec<Sample>, DecodeError> {
        decode(data, range)?.collect()
    }

    #[test]
    fn empty_chunk() {
        let data = XorEncoder::new().finish();
        assert_eq!(data, [0, 0]);
        assert_eq!(decode_all(&data, everything()).unwrap(), []);
    }

    #[test]
    fn missing_header() {
        assert_eq!(decode(&[0], everything()).err(), Some(DecodeError::MissingHeader));
    }

    #[test]
    fn all_timestamp_encodings() {
        // Deltas chosen to hit every delta-of-delta width, including negative
        // ones and the 64-bit escape.
        let mut t = 1_600_000_000_000i64;
        let mut samples = vec![Sample::new(t, 1.0)];
        for (i, delta) in [15_000, 15_000, 15_001, 14_000, 5_000, 70_000, 500_000, 90_000_000, 1]
            .iter()
            .enumerate()
        {
            t += delta;
            samples.push(Sample::new(t, i as f64));
        }
        let data = encode(&samples);
        assert_eq!(decode_all(&data, everything()).unwrap(), samples);
    }

    #[test]
    fn exact_values() {
        let values = [
            0.0,
            -0.0,
            1.5,
            1.5,
            1.500_000_000_000_1,
            f64::MAX,
            f64::MIN_POSITIVE,
            -123_456.789,
            f64::INFINITY,
            f64::NEG_INFINITY,
            42.0,
        ];
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(1000 + i as i64 * 10, v))
            .collect();
        let decoded = decode_all(&encode(&samples), everything()).unwrap();
        for (got, want) in decoded.iter().zip(&samples) {
            assert_eq!(got.timestamp, want.timestamp);
            assert_eq!(got.value.to_bits(), want.value.to_bits());
        }
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn nan_round_trips() {
        let samples = [Sample::new(1, f64::NAN), Sample::new(2, 3.0), Sample::new(3, f64::NAN)];
        let decoded = decode_all(&encode(&samples), everything()).unwrap();
        assert!(decoded[0].value.is_nan());
        assert_eq!(decoded[1].value, 3.0);
        assert!(decoded[2].value.is_nan());
    }

    #[test]
    fn clips_to_range() {
        let samples: Vec<Sample> = (0..10).map(|i| Sample::new(i * 100, i as f64)).collect();
        let data = encode(&samples);
        let range = TimeRange::new(200, 500).unwrap();
        let got = decode_all(&data, range).unwrap();
        assert_eq!(
            got.iter().map(|s| s.timestamp).collect::<Vec<_>>(),
            [200, 300, 400, 500],
        );
        let none = decode_all(&data, TimeRange::new(10_000, 20_000).unwrap()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn truncated_chunk() {
        let samples: Vec<Sample> = (0..20).map(|i| Sample::new(i * 1000, i as f64 * 0.1)).collect();
        let mut data = encode(&samples);
        data.truncate(data.len() / 2);
        let results: Vec<_> = decode(&data, everything()).unwrap().collect();
        assert_eq!(results.last(), Some(&Err(DecodeError::Truncated)));
        assert!(results.len() < samples.len());
    }

    #[test]
    fn count_beyond_data() {
        let mut data = encode(&[Sample::new(1, 1.0)]);
        data[1] = 5;
        let results: Vec<_> = decode(&data, everything()).unwrap().collect();
        assert_eq!(results[0], Ok(Sample::new(1, 1.0)));
        assert_eq!(results[1], Err(DecodeError::Truncated));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn non_increasing_timestamps() {
        let data = encode(&[Sample::new(10, 1.0), Sample::new(10, 2.0)]);
        assert_eq!(
            decode_all(&data, everything()),
            Err(DecodeError::OutOfOrder {
                previous: 10,
                timestamp: 10,
            }),
        );
    }

    fn series_samples(chunks: &[storepb::AggrChunk], range: TimeRange) -> Result<Vec<i64>, DecodeError> {
        SeriesSamples::new(chunks, range)
            .map(|s| s.map(|s| s.timestamp))
            .collect()
    }

    #[test]
    fn series_spans_chunks() {
        let chunks = [
            encode_raw_chunk(&[Sample::new(100, 1.0), Sample::new(200, 2.0)]),
            encode_raw_chunk(&[Sample::new(200, 3.0), Sample::new(300, 4.0)]),
            encode_raw_chunk(&[Sample::new(400, 5.0)]),
        ];
        assert_eq!(series_samples(&chunks, everything()).unwrap(), [100, 200, 200, 300, 400]);
        assert_eq!(
            series_samples(&chunks, TimeRange::new(150, 300).unwrap()).unwrap(),
            [200, 200, 300],
        );
    }

    #[test]
    fn overlapping_chunks() {
        let chunks = [
            encode_raw_chunk(&[Sample::new(100, 1.0), Sample::new(300, 2.0)]),
            encode_raw_chunk(&[Sample::new(200, 3.0)]),
        ];
        assert_eq!(
            series_samples(&chunks, everything()),
            Err(DecodeError::Overlap {
                previous: 300,
                timestamp: 200,
            }),
        );
    }

    #[test]
    fn chunks_outside_range_are_not_decoded() {
        let garbage = storepb::AggrChunk {
            min_time: 0,
            max_time: 50,
            raw: Some(storepb::Chunk {
                r#type: 0,
                data: vec![0xff],
            }),
            ..Default::default()
        };
        let chunks = [garbage, encode_raw_chunk(&[Sample::new(100, 1.0)])];
        assert_eq!(
            series_samples(&chunks, TimeRange::new(60, 1000).unwrap()).unwrap(),
            [100],
        );
    }

    #[test]
    fn downsampled_chunks_are_rejected() {
        let aggregated = storepb::AggrChunk {
            min_time: 0,
            max_time: 100,
            raw: None,
            count: Some(storepb::Chunk::default()),
            ..Default::default()
        };
        assert_eq!(series_samples(&[aggregated], everything()), Err(DecodeError::NotRaw));

        let histogram = storepb::AggrChunk {
            min_time: 0,
            max_time: 100,
            raw: Some(storepb::Chunk {
                r#type: 1,
                data: vec![0, 0],
            }),
            ..Default::default()
        };
        let err = series_samples(&[histogram], everything()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedEncoding(1));
        assert_eq!(err.to_string(), "unsupported chunk encoding HISTOGRAM");
    }
}
