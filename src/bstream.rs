//! MSB-first bit streams, as used inside XOR chunks.
//!
//! Bits fill each byte from the most significant end:
//!
//! ```text
//! byte: [b0 b1 b2 b3 b4 b5 b6 b7]
//!        MSB                  LSB
//! ```
//!
//! Varints are LEB128, zigzag-encoded when signed, and are not byte aligned:
//! they are read and written eight bits at a time through the same stream.

use super::chunk::DecodeError;

const MAX_VARINT_LEN64: usize = 10;

pub struct BitReader<'a> {
    data: &'a [u8],
    /// Index of the next bit to read.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> BitReader<'a> {
        BitReader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    pub fn read_bit(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Read `n <= 64` bits into the low end of the result.
    pub fn read_bits(&mut self, mut n: u32) -> Result<u64, DecodeError> {
        debug_assert!(n <= 64);
        if self.remaining() < n as usize {
            return Err(DecodeError::Truncated);
        }
        let mut out = 0u64;
        while n > 0 {
            let byte = self.data[self.pos / 8];
            let used = (self.pos % 8) as u32;
            let take = (8 - used).min(n);
            let bits = (byte << used) >> (8 - take);
            out = (out << take) | bits as u64;
            self.pos += take as usize;
            n -= take;
        }
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_uvarint(&mut self) -> Result<u64, DecodeError> {
        let mut x = 0u64;
        let mut s = 0u32;
        for i in 0..MAX_VARINT_LEN64 {
            let b = self.read_byte()?;
            if b < 0x80 {
                if i == MAX_VARINT_LEN64 - 1 && b > 1 {
                    return Err(DecodeError::VarintOverflow);
                }
                return Ok(x | (b as u64) << s);
            }
            x |= ((b & 0x7f) as u64) << s;
            s += 7;
        }
        Err(DecodeError::VarintOverflow)
    }

    pub fn read_varint(&mut self) -> Result<i64, DecodeError> {
        let ux = self.read_uvarint()?;
        let x = (ux >> 1) as i64;
        Ok(if ux & 1 != 0 { !x } else { x })
    }
}

#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// Number of free bits in the last byte.
    free: u32,
}

impl BitWriter {
    pub fn new() -> BitWriter {
        BitWriter::default()
    }

    pub fn write_bit(&mut self, bit: bool) {
        if self.free == 0 {
            self.bytes.push(0);
            self.free = 8;
        }
        self.free -= 1;
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << self.free;
        }
    }

    /// Write the low `n <= 64` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.write_bits(byte as u64, 8);
    }

    pub fn write_uvarint(&mut self, mut x: u64) {
        while x >= 0x80 {
            self.write_byte(x as u8 | 0x80);
            x >>= 7;
        }
        self.write_byte(x as u8);
    }

    pub fn write_varint(&mut self, x: i64) {
        let mut ux = (x as u64) << 1;
        if x < 0 {
            ux = !ux;
        }
        self.write_uvarint(ux);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
