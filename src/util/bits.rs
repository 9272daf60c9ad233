//! MSB-first bit reader used to peek at codec picture headers

use crate::error::{Error, Result};

/// Bitstream reader over a byte slice.
///
/// Reads bits in MSB-first order, the ordering used by the Sorenson H.263
/// and Screen Video picture headers.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    /// Read a single bit; `true` for 1.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bit_pos >= self.data.len() * 8 {
            return Err(Error::EndOfStream);
        }

        let byte_idx = self.bit_pos / 8;
        let bit_idx = 7 - (self.bit_pos % 8);
        let bit = (self.data[byte_idx] >> bit_idx) & 1;
        self.bit_pos += 1;
        Ok(bit != 0)
    }

    /// Read `n` bits (at most 32) packed MSB-first into a `u32`.
    #[inline]
    pub fn read_bits(&mut self, n: u8) -> Result<u32> {
        if n > 32 {
            return Err(Error::format("Cannot read more than 32 bits at once"));
        }
        if (n as usize) > self.remaining() {
            return Err(Error::EndOfStream);
        }

        let mut result: u32 = 0;
        for _ in 0..n {
            result = (result << 1) | (self.read_bit()? as u32);
        }
        Ok(result)
    }

    /// Skip `n` bits.
    pub fn skip_bits(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::EndOfStream);
        }
        self.bit_pos += n;
        Ok(())
    }

    /// Number of bits left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.bit_pos)
    }
}
