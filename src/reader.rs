//! A cursor over one decoded frame, with typed extraction honoring the
//! session's configured endianness and field widths.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::config::{Endianness, Width};
use crate::error::SpyError;

/// Cursor over a decoded frame's bytes.
#[derive(Debug)]
pub struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> RecordReader<'a> {
    /// Wraps a decoded frame for reading.
    pub fn new(bytes: &'a [u8], endianness: Endianness) -> Self {
        RecordReader {
            bytes,
            pos: 0,
            endianness,
        }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SpyError> {
        if self.remaining() < n {
            return Err(SpyError::Parse(format!(
                "truncated record: need {n} byte(s), have {}",
                self.remaining()
            )));
        }

        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> Result<u8, SpyError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a 16-bit integer at the configured endianness.
    pub fn u16(&mut self) -> Result<u16, SpyError> {
        let b = self.take(2)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u16(b),
            Endianness::Big => BigEndian::read_u16(b),
        })
    }

    /// Reads a 32-bit integer at the configured endianness.
    pub fn u32(&mut self) -> Result<u32, SpyError> {
        let b = self.take(4)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u32(b),
            Endianness::Big => BigEndian::read_u32(b),
        })
    }

    /// Reads a 64-bit integer at the configured endianness.
    pub fn u64(&mut self) -> Result<u64, SpyError> {
        let b = self.take(8)?;
        Ok(match self.endianness {
            Endianness::Little => LittleEndian::read_u64(b),
            Endianness::Big => BigEndian::read_u64(b),
        })
    }

    /// Reads a value of the given width, widened to `u64`. The single
    /// extractor the width-polymorphic record fields (pointers, signals,
    /// counters) all go through.
    pub fn width(&mut self, width: Width) -> Result<u64, SpyError> {
        Ok(match width {
            Width::W1 => self.u8()? as u64,
            Width::W2 => self.u16()? as u64,
            Width::W4 => self.u32()? as u64,
            Width::W8 => self.u64()?,
        })
    }

    /// Reads a NUL-terminated string. Non-UTF-8 bytes are replaced with
    /// `?`, since the target is documented to send 7-bit ASCII but nothing
    /// in the wire format guarantees it.
    pub fn cstr(&mut self) -> Result<String, SpyError> {
        let start = self.pos;
        let end = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| SpyError::Parse("unterminated string in record".into()))?;

        let raw = &self.bytes[start..start + end];
        self.pos = start + end + 1; // consume the NUL too

        Ok(raw
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_widths_little_endian_exact() {
        let bytes = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00];
        let mut r = RecordReader::new(&bytes, Endianness::Little);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u16().unwrap(), 0x5678);
    }

    #[test]
    fn reads_widths_big_endian() {
        let bytes = [0x12, 0x34];
        let mut r = RecordReader::new(&bytes, Endianness::Big);
        assert_eq!(r.u16().unwrap(), 0x1234);
    }

    #[test]
    fn width_extractor_widens_to_u64() {
        let bytes = [0xEF, 0xBE, 0xAD, 0xDE];
        let mut r = RecordReader::new(&bytes, Endianness::Little);
        assert_eq!(r.width(Width::W4).unwrap(), 0xDEADBEEFu64);
    }

    #[test]
    fn reads_cstring() {
        let bytes = b"AO_Blinky\0rest";
        let mut r = RecordReader::new(bytes, Endianness::Little);
        assert_eq!(r.cstr().unwrap(), "AO_Blinky");
        assert_eq!(r.remaining(), 4);
    }

    #[test]
    fn unterminated_string_is_parse_error() {
        let bytes = b"no_nul_here";
        let mut r = RecordReader::new(bytes, Endianness::Little);
        assert!(r.cstr().is_err());
    }

    #[test]
    fn reading_past_end_is_truncated_record() {
        let bytes = [0x01];
        let mut r = RecordReader::new(&bytes, Endianness::Little);
        assert!(r.u32().is_err());
    }
}
