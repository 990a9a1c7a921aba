//! Parameterized widths and target protocol version. Immutable once built;
//! chosen before the first record is parsed.

use crate::error::SpyError;

/// Byte-endianness of the target's wire format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Endianness {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

/// A field width, in bytes. The only widths the wire format allows.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    /// One byte.
    W1,
    /// Two bytes.
    W2,
    /// Four bytes.
    W4,
    /// Eight bytes.
    W8,
}

impl Width {
    /// Builds a `Width` from a byte count, as given on the command line or
    /// in a target-info record.
    pub fn from_bytes(n: u8) -> Result<Self, SpyError> {
        match n {
            1 => Ok(Width::W1),
            2 => Ok(Width::W2),
            4 => Ok(Width::W4),
            8 => Ok(Width::W8),
            other => Err(SpyError::Config(format!("invalid width: {other} bytes"))),
        }
    }

    /// Builds a `Width`, additionally rejecting values outside `field`'s
    /// allowed domain (§3): the two pointer fields allow `{2,4,8}`; every
    /// other field allows `{1,2,4}`.
    pub fn from_bytes_for_field(field: WidthField, n: u8) -> Result<Self, SpyError> {
        let width = Self::from_bytes(n)?;
        if !field.allows(width) {
            return Err(SpyError::Config(format!(
                "invalid width for {}: {n} bytes",
                field.name()
            )));
        }
        Ok(width)
    }

    /// The width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Width::W1 => 1,
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
        }
    }
}

/// Which `Config` width field a value is being parsed for, so
/// [`Width::from_bytes_for_field`] can gate it to the field's own domain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WidthField {
    Timestamp,
    ObjPtr,
    FunPtr,
    Sig,
    Evt,
    QueueCtr,
    PoolCtr,
    PoolBlk,
    TevtCtr,
}

impl WidthField {
    fn name(self) -> &'static str {
        match self {
            WidthField::Timestamp => "timestamp_size",
            WidthField::ObjPtr => "obj_ptr_size",
            WidthField::FunPtr => "fun_ptr_size",
            WidthField::Sig => "sig_size",
            WidthField::Evt => "evt_size",
            WidthField::QueueCtr => "queue_ctr_size",
            WidthField::PoolCtr => "pool_ctr_size",
            WidthField::PoolBlk => "pool_blk_size",
            WidthField::TevtCtr => "tevt_ctr_size",
        }
    }

    /// The two pointer fields allow `{2,4,8}`; every other field allows
    /// `{1,2,4}`.
    fn allows(self, width: Width) -> bool {
        match self {
            WidthField::ObjPtr | WidthField::FunPtr => !matches!(width, Width::W1),
            _ => !matches!(width, Width::W8),
        }
    }
}

/// Parameterized widths, protocol version, and endianness for one Spy
/// session. Built once at startup and never mutated; a target-info record
/// may produce a *new* `Config` that the Interpreter swaps in, but existing
/// `Config` values are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// e.g. 660 means target protocol version 6.6.0.
    pub protocol_version: u16,
    /// Byte order of all multi-byte fields on the wire.
    pub endianness: Endianness,
    /// Width of the timestamp field in every trace record.
    pub timestamp_size: Width,
    /// Width of an active-object pointer.
    pub obj_ptr_size: Width,
    /// Width of a state-handler function pointer.
    pub fun_ptr_size: Width,
    /// Width of a signal id.
    pub sig_size: Width,
    /// Width of the leading record-type/event id (when used as a counter
    /// rather than the frame header's record-type byte).
    pub evt_size: Width,
    /// Width of a queue occupancy counter.
    pub queue_ctr_size: Width,
    /// Width of a pool free-block counter.
    pub pool_ctr_size: Width,
    /// Width of a pool block-size field.
    pub pool_blk_size: Width,
    /// Width of the target's internal time-event counter.
    pub tevt_ctr_size: Width,
}

impl Default for Config {
    /// The widths QS-style targets commonly use: 4-byte timestamps and
    /// pointers, 2-byte signals, 1-byte everything else.
    fn default() -> Self {
        Config {
            protocol_version: 660,
            endianness: Endianness::Little,
            timestamp_size: Width::W4,
            obj_ptr_size: Width::W4,
            fun_ptr_size: Width::W4,
            sig_size: Width::W2,
            evt_size: Width::W1,
            queue_ctr_size: Width::W1,
            pool_ctr_size: Width::W1,
            pool_blk_size: Width::W2,
            tevt_ctr_size: Width::W2,
        }
    }
}

impl Config {
    /// Parses "X.Y" or "X.Y.Z" into the packed `protocol_version` encoding
    /// (e.g. "6.6.0" -> 660).
    pub fn parse_version(s: &str) -> Result<u16, SpyError> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(SpyError::Config(format!("invalid version: {s}")));
        }

        let mut digits = [0u16; 3];
        for (i, p) in parts.iter().enumerate() {
            digits[i] = p
                .parse()
                .map_err(|_| SpyError::Config(format!("invalid version: {s}")))?;
        }

        Ok(digits[0] * 100 + digits[1] * 10 + digits[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_major_minor() {
        assert_eq!(Config::parse_version("6.6").unwrap(), 660);
    }

    #[test]
    fn parses_major_minor_patch() {
        assert_eq!(Config::parse_version("6.6.1").unwrap(), 661);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Config::parse_version("x.y").is_err());
    }

    #[test]
    fn width_round_trips() {
        for n in [1u8, 2, 4, 8] {
            assert_eq!(Width::from_bytes(n).unwrap().bytes(), n as usize);
        }
    }

    #[test]
    fn rejects_bad_width() {
        assert!(Width::from_bytes(3).is_err());
    }

    #[test]
    fn pointer_fields_reject_one_byte() {
        assert!(Width::from_bytes_for_field(WidthField::ObjPtr, 1).is_err());
        assert!(Width::from_bytes_for_field(WidthField::FunPtr, 1).is_err());
    }

    #[test]
    fn pointer_fields_accept_two_four_eight() {
        for n in [2u8, 4, 8] {
            assert!(Width::from_bytes_for_field(WidthField::ObjPtr, n).is_ok());
            assert!(Width::from_bytes_for_field(WidthField::FunPtr, n).is_ok());
        }
    }

    #[test]
    fn non_pointer_fields_reject_eight_bytes() {
        for field in [
            WidthField::Timestamp,
            WidthField::Sig,
            WidthField::Evt,
            WidthField::QueueCtr,
            WidthField::PoolCtr,
            WidthField::PoolBlk,
            WidthField::TevtCtr,
        ] {
            assert!(Width::from_bytes_for_field(field, 8).is_err());
        }
    }

    #[test]
    fn non_pointer_fields_accept_one_two_four() {
        for n in [1u8, 2, 4] {
            assert!(Width::from_bytes_for_field(WidthField::Timestamp, n).is_ok());
        }
    }
}
