//! Builds outbound command frames and encodes them onto the wire, using the
//! same escape/checksum framing the [`crate::framer::Framer`] decodes
//! (§4.1/§4.6): the Framer is the encoder's inverse.

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::config::{Config, Endianness};

const FRAME_END: u8 = 0x00;
const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

bitflags! {
    /// The 16-byte global trace filter mask sent by `GLB_FILTER`, one bit
    /// per record group (§4.4/§4.6).
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    pub struct GroupFilter: u128 {
        const SESSION       = 1 << 0;
        const DICTIONARY    = 1 << 1;
        const STATE_MACHINE = 1 << 2;
        const ACTIVE_OBJECT = 1 << 3;
        const TIME_EVENT    = 1 << 4;
        const MEMORY_POOL   = 1 << 5;
        const SCHEDULER     = 1 << 6;
        const USER          = 1 << 7;
        const ASSERTION     = 1 << 8;
    }
}

/// Outbound command-frame type ids, per §4.6.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandKind {
    Reset = 0,
    Info = 1,
    Cmd = 2,
    Peek = 3,
    Poke = 4,
    Fill = 5,
    TestSetup = 6,
    TestTeardown = 7,
    TestProbeDef = 8,
    TestContinue = 9,
    Tick = 10,
    GlbFilter = 11,
    LocFilter = 12,
    AoFilter = 13,
    CurrObj = 14,
    QueryCurr = 15,
    Event = 16,
}

/// One outbound command, as a typed request. `CommandEncoder::encode`
/// packs it onto the wire using the session's configured widths and
/// endianness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Tells the target to reset.
    Reset,
    /// Requests a target-info record in reply.
    Info,
    /// A generic application command: an id plus up to three u32 params.
    Cmd { id: u8, p1: u32, p2: u32, p3: u32 },
    /// Reads target memory.
    Peek { addr: u32, len: u16, offset: u16 },
    /// Writes target memory.
    Poke {
        addr: u32,
        len: u16,
        offset: u16,
        data: Vec<u8>,
    },
    /// Fills target memory with a repeated byte.
    Fill {
        addr: u32,
        len: u16,
        offset: u16,
        byte: u8,
    },
    /// Begins a test fixture.
    TestSetup,
    /// Ends a test fixture.
    TestTeardown,
    /// Defines a probe point for the test fixture.
    TestProbeDef { addr: u32 },
    /// Resumes target execution during a test fixture.
    TestContinue,
    /// Requests a periodic clock tick at `rate`.
    Tick { rate: u8 },
    /// Sets the global trace filter bitmask (16 bytes, one bit per group).
    GlbFilter { mask: GroupFilter },
    /// Sets a local (per-kind) trace filter.
    LocFilter { kind: u8, obj: u32 },
    /// Sets the active-object filter.
    AoFilter { obj: u32 },
    /// Sets the "current object" pointer used by PEEK/POKE-relative
    /// commands.
    CurrObj { kind: u8, obj: u32 },
    /// Asks the target to echo back its current-object pointer.
    QueryCurr { kind: u8 },
    /// Injects an event directly into the target's dispatch queue.
    Event {
        prio: u8,
        sig: u16,
        params: Vec<u8>,
    },
}

impl Command {
    fn kind(&self) -> CommandKind {
        match self {
            Command::Reset => CommandKind::Reset,
            Command::Info => CommandKind::Info,
            Command::Cmd { .. } => CommandKind::Cmd,
            Command::Peek { .. } => CommandKind::Peek,
            Command::Poke { .. } => CommandKind::Poke,
            Command::Fill { .. } => CommandKind::Fill,
            Command::TestSetup => CommandKind::TestSetup,
            Command::TestTeardown => CommandKind::TestTeardown,
            Command::TestProbeDef { .. } => CommandKind::TestProbeDef,
            Command::TestContinue => CommandKind::TestContinue,
            Command::Tick { .. } => CommandKind::Tick,
            Command::GlbFilter { .. } => CommandKind::GlbFilter,
            Command::LocFilter { .. } => CommandKind::LocFilter,
            Command::AoFilter { .. } => CommandKind::AoFilter,
            Command::CurrObj { .. } => CommandKind::CurrObj,
            Command::QueryCurr { .. } => CommandKind::QueryCurr,
            Command::Event { .. } => CommandKind::Event,
        }
    }

    fn write_payload(&self, endianness: Endianness, out: &mut Vec<u8>) {
        let put_u16 = |out: &mut Vec<u8>, v: u16| {
            let mut b = [0u8; 2];
            match endianness {
                Endianness::Little => LittleEndian::write_u16(&mut b, v),
                Endianness::Big => BigEndian::write_u16(&mut b, v),
            }
            out.extend_from_slice(&b);
        };
        let put_u32 = |out: &mut Vec<u8>, v: u32| {
            let mut b = [0u8; 4];
            match endianness {
                Endianness::Little => LittleEndian::write_u32(&mut b, v),
                Endianness::Big => BigEndian::write_u32(&mut b, v),
            }
            out.extend_from_slice(&b);
        };

        match self {
            Command::Reset | Command::Info => {}
            Command::Cmd { id, p1, p2, p3 } => {
                out.push(*id);
                put_u32(out, *p1);
                put_u32(out, *p2);
                put_u32(out, *p3);
            }
            Command::Peek { addr, len, offset } => {
                put_u32(out, *addr);
                put_u16(out, *len);
                put_u16(out, *offset);
            }
            Command::Poke {
                addr,
                len,
                offset,
                data,
            } => {
                put_u32(out, *addr);
                put_u16(out, *len);
                put_u16(out, *offset);
                out.extend_from_slice(data);
            }
            Command::Fill {
                addr,
                len,
                offset,
                byte,
            } => {
                put_u32(out, *addr);
                put_u16(out, *len);
                put_u16(out, *offset);
                out.push(*byte);
            }
            Command::TestSetup | Command::TestTeardown | Command::TestContinue => {}
            Command::TestProbeDef { addr } => put_u32(out, *addr),
            Command::Tick { rate } => out.push(*rate),
            Command::GlbFilter { mask } => {
                let mut b = mask.bits().to_le_bytes();
                if endianness == Endianness::Big {
                    b.reverse();
                }
                out.extend_from_slice(&b);
            }
            Command::LocFilter { kind, obj } => {
                out.push(*kind);
                put_u32(out, *obj);
            }
            Command::AoFilter { obj } => put_u32(out, *obj),
            Command::CurrObj { kind, obj } => {
                out.push(*kind);
                put_u32(out, *obj);
            }
            Command::QueryCurr { kind } => out.push(*kind),
            Command::Event { prio, sig, params } => {
                out.push(*prio);
                put_u16(out, *sig);
                out.push(params.len() as u8);
                out.extend_from_slice(params);
            }
        }
    }
}

/// Builds outbound frames, maintaining an independent wrapping sequence
/// counter for the outbound direction.
#[derive(Debug, Default)]
pub struct CommandEncoder {
    next_seq: u8,
}

impl CommandEncoder {
    /// A fresh encoder, sequence counter starting at zero.
    pub fn new() -> Self {
        CommandEncoder { next_seq: 0 }
    }

    /// Encodes `cmd` into a wire-ready byte sequence: escape-encoded,
    /// checksummed, and terminated by the frame-end byte. Advances the
    /// outbound sequence counter.
    pub fn encode(&mut self, cmd: &Command, config: &Config) -> Vec<u8> {
        let mut payload = Vec::new();
        cmd.write_payload(config.endianness, &mut payload);
        self.encode_raw(cmd.kind() as u8, &payload)
    }

    /// Encodes a raw `(record_type, payload)` pair onto the wire, the same
    /// way [`CommandEncoder::encode`] does, without requiring a typed
    /// [`Command`]. Used for back-end-originated command requests (§4.7),
    /// where the front-end has already packed `payload` at the session's
    /// configured widths.
    pub fn encode_raw(&mut self, record_type: u8, payload: &[u8]) -> Vec<u8> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let mut frame = vec![record_type, seq];
        frame.extend_from_slice(payload);

        let sum: u8 = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        let checksum = 0xFFu8.wrapping_sub(sum);
        frame.push(checksum);

        let mut wire = Vec::with_capacity(frame.len() + 2);
        for b in frame {
            if b == FRAME_END || b == ESCAPE {
                wire.push(ESCAPE);
                wire.push(b ^ ESCAPE_XOR);
            } else {
                wire.push(b);
            }
        }
        wire.push(FRAME_END);
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{FrameEvent, Framer};

    fn decode_one(wire: &[u8]) -> FrameEvent {
        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(wire, |ev| got.push(ev));
        assert_eq!(got.len(), 1);
        got.into_iter().next().unwrap()
    }

    #[test]
    fn encoder_output_is_valid_checksummed_frame() {
        let mut enc = CommandEncoder::new();
        let wire = enc.encode(&Command::Reset, &Config::default());

        match decode_one(&wire) {
            FrameEvent::Frame(bytes) => {
                assert_eq!(bytes[0], CommandKind::Reset as u8);
                assert_eq!(bytes[1], 0);
            }
            FrameEvent::Dropped(reason) => panic!("unexpected drop: {reason}"),
        }
    }

    #[test]
    fn framer_is_encoder_inverse_for_tick() {
        let mut enc = CommandEncoder::new();
        let cmd = Command::Tick { rate: 7 };
        let wire = enc.encode(&cmd, &Config::default());

        match decode_one(&wire) {
            FrameEvent::Frame(bytes) => {
                assert_eq!(bytes, vec![CommandKind::Tick as u8, 0, 7]);
            }
            FrameEvent::Dropped(reason) => panic!("unexpected drop: {reason}"),
        }
    }

    #[test]
    fn sequence_counter_is_monotone_and_wraps() {
        let mut enc = CommandEncoder::new();
        let mut seqs = Vec::new();
        for _ in 0..=300u32 {
            let wire = enc.encode(&Command::Info, &Config::default());
            if let FrameEvent::Frame(bytes) = decode_one(&wire) {
                seqs.push(bytes[1]);
            }
        }
        assert_eq!(seqs[0], 0);
        assert_eq!(seqs[255], 255);
        assert_eq!(seqs[256], 0); // wraps mod 256
    }

    #[test]
    fn cmd_payload_round_trips_through_reader() {
        use crate::reader::RecordReader;

        let mut enc = CommandEncoder::new();
        let cmd = Command::Cmd {
            id: 9,
            p1: 1,
            p2: 2,
            p3: 3,
        };
        let wire = enc.encode(&cmd, &Config::default());

        let bytes = match decode_one(&wire) {
            FrameEvent::Frame(bytes) => bytes,
            FrameEvent::Dropped(reason) => panic!("unexpected drop: {reason}"),
        };

        let mut r = RecordReader::new(&bytes[2..], Config::default().endianness);
        assert_eq!(r.u8().unwrap(), 9);
        assert_eq!(r.u32().unwrap(), 1);
        assert_eq!(r.u32().unwrap(), 2);
        assert_eq!(r.u32().unwrap(), 3);
    }

    #[test]
    fn glb_filter_mask_round_trips() {
        let mut enc = CommandEncoder::new();
        let mask = GroupFilter::STATE_MACHINE | GroupFilter::ASSERTION;
        let wire = enc.encode(&Command::GlbFilter { mask }, &Config::default());

        let bytes = match decode_one(&wire) {
            FrameEvent::Frame(bytes) => bytes,
            FrameEvent::Dropped(reason) => panic!("unexpected drop: {reason}"),
        };
        let mut le = [0u8; 16];
        le.copy_from_slice(&bytes[2..18]);
        assert_eq!(u128::from_le_bytes(le), mask.bits());
    }

    #[test]
    fn encodes_big_endian_payload() {
        let mut config = Config::default();
        config.endianness = Endianness::Big;
        let mut enc = CommandEncoder::new();
        let wire = enc.encode(&Command::AoFilter { obj: 0x0102_0304 }, &config);

        let bytes = match decode_one(&wire) {
            FrameEvent::Frame(bytes) => bytes,
            FrameEvent::Dropped(reason) => panic!("unexpected drop: {reason}"),
        };
        assert_eq!(&bytes[2..6], &[0x01, 0x02, 0x03, 0x04]);
    }
}
