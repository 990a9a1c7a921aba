//! Splits an incoming byte stream into complete frames.
//!
//! Wire framing: a frame is terminated by a literal `0x00` byte. Within a
//! frame, `0x7D` escapes the following byte by XORing it with `0x20`, so
//! that neither `0x00` nor `0x7D` ever appears raw in the payload. The last
//! decoded byte of every frame is a checksum: the unsigned 8-bit sum of all
//! decoded bytes (type through checksum) must equal `0xFF`.

use log::warn;

const FRAME_END: u8 = 0x00;
const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;

/// Minimum number of decoded bytes in a frame: type, seq, checksum.
pub const MIN_FRAME_LEN: usize = 3;

/// Upper bound on a decoded frame's payload, to keep a noisy link from
/// growing the internal buffer without bound.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum State {
    Normal,
    Escaped,
}

/// Decodes a byte stream into complete, checksum-validated frames.
///
/// `feed` is the only entry point that advances the state machine;
/// `reset` discards any partial frame, for use when the underlying link is
/// reopened.
#[derive(Debug)]
pub struct Framer {
    state: State,
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

/// The outcome of decoding one complete frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame with a valid checksum; `bytes` excludes the trailing
    /// checksum byte.
    Frame(Vec<u8>),
    /// A frame was discarded: bad checksum, too short, dangling escape, or
    /// over the payload cap. `reason` is suitable for a WARN line.
    Dropped(String),
}

impl Framer {
    /// Creates a Framer with the given payload cap.
    pub fn new(max_frame_len: usize) -> Self {
        Framer {
            state: State::Normal,
            buf: Vec::new(),
            max_frame_len,
        }
    }

    /// Discards any buffered partial frame. Called on link re-open.
    pub fn reset(&mut self) {
        self.state = State::Normal;
        self.buf.clear();
    }

    /// Feeds raw bytes from the link into the decoder, invoking `on_frame`
    /// once per complete frame (valid or dropped) found in `bytes`.
    pub fn feed(&mut self, bytes: &[u8], mut on_frame: impl FnMut(FrameEvent)) {
        for &b in bytes {
            match self.state {
                State::Normal => match b {
                    ESCAPE => self.state = State::Escaped,
                    FRAME_END => {
                        let frame = std::mem::take(&mut self.buf);
                        on_frame(Self::finish(frame));
                    }
                    other => self.push(other, &mut on_frame),
                },
                State::Escaped => {
                    if b == FRAME_END {
                        // Dangling escape right before the frame terminator:
                        // an anomaly. Drop the partial frame and resync.
                        warn!("dangling escape before frame end, resyncing");
                        self.buf.clear();
                        self.state = State::Normal;
                        on_frame(FrameEvent::Dropped(
                            "dangling escape before frame end".into(),
                        ));
                    } else {
                        self.push(b ^ ESCAPE_XOR, &mut on_frame);
                        self.state = State::Normal;
                    }
                }
            }
        }
    }

    fn push(&mut self, b: u8, on_frame: &mut impl FnMut(FrameEvent)) {
        if self.buf.len() >= self.max_frame_len {
            warn!("frame exceeds {} bytes, resyncing", self.max_frame_len);
            self.buf.clear();
            self.state = State::Normal;
            on_frame(FrameEvent::Dropped(format!(
                "frame exceeds {} bytes",
                self.max_frame_len
            )));
            return;
        }

        self.buf.push(b);
    }

    fn finish(mut frame: Vec<u8>) -> FrameEvent {
        if frame.len() < MIN_FRAME_LEN {
            return FrameEvent::Dropped(format!(
                "frame too short: {} byte(s), need at least {MIN_FRAME_LEN}",
                frame.len()
            ));
        }

        let sum: u8 = frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        if sum != 0xFF {
            let seq = frame.get(1).copied().unwrap_or(0);
            let ty = frame.first().copied().unwrap_or(0);
            return FrameEvent::Dropped(format!("Bad checksum at seq={seq} type={ty}"));
        }

        frame.pop(); // drop the checksum byte; callers only want the payload
        FrameEvent::Frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let chk = (0xFFu8).wrapping_sub(payload.iter().fold(0u8, |a, &b| a.wrapping_add(b)));
        let mut full = payload.to_vec();
        full.push(chk);

        let mut wire = Vec::new();
        for &b in &full {
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

    #[test]
    fn decodes_single_frame() {
        let payload = [0x26u8, 0x00, 0x64, 0x00];
        let wire = framed(&payload);

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));

        assert_eq!(got, vec![FrameEvent::Frame(payload.to_vec())]);
    }

    #[test]
    fn escape_of_escape_and_frame_end() {
        let payload = [0x00u8, 0x7D, 0x01];
        let wire = framed(&payload);

        // byte-exact check of the escaping itself, independent of checksum math
        let chk = (0xFFu8).wrapping_sub(payload.iter().fold(0u8, |a, &b| a.wrapping_add(b)));
        assert_eq!(
            wire,
            vec![0x7D, 0x20, 0x7D, 0x5D, 0x01, chk, FRAME_END]
        );

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));
        assert_eq!(got, vec![FrameEvent::Frame(payload.to_vec())]);
    }

    #[test_log::test]
    fn bad_checksum_is_dropped() {
        use assert_matches::assert_matches;

        let payload = [0x01u8, 0x02, 0x03];
        let mut wire = framed(&payload);
        // Corrupt the checksum byte (second to last, before FRAME_END).
        let idx = wire.len() - 2;
        wire[idx] ^= 0x01;

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));

        assert_eq!(got.len(), 1);
        assert_matches!(&got[0], FrameEvent::Dropped(msg) if msg.contains("Bad checksum"));
    }

    #[test]
    fn minimum_length_frame_is_accepted() {
        let payload = [0x01u8, 0x02]; // + checksum = 3 decoded bytes
        let wire = framed(&payload);

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));

        assert_eq!(got, vec![FrameEvent::Frame(payload.to_vec())]);
    }

    #[test]
    fn too_short_frame_is_dropped() {
        // Only a single decoded byte before FRAME_END.
        let wire = vec![0x42, FRAME_END];

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));

        assert_eq!(got.len(), 1);
        assert!(matches!(&got[0], FrameEvent::Dropped(msg) if msg.contains("too short")));
    }

    #[test_log::test]
    fn dangling_escape_resyncs() {
        // Escape immediately followed by frame end: anomaly, then a clean
        // frame afterwards should still decode.
        let mut wire = vec![0x01, 0x02, ESCAPE, FRAME_END];
        let payload = [0x01u8, 0x02, 0x03];
        wire.extend(framed(&payload));

        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));

        assert_eq!(got.len(), 2);
        assert!(matches!(&got[0], FrameEvent::Dropped(_)));
        assert_eq!(got[1], FrameEvent::Frame(payload.to_vec()));
    }

    #[test_log::test]
    fn overflow_is_treated_as_anomaly() {
        let mut framer = Framer::new(4);
        let mut wire = vec![0u8; 10];
        wire.push(FRAME_END);
        // Make sure none of the filler bytes are FRAME_END/ESCAPE themselves.
        for b in wire.iter_mut().take(10) {
            *b = 0x41;
        }

        let mut got = Vec::new();
        framer.feed(&wire, |ev| got.push(ev));
        assert!(got.iter().any(|ev| matches!(ev, FrameEvent::Dropped(msg) if msg.contains("exceeds"))));
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut framer = Framer::default();
        let mut got = Vec::new();
        framer.feed(&[0x01, 0x02, 0x03], |ev| got.push(ev));
        assert!(got.is_empty());

        framer.reset();
        assert!(framer.buf.is_empty());
    }

    #[test]
    fn fuzz_never_panics() {
        use rand::RngCore;
        let mut rng = rand::rng();
        let mut framer = Framer::default();

        for _ in 0..200 {
            let len = (rng.next_u32() % 64) as usize;
            let mut bytes = vec![0u8; len];
            rng.fill_bytes(&mut bytes);
            framer.feed(&bytes, |_| {});
        }
    }
}
