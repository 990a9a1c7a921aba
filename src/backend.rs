//! Parses the UDP datagram protocol spoken by front-end clients (§4.7) and
//! tracks the single attached client. Datagram I/O itself belongs to
//! `tracespy-host`; this module only turns bytes into typed requests and
//! typed requests back into bytes, so it is unit-testable without a socket.

use std::net::SocketAddr;

use log::warn;

use crate::error::SpyError;
use crate::line::{DecodedLine, LineKind};

/// The channel selector in byte 0 of every datagram.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    Attach = 0,
    Detach = 1,
    KeepAlive = 2,
    Command = 3,
    DictRead = 4,
    DictWrite = 5,
    ScreenText = 6,
}

impl Channel {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Channel::Attach),
            1 => Some(Channel::Detach),
            2 => Some(Channel::KeepAlive),
            3 => Some(Channel::Command),
            4 => Some(Channel::DictRead),
            5 => Some(Channel::DictWrite),
            6 => Some(Channel::ScreenText),
            _ => None,
        }
    }
}

/// A parsed inbound datagram, independent of which address sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackEndRequest {
    /// Registers the sender as the attached front-end.
    Attach,
    /// Un-registers the sender, if it was attached.
    Detach,
    /// A liveness probe; answered with version/status.
    KeepAlive,
    /// Asks the Spy to send a command frame to the target. `record_type`
    /// plus `payload` are handed to [`crate::encoder::CommandEncoder`]
    /// verbatim; the front-end is responsible for packing `payload` at the
    /// session's configured widths.
    Command { record_type: u8, payload: Vec<u8> },
    /// Asks for the current dictionary state, serialized as text.
    DictRead,
    /// Merges dictionary entries (in the same text format `DictRead`
    /// returns) into the running dictionaries.
    DictWrite { text: String },
    /// A line of text for the Spy to log on the front-end's behalf.
    ScreenText { text: String },
}

/// One parsed datagram: its sequence byte (independent of the frame
/// sequence counter in §3/§4.1) alongside the typed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// The datagram's own sequence byte. Datagrams are independent and
    /// unordered (§6), so this is informational only.
    pub seq: u8,
    /// The parsed request.
    pub request: BackEndRequest,
}

/// Parses one UDP datagram's payload into a typed request.
pub fn parse_datagram(bytes: &[u8]) -> Result<Datagram, SpyError> {
    if bytes.len() < 2 {
        return Err(SpyError::Parse("datagram shorter than channel+seq".into()));
    }

    let channel = Channel::from_byte(bytes[0])
        .ok_or_else(|| SpyError::Parse(format!("unknown back-end channel {}", bytes[0])))?;
    let seq = bytes[1];
    let payload = &bytes[2..];

    let request = match channel {
        Channel::Attach => BackEndRequest::Attach,
        Channel::Detach => BackEndRequest::Detach,
        Channel::KeepAlive => BackEndRequest::KeepAlive,
        Channel::Command => {
            if payload.is_empty() {
                return Err(SpyError::Parse("command datagram missing record type".into()));
            }
            BackEndRequest::Command {
                record_type: payload[0],
                payload: payload[1..].to_vec(),
            }
        }
        Channel::DictRead => BackEndRequest::DictRead,
        Channel::DictWrite => BackEndRequest::DictWrite {
            text: lossy_ascii(payload),
        },
        Channel::ScreenText => BackEndRequest::ScreenText {
            text: lossy_ascii(payload),
        },
    };

    Ok(Datagram { seq, request })
}

fn lossy_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

/// Encodes a response datagram: channel byte, outbound seq byte, payload.
pub fn encode_datagram(channel: Channel, seq: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + payload.len());
    out.push(channel as u8);
    out.push(seq);
    out.extend_from_slice(payload);
    out
}

/// Tracks the single attached front-end client and builds the datagrams
/// the Spy sends back. At most one client is attached at a time; a second
/// attach replaces the first with a WARN, per §4.7.
#[derive(Debug)]
pub struct BackEnd {
    attached: Option<SocketAddr>,
    out_seq: u8,
    forwarding_enabled: bool,
}

impl Default for BackEnd {
    fn default() -> Self {
        BackEnd {
            attached: None,
            out_seq: 0,
            forwarding_enabled: true,
        }
    }
}

impl BackEnd {
    /// A BackEnd with no attached client and forwarding enabled.
    pub fn new() -> Self {
        BackEnd::default()
    }

    /// `b` keystroke: toggles whether decoded lines are forwarded to the
    /// attached client at all. Independent of the UDP socket itself, which
    /// `tracespy-host` keeps open regardless so attach/detach/keep-alive
    /// keep working.
    pub fn toggle_forwarding(&mut self) {
        self.forwarding_enabled = !self.forwarding_enabled;
    }

    /// Whether line forwarding is currently enabled.
    pub fn forwarding_enabled(&self) -> bool {
        self.forwarding_enabled
    }

    /// The currently attached client, if any.
    pub fn attached(&self) -> Option<SocketAddr> {
        self.attached
    }

    /// Registers `from` as the attached client, replacing any previous one.
    pub fn attach(&mut self, from: SocketAddr) {
        if let Some(prev) = self.attached {
            if prev != from {
                warn!("front-end {prev} replaced by {from}");
            }
        }
        self.attached = Some(from);
    }

    /// Un-registers `from`, if it is the attached client. Detach requests
    /// from any other address are ignored.
    pub fn detach(&mut self, from: SocketAddr) {
        if self.attached == Some(from) {
            self.attached = None;
        }
    }

    /// Builds the next outbound datagram on the given channel, consuming
    /// one tick of the outbound sequence counter.
    fn next_datagram(&mut self, channel: Channel, payload: &[u8]) -> Vec<u8> {
        let seq = self.out_seq;
        self.out_seq = self.out_seq.wrapping_add(1);
        encode_datagram(channel, seq, payload)
    }

    /// Builds the keep-alive reply datagram.
    pub fn keep_alive_reply(&mut self, protocol_version: u16) -> Vec<u8> {
        self.next_datagram(Channel::KeepAlive, &protocol_version.to_le_bytes())
    }

    /// Builds a dictionary-read reply datagram carrying the serialized text.
    pub fn dict_read_reply(&mut self, text: &str) -> Vec<u8> {
        self.next_datagram(Channel::DictRead, text.as_bytes())
    }

    /// Builds the screen-text datagram forwarding one decoded line to the
    /// attached client, unless it is an INF line (never forwarded, per
    /// §4.7/§4.5) or there is no attached client.
    pub fn forward_line(&mut self, line: &DecodedLine) -> Option<Vec<u8>> {
        if self.attached.is_none() || !self.forwarding_enabled || line.kind == LineKind::Inf {
            return None;
        }
        Some(self.next_datagram(Channel::ScreenText, line.text.as_bytes()))
    }
}
