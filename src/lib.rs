//! A host-side decoder for a framed binary trace stream emitted by an
//! instrumented embedded target.
//!
//! The target emits a compact, self-delimited binary record format over a
//! serial link, a TCP socket, or a replay file. This crate turns that byte
//! stream into human-readable trace lines and a handful of machine-readable
//! side channels (a binary capture, a Matlab-friendly numeric log, and a
//! sequence-diagram log), while maintaining dictionaries that translate
//! numeric identifiers — object pointers, function pointers, signals, user
//! record ids — into symbolic names.
//!
//! The actual transport (serial/TCP/file sockets, a keystroke source) is
//! left to a [`pal::Pal`] implementation; this crate only depends on the
//! trait. See the `tracespy-host` binary for concrete implementations.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod backend;
pub mod commander;
pub mod config;
pub mod dict;
pub mod encoder;
pub mod error;
pub mod event_loop;
pub mod framer;
pub mod interpreter;
pub mod line;
pub mod pal;
pub mod reader;
pub mod record;
pub mod router;

pub use config::{Config, Endianness, Width, WidthField};
pub use error::SpyError;
