//! Error kinds for the Spy, per the propagation rules in the error handling
//! design: `Config`/`LinkOpen` abort startup, `LinkRead` terminates the
//! event loop, `LinkWrite`/`Frame`/`Parse`/`DictIO`/`SinkOpen` are logged
//! and the loop continues.

use thiserror::Error;

/// A generic Spy error.
#[derive(Error, Debug)]
pub enum SpyError {
    /// A CLI flag or a width override was invalid, or two link flags
    /// conflicted.
    #[error("configuration error: {0}")]
    Config(String),

    /// The target link or back-end socket failed to open.
    #[error("failed to open link: {0}")]
    LinkOpen(String),

    /// A read from the target link failed. Fatal: terminates the event loop.
    #[error("link read error: {0}")]
    LinkRead(#[from] std::io::Error),

    /// A write to the target link failed. Logged, not fatal.
    #[error("link write error: {0}")]
    LinkWrite(#[source] std::io::Error),

    /// A frame failed checksum validation, contained a dangling escape, or
    /// exceeded the payload cap.
    #[error("frame error: {0}")]
    Frame(String),

    /// A well-framed record could not be parsed (truncated or malformed).
    #[error("parse error: {0}")]
    Parse(String),

    /// The dictionary file could not be read or written.
    #[error("dictionary I/O error: {0}")]
    DictIo(#[source] std::io::Error),

    /// A sink (text/binary/Matlab/sequence file) failed to open.
    #[error("failed to open sink: {0}")]
    SinkOpen(#[source] std::io::Error),
}
