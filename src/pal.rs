//! The trait boundary between the decode/dispatch engine and the concrete
//! transport. Serial/TCP/file sockets and keystroke input are all just
//! "a Platform Abstraction Layer collaborator with a fixed operation set";
//! this module is that fixed operation set, modeled as a capability trait
//! rather than a vtable of function pointers.
//!
//! `tracespy-host` supplies the concrete implementations; this crate only
//! ever sees [`Pal`] and [`PalEvent`].

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::SpyError;

/// One event returned by a single call to [`Pal::next_event`]. The event
/// loop never blocks anywhere else, so every suspension point in the whole
/// program is inside this call.
#[derive(Debug)]
pub enum PalEvent {
    /// The timeout elapsed with nothing to report.
    NoEvent,
    /// `n` bytes were read from the target link into the caller-supplied
    /// buffer.
    TargetBytes(usize),
    /// `n` bytes were read from the front-end (back-end UDP) socket into
    /// the caller-supplied front-end buffer, from `addr`.
    FrontEndBytes(usize, SocketAddr),
    /// One keystroke was read from the controlling terminal.
    Keystroke(u8),
    /// A clean shutdown was requested (SIGINT, terminal close, EOF on a
    /// replay file).
    Done,
    /// An unrecoverable error; the event loop exits with code 1.
    Error(SpyError),
}

/// The platform abstraction layer: opens/closes the target link and the
/// front-end socket, and presents a single synchronous, bounded-timeout
/// `next_event` that the event loop polls in a tight loop.
///
/// Implementations are free to use OS I/O multiplexing (`mio`, `select`)
/// internally, so long as `next_event` returns exactly one logical event
/// per call and never blocks past `timeout`.
pub trait Pal {
    /// Opens the target link (and, if applicable, the front-end socket).
    /// Failure here is `SpyError::LinkOpen` and aborts startup.
    fn open(&mut self) -> Result<(), SpyError>;

    /// Closes every handle this PAL owns. Idempotent.
    fn close(&mut self);

    /// Blocks for at most `timeout` waiting for the next logical event.
    /// `target_buf`/`front_end_buf` are filled in place by the
    /// corresponding `TargetBytes`/`FrontEndBytes` variants; callers read
    /// the reported byte count back out of the same buffer they passed in.
    fn next_event(
        &mut self,
        timeout: Duration,
        target_buf: &mut [u8],
        front_end_buf: &mut [u8],
    ) -> PalEvent;

    /// Sends a fully-encoded frame to the target link.
    fn send(&mut self, bytes: &[u8]) -> Result<(), SpyError>;

    /// Sends a datagram back to a front-end client previously observed via
    /// `FrontEndBytes`. Not modeled as a suspension point (§5): UDP sends
    /// are non-blocking in practice, unlike the target link's `send`.
    fn send_front_end(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError>;
}

impl Pal for Box<dyn Pal> {
    fn open(&mut self) -> Result<(), SpyError> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn next_event(
        &mut self,
        timeout: Duration,
        target_buf: &mut [u8],
        front_end_buf: &mut [u8],
    ) -> PalEvent {
        (**self).next_event(timeout, target_buf, front_end_buf)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SpyError> {
        (**self).send(bytes)
    }

    fn send_front_end(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError> {
        (**self).send_front_end(addr, bytes)
    }
}
