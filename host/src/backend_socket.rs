//! Owns the real back-end UDP socket (§4.7) for the [`crate::pal_impl::serial::SerialPal`]
//! and [`crate::pal_impl::file::FilePal`] transports, which do not otherwise
//! need `mio`. [`crate::pal_impl::tcp::TcpPal`] registers its own
//! `mio::net::UdpSocket` instead, since it is already multiplexing with
//! `mio::Poll`.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracespy::error::SpyError;

/// A non-blocking UDP socket polled with a short read timeout on every
/// `next_event` call, rather than registered with an event-notification
/// mechanism.
pub struct FrontEndSocket {
    socket: UdpSocket,
}

impl FrontEndSocket {
    pub fn bind(port: u16) -> Result<Self, SpyError> {
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port)))
            .map_err(|e| SpyError::LinkOpen(e.to_string()))?;
        socket
            .set_read_timeout(Some(Duration::from_millis(1)))
            .map_err(|e| SpyError::LinkOpen(e.to_string()))?;
        Ok(FrontEndSocket { socket })
    }

    /// Attempts to read one datagram without blocking past the socket's
    /// configured read timeout. `Ok(None)` means nothing arrived in time.
    pub fn try_recv(&self, buf: &mut [u8]) -> Option<(usize, SocketAddr)> {
        match self.socket.recv_from(buf) {
            Ok((n, from)) => Some((n, from)),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                None
            }
            Err(_) => None,
        }
    }

    pub fn send_to(&self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError> {
        self.socket
            .send_to(bytes, addr)
            .map(|_| ())
            .map_err(SpyError::LinkWrite)
    }
}
