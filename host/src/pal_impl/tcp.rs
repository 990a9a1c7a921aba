//! `-t` link: the Spy listens on a TCP port and the target dials in, the
//! same topology the real QS host-side tooling uses. A single `mio::Poll`
//! multiplexes the listener/stream and (since this PAL is already set up
//! for `mio`) the back-end UDP socket too, rather than the short-timeout
//! polling `serial`/`file` fall back to.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token};

use tracespy::error::SpyError;
use tracespy::pal::{Pal, PalEvent};

use crate::pal_impl::stdin::StdinReader;

const LISTENER: Token = Token(0);
const STREAM: Token = Token(1);
const FRONT_END: Token = Token(2);

/// Target link that accepts one inbound TCP connection from the target.
pub struct TcpPal {
    port: u16,
    backend_port: Option<u16>,
    poll: Option<Poll>,
    events: Events,
    listener: Option<TcpListener>,
    stream: Option<TcpStream>,
    front_end: Option<UdpSocket>,
    stdin: Option<StdinReader>,
}

impl TcpPal {
    pub fn new(port: u16, backend_port: Option<u16>) -> Self {
        TcpPal {
            port,
            backend_port,
            poll: None,
            events: Events::with_capacity(16),
            listener: None,
            stream: None,
            front_end: None,
            stdin: None,
        }
    }

    fn accept_if_pending(&mut self) -> Result<(), SpyError> {
        let Some(listener) = &self.listener else {
            return Ok(());
        };
        match listener.accept() {
            Ok((mut stream, _peer)) => {
                if let Some(poll) = &self.poll {
                    poll.registry()
                        .register(&mut stream, STREAM, Interest::READABLE)
                        .map_err(|e| SpyError::LinkOpen(e.to_string()))?;
                }
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(SpyError::LinkOpen(e.to_string())),
        }
    }
}

impl Pal for TcpPal {
    fn open(&mut self) -> Result<(), SpyError> {
        let poll = Poll::new().map_err(|e| SpyError::LinkOpen(e.to_string()))?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let mut listener =
            TcpListener::bind(addr).map_err(|e| SpyError::LinkOpen(e.to_string()))?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(|e| SpyError::LinkOpen(e.to_string()))?;
        self.listener = Some(listener);

        if let Some(backend_port) = self.backend_port {
            let fe_addr = SocketAddr::from(([0, 0, 0, 0], backend_port));
            let mut fe =
                UdpSocket::bind(fe_addr).map_err(|e| SpyError::LinkOpen(e.to_string()))?;
            poll.registry()
                .register(&mut fe, FRONT_END, Interest::READABLE)
                .map_err(|e| SpyError::LinkOpen(e.to_string()))?;
            self.front_end = Some(fe);
        }

        self.poll = Some(poll);
        self.stdin = Some(StdinReader::spawn());
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
        self.listener = None;
        self.front_end = None;
        self.poll = None;
        self.stdin = None;
    }

    fn next_event(
        &mut self,
        timeout: Duration,
        target_buf: &mut [u8],
        front_end_buf: &mut [u8],
    ) -> PalEvent {
        if let Some(stdin) = &self.stdin {
            if let Some(b) = stdin.try_recv() {
                return PalEvent::Keystroke(b);
            }
        }

        let Some(poll) = &mut self.poll else {
            return PalEvent::Error(SpyError::LinkOpen("tcp link not open".into()));
        };
        if let Err(e) = poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() == io::ErrorKind::Interrupted {
                return PalEvent::NoEvent;
            }
            return PalEvent::Error(SpyError::LinkRead(e));
        }

        let mut saw_listener = false;
        let mut stream_event = false;
        let mut front_end_event = false;
        for event in self.events.iter() {
            match event.token() {
                LISTENER => saw_listener = true,
                STREAM => stream_event = true,
                FRONT_END => front_end_event = true,
                _ => {}
            }
        }

        if saw_listener {
            if let Err(e) = self.accept_if_pending() {
                return PalEvent::Error(e);
            }
        }

        if stream_event {
            if let Some(stream) = &mut self.stream {
                match stream.read(target_buf) {
                    Ok(0) => return PalEvent::Done,
                    Ok(n) => return PalEvent::TargetBytes(n),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return PalEvent::Error(SpyError::LinkRead(e)),
                }
            }
        }

        if front_end_event {
            if let Some(fe) = &self.front_end {
                match fe.recv_from(front_end_buf) {
                    Ok((n, addr)) => return PalEvent::FrontEndBytes(n, addr),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(_) => {}
                }
            }
        }

        PalEvent::NoEvent
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SpyError> {
        match &mut self.stream {
            Some(stream) => stream.write_all(bytes).map_err(SpyError::LinkWrite),
            None => Ok(()),
        }
    }

    fn send_front_end(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError> {
        match &self.front_end {
            Some(fe) => fe.send_to(bytes, addr).map(|_| ()).map_err(SpyError::LinkWrite),
            None => Ok(()),
        }
    }
}
