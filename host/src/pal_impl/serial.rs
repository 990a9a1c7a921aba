//! `-c` link: a serial connection to the target, read with a short
//! configurable timeout so [`Pal::next_event`]'s bounded-timeout contract
//! holds even though `serialport` itself blocks on read.

use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use tracespy::error::SpyError;
use tracespy::pal::{Pal, PalEvent};

use crate::backend_socket::FrontEndSocket;
use crate::pal_impl::stdin::StdinReader;

/// Target link over a serial device (`/dev/ttyS0`, `COM1`, ...).
pub struct SerialPal {
    device: String,
    baud: u32,
    backend_port: Option<u16>,
    port: Option<Box<dyn serialport::SerialPort>>,
    stdin: Option<StdinReader>,
    front_end: Option<FrontEndSocket>,
}

impl SerialPal {
    pub fn new(device: String, baud: u32, backend_port: Option<u16>) -> Self {
        SerialPal {
            device,
            baud,
            backend_port,
            port: None,
            stdin: None,
            front_end: None,
        }
    }
}

impl Pal for SerialPal {
    fn open(&mut self) -> Result<(), SpyError> {
        let port = serialport::new(&self.device, self.baud)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| SpyError::LinkOpen(format!("{}: {e}", self.device)))?;
        self.port = Some(port);
        self.stdin = Some(StdinReader::spawn());
        if let Some(port) = self.backend_port {
            self.front_end = Some(FrontEndSocket::bind(port)?);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.port = None;
        self.front_end = None;
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
        if let Some(fe) = &self.front_end {
            if let Some((n, addr)) = fe.try_recv(front_end_buf) {
                return PalEvent::FrontEndBytes(n, addr);
            }
        }

        let Some(port) = &mut self.port else {
            return PalEvent::Error(SpyError::LinkOpen("serial port not open".into()));
        };
        if let Err(e) = port.set_timeout(timeout) {
            return PalEvent::Error(SpyError::LinkRead(e));
        }
        match port.read(target_buf) {
            Ok(0) => PalEvent::NoEvent,
            Ok(n) => PalEvent::TargetBytes(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                PalEvent::NoEvent
            }
            Err(e) => PalEvent::Error(SpyError::LinkRead(e)),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SpyError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| SpyError::LinkOpen("serial port not open".into()))?;
        port.write_all(bytes).map_err(SpyError::LinkWrite)
    }

    fn send_front_end(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError> {
        match &self.front_end {
            Some(fe) => fe.send_to(addr, bytes),
            None => Ok(()),
        }
    }
}
