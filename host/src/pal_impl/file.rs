//! `-f` link: replays a previously captured binary file as if it were a
//! live target link. EOF is reported as [`PalEvent::Done`], matching a
//! clean link close (§4.8).

use std::fs::File;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracespy::error::SpyError;
use tracespy::pal::{Pal, PalEvent};

use crate::backend_socket::FrontEndSocket;
use crate::pal_impl::stdin::StdinReader;

/// Target link that replays `path` instead of a live target.
pub struct FilePal {
    path: PathBuf,
    backend_port: Option<u16>,
    file: Option<File>,
    stdin: Option<StdinReader>,
    front_end: Option<FrontEndSocket>,
}

impl FilePal {
    pub fn new(path: PathBuf, backend_port: Option<u16>) -> Self {
        FilePal {
            path,
            backend_port,
            file: None,
            stdin: None,
            front_end: None,
        }
    }
}

impl Pal for FilePal {
    fn open(&mut self) -> Result<(), SpyError> {
        let file = File::open(&self.path)
            .map_err(|e| SpyError::LinkOpen(format!("{}: {e}", self.path.display())))?;
        self.file = Some(file);
        self.stdin = Some(StdinReader::spawn());
        if let Some(port) = self.backend_port {
            self.front_end = Some(FrontEndSocket::bind(port)?);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
        self.front_end = None;
        self.stdin = None;
    }

    fn next_event(
        &mut self,
        _timeout: Duration,
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

        let Some(file) = &mut self.file else {
            return PalEvent::Error(SpyError::LinkOpen("replay file not open".into()));
        };
        match file.read(target_buf) {
            Ok(0) => PalEvent::Done,
            Ok(n) => PalEvent::TargetBytes(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => PalEvent::NoEvent,
            Err(e) => PalEvent::Error(SpyError::LinkRead(e)),
        }
    }

    fn send(&mut self, _bytes: &[u8]) -> Result<(), SpyError> {
        // A replay file has no live target to write back to; outbound
        // commands are accepted and silently dropped.
        Ok(())
    }

    fn send_front_end(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SpyError> {
        match &self.front_end {
            Some(fe) => fe.send_to(addr, bytes),
            None => Ok(()),
        }
    }
}
