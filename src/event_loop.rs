//! The single-threaded dispatcher: pumps [`Pal::next_event`] and routes
//! whatever comes back to the Framer/Interpreter/OutputRouter/BackEnd/
//! Commander, per §4.8. The only mutator of dictionaries, sinks, and
//! counters; see §5 for the concurrency model this relies on.

use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use log::{error, warn};

use crate::backend::{BackEnd, BackEndRequest};
use crate::commander::{self, Action, SinkKind};
use crate::encoder::{Command, CommandEncoder};
use crate::error::SpyError;
use crate::framer::{FrameEvent, Framer};
use crate::interpreter::Interpreter;
use crate::line::{DecodedLine, LineKind};
use crate::pal::{Pal, PalEvent};
use crate::router::OutputRouter;

const TARGET_BUF_LEN: usize = 4096;
const FRONT_END_BUF_LEN: usize = 2048;

/// Paths remembered so the `o/s/b/m/g` keystroke can reopen a sink the
/// CLI originally asked for, after it's been toggled closed.
#[derive(Debug, Clone, Default)]
pub struct SinkPaths {
    /// Path for the text output sink (`o`).
    pub text: Option<PathBuf>,
    /// Path for the binary capture sink (`s`).
    pub binary: Option<PathBuf>,
    /// Path for the Matlab sink (`m`).
    pub matlab: Option<PathBuf>,
    /// Path for the sequence-diagram sink (`g`).
    pub sequence: Option<PathBuf>,
    /// Path dictionaries are persisted to on the `d` keystroke.
    pub dict: Option<PathBuf>,
}

/// Owns every long-lived piece of state and runs the event loop.
pub struct EventLoop<P: Pal> {
    pal: P,
    framer: Framer,
    interpreter: Interpreter,
    router: OutputRouter,
    encoder: CommandEncoder,
    backend: BackEnd,
    paths: SinkPaths,
    target_buf: Vec<u8>,
    front_end_buf: Vec<u8>,
}

impl<P: Pal> EventLoop<P> {
    /// Builds an event loop from its already-constructed parts. Sinks the
    /// CLI asked to be open at startup are expected to already be open on
    /// `router`; `paths` only needs to hold what a later keystroke should
    /// reopen.
    pub fn new(
        pal: P,
        interpreter: Interpreter,
        router: OutputRouter,
        backend: BackEnd,
        paths: SinkPaths,
    ) -> Self {
        EventLoop {
            pal,
            framer: Framer::default(),
            interpreter,
            router,
            encoder: CommandEncoder::new(),
            backend,
            paths,
            target_buf: vec![0u8; TARGET_BUF_LEN],
            front_end_buf: vec![0u8; FRONT_END_BUF_LEN],
        }
    }

    /// Runs until a terminal condition, draining open sinks before
    /// returning. Returns the process exit code (§6): 0 on a clean `Done`
    /// or quit keystroke, 1 on `Error`.
    pub fn run(&mut self) -> i32 {
        if let Err(e) = self.pal.open() {
            error!("failed to open link: {e}");
            return 1;
        }

        let code = loop {
            match self.pal.next_event(
                Duration::from_millis(100),
                &mut self.target_buf,
                &mut self.front_end_buf,
            ) {
                PalEvent::NoEvent => continue,
                PalEvent::TargetBytes(n) => {
                    let bytes = self.target_buf[..n].to_vec();
                    self.handle_target_bytes(&bytes);
                }
                PalEvent::FrontEndBytes(n, addr) => {
                    let bytes = self.front_end_buf[..n].to_vec();
                    self.handle_front_end_bytes(&bytes, addr);
                }
                PalEvent::Keystroke(b) => {
                    if let Some(code) = self.handle_keystroke(b) {
                        break code;
                    }
                }
                PalEvent::Done => break 0,
                PalEvent::Error(e) => {
                    error!("fatal link error: {e}");
                    break 1;
                }
            }
        };

        self.framer.reset();
        self.router.close_all();
        self.pal.close();
        code
    }

    fn emit(&mut self, line: DecodedLine) {
        self.router.route(&line);
        if let Some(dg) = self.backend.forward_line(&line) {
            if let Some(addr) = self.backend.attached() {
                if let Err(e) = self.pal.send_front_end(addr, &dg) {
                    warn!("front-end send failed: {e}");
                }
            }
        }
    }

    fn handle_target_bytes(&mut self, bytes: &[u8]) {
        self.router.capture_raw_frame(bytes);

        let mut frames = Vec::new();
        self.framer.feed(bytes, |ev| frames.push(ev));

        for ev in frames {
            match ev {
                FrameEvent::Dropped(reason) => {
                    self.emit(DecodedLine::new(LineKind::Warn, reason));
                }
                FrameEvent::Frame(frame) => match self.interpreter.process(&frame) {
                    Ok((seq_warning, interpreted)) => {
                        if let Some(warning) = seq_warning {
                            self.emit(warning);
                        }
                        if let Some(row) = &interpreted.matlab_row {
                            self.router.write_matlab_row(row);
                        }
                        if let Some(seq_line) = &interpreted.sequence_line {
                            self.router.write_sequence_line(seq_line);
                        }
                        self.emit(interpreted.line);
                    }
                    Err(e) => {
                        self.emit(DecodedLine::new(LineKind::Warn, e.to_string()));
                    }
                },
            }
        }
    }

    fn handle_front_end_bytes(&mut self, bytes: &[u8], addr: std::net::SocketAddr) {
        let dg = match crate::backend::parse_datagram(bytes) {
            Ok(dg) => dg,
            Err(e) => {
                warn!("malformed back-end datagram from {addr}: {e}");
                return;
            }
        };

        match dg.request {
            BackEndRequest::Attach => self.backend.attach(addr),
            BackEndRequest::Detach => self.backend.detach(addr),
            BackEndRequest::KeepAlive => {
                let reply = self
                    .backend
                    .keep_alive_reply(self.interpreter.config().protocol_version);
                if let Err(e) = self.pal.send_front_end(addr, &reply) {
                    error!("front-end send failed: {e}");
                }
            }
            BackEndRequest::Command {
                record_type,
                payload,
            } => {
                let frame = self.encoder.encode_raw(record_type, &payload);
                if let Err(e) = self.pal.send(&frame) {
                    error!("link write failed: {e}");
                }
            }
            BackEndRequest::DictRead => {
                let mut buf = Vec::new();
                if self.interpreter.dictionaries().serialize(&mut buf).is_ok() {
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    let reply = self.backend.dict_read_reply(&text);
                    if let Err(e) = self.pal.send_front_end(addr, &reply) {
                        error!("front-end send failed: {e}");
                    }
                }
            }
            BackEndRequest::DictWrite { text } => {
                let mut cursor = Cursor::new(text.into_bytes());
                if let Err(e) = self
                    .interpreter
                    .dictionaries_mut()
                    .deserialize(&mut cursor)
                {
                    warn!("dictionary write from front-end failed: {e}");
                }
            }
            BackEndRequest::ScreenText { text } => {
                log::info!("front-end: {text}");
            }
        }
    }

    fn handle_keystroke(&mut self, key: u8) -> Option<i32> {
        match commander::action_for(key) {
            Action::Help => print_help(),
            Action::Clear => print!("\x1B[2J\x1B[H"),
            Action::ToggleQuiet => self.router.quiet_mode().toggle(),
            Action::SendReset => self.send_command(Command::Reset),
            Action::SendInfo => self.send_command(Command::Info),
            Action::SendTick(rate) => self.send_command(Command::Tick { rate }),
            Action::PersistDictionaries => self.persist_dictionaries(),
            Action::ToggleSink(kind) => self.toggle_sink(kind),
            Action::Quit => return Some(0),
            Action::Unknown => print_help(),
        }
        None
    }

    fn send_command(&mut self, cmd: Command) {
        let frame = self.encoder.encode(&cmd, self.interpreter.config());
        if let Err(e) = self.pal.send(&frame) {
            error!("link write failed: {e}");
        }
    }

    fn persist_dictionaries(&mut self) {
        let Some(path) = self.paths.dict.clone() else {
            warn!("no dictionary file configured, `d` ignored");
            return;
        };
        match std::fs::File::create(&path) {
            Ok(mut f) => {
                if let Err(e) = self.interpreter.dictionaries().serialize(&mut f) {
                    error!("failed to persist dictionaries to {}: {e}", path.display());
                }
            }
            Err(e) => error!("failed to open {} for writing: {e}", path.display()),
        }
    }

    fn toggle_sink(&mut self, kind: SinkKind) {
        match kind {
            SinkKind::Text => toggle(
                self.router.text_open(),
                &self.paths.text,
                |r, p| r.open_text(p),
                |r| r.close_text(),
                &mut self.router,
            ),
            SinkKind::Binary => toggle(
                self.router.binary_open(),
                &self.paths.binary,
                |r, p| r.open_binary(p),
                |r| r.close_binary(),
                &mut self.router,
            ),
            SinkKind::Matlab => toggle(
                self.router.matlab_open(),
                &self.paths.matlab,
                |r, p| r.open_matlab(p),
                |r| r.close_matlab(),
                &mut self.router,
            ),
            SinkKind::Sequence => toggle(
                self.router.sequence_open(),
                &self.paths.sequence,
                |r, p| r.open_sequence(p),
                |r| r.close_sequence(),
                &mut self.router,
            ),
            SinkKind::BackEnd => self.backend.toggle_forwarding(),
        }
    }
}

fn toggle(
    is_open: bool,
    path: &Option<PathBuf>,
    open: impl FnOnce(&mut OutputRouter, &std::path::Path),
    close: impl FnOnce(&mut OutputRouter),
    router: &mut OutputRouter,
) {
    if is_open {
        close(router);
    } else if let Some(path) = path {
        open(router, path);
    } else {
        warn!("no path configured for this sink, toggle ignored");
    }
}

fn print_help() {
    println!(
        "h help | c clear | q quiet | r reset | i info | t/u tick | d save dict | \
         o/s/b/m/g toggle sink | x/Esc quit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dict::Dictionaries;
    use crate::line::QuietMode;
    use std::net::SocketAddr;

    /// A scripted [`Pal`] for event-loop tests: replays a fixed sequence
    /// of events, then reports `Done`.
    struct ScriptedPal {
        events: Vec<ScriptedEvent>,
        pos: usize,
        sent: Vec<Vec<u8>>,
        opened: bool,
        closed: bool,
    }

    enum ScriptedEvent {
        Target(Vec<u8>),
        Key(u8),
    }

    impl ScriptedPal {
        fn new(events: Vec<ScriptedEvent>) -> Self {
            ScriptedPal {
                events,
                pos: 0,
                sent: Vec::new(),
                opened: false,
                closed: false,
            }
        }
    }

    impl Pal for ScriptedPal {
        fn open(&mut self) -> Result<(), SpyError> {
            self.opened = true;
            Ok(())
        }

        fn close(&mut self) {
            self.closed = true;
        }

        fn next_event(
            &mut self,
            _timeout: Duration,
            target_buf: &mut [u8],
            _front_end_buf: &mut [u8],
        ) -> PalEvent {
            if self.pos >= self.events.len() {
                return PalEvent::Done;
            }
            let ev = &self.events[self.pos];
            self.pos += 1;
            match ev {
                ScriptedEvent::Target(bytes) => {
                    target_buf[..bytes.len()].copy_from_slice(bytes);
                    PalEvent::TargetBytes(bytes.len())
                }
                ScriptedEvent::Key(b) => PalEvent::Keystroke(*b),
            }
        }

        fn send(&mut self, bytes: &[u8]) -> Result<(), SpyError> {
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn send_front_end(&mut self, _addr: SocketAddr, _bytes: &[u8]) -> Result<(), SpyError> {
            Ok(())
        }
    }

    fn new_loop(pal: ScriptedPal) -> EventLoop<ScriptedPal> {
        let interp = Interpreter::new(Config::default(), Dictionaries::new());
        let router = OutputRouter::new(QuietMode::new(-1));
        EventLoop::new(pal, interp, router, BackEnd::new(), SinkPaths::default())
    }

    #[test]
    fn quit_keystroke_exits_cleanly_and_closes_pal() {
        let mut ev_loop = new_loop(ScriptedPal::new(vec![ScriptedEvent::Key(b'x')]));
        assert_eq!(ev_loop.run(), 0);
        assert!(ev_loop.pal.opened);
        assert!(ev_loop.pal.closed);
    }

    #[test]
    fn reset_keystroke_sends_encoded_command() {
        let mut ev_loop = new_loop(ScriptedPal::new(vec![
            ScriptedEvent::Key(b'r'),
            ScriptedEvent::Key(b'x'),
        ]));
        ev_loop.run();
        assert_eq!(ev_loop.pal.sent.len(), 1);
    }

    #[test]
    fn running_out_of_events_reports_done() {
        let mut ev_loop = new_loop(ScriptedPal::new(vec![]));
        assert_eq!(ev_loop.run(), 0);
    }

    #[test_log::test]
    fn dropped_frame_emits_warning_line() {
        // A too-short frame (single byte before FRAME_END) is dropped by
        // the Framer with a WARN; the event loop should not panic and
        // should still terminate cleanly afterwards.
        let mut ev_loop = new_loop(ScriptedPal::new(vec![
            ScriptedEvent::Target(vec![0x42, 0x00]),
            ScriptedEvent::Key(b'x'),
        ]));
        assert_eq!(ev_loop.run(), 0);
    }
}
