//! Reads single keystrokes off a background thread and serializes them into
//! the event loop via a channel, per §5's "worker threads must serialize
//! callbacks into the event loop".

use std::io::Read;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Non-blocking keystroke source. The read thread blocks on stdin forever;
/// `try_recv` never blocks, so a PAL's `next_event` can poll it cheaply
/// before falling through to the link/socket poll.
pub struct StdinReader {
    rx: Receiver<u8>,
}

impl StdinReader {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut byte = [0u8; 1];
            let mut stdin = std::io::stdin();
            loop {
                match stdin.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(byte[0]).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        StdinReader { rx }
    }

    pub fn try_recv(&self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(b) => Some(b),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
