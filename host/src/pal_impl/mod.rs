//! Concrete [`tracespy::pal::Pal`] implementations: one per target link the
//! CLI can select (`-c`/`-t`/`-f`), each wrapping a [`stdin::StdinReader`]
//! for keystrokes and (unless it already multiplexes with `mio`) a
//! [`crate::backend_socket::FrontEndSocket`] for the back-end UDP channel.

pub mod file;
pub mod serial;
pub mod stdin;
pub mod tcp;
