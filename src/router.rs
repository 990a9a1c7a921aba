//! Fans out each decoded line (and the raw bytes/structured rows that ride
//! along beside it) to whichever sinks are currently open: stdout, a text
//! file, a raw binary capture, a Matlab-friendly numeric log, and a
//! sequence-diagram log. Back-end forwarding is not a router
//! responsibility: the event loop asks [`crate::backend::BackEnd`]
//! directly, since only `BackEnd` knows about the single attached client.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::error;

use crate::error::SpyError;
use crate::line::{DecodedLine, LineKind, QuietMode, RegAction};

/// What happened to one decoded line after routing. Useful for tests and
/// for a caller that wants to know whether a line actually reached stdout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// The line's full text was printed to stdout.
    pub printed: bool,
    /// A dot was printed to stdout in place of the line (quiet mode).
    pub dotted: bool,
}

/// One optional file sink. Closing flushes and drops the handle; opening
/// over an already-open sink closes the old one first.
#[derive(Debug, Default)]
struct FileSink {
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    fn open(&mut self, path: &Path) -> Result<(), SpyError> {
        let file = File::create(path).map_err(SpyError::SinkOpen)?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut w) = self.writer.take() {
            let _ = w.flush();
        }
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn write_line(&mut self, line: &str) {
        if let Some(w) = &mut self.writer {
            if let Err(e) = writeln!(w, "{line}") {
                error!("sink write failed: {e}");
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Some(w) = &mut self.writer {
            if let Err(e) = w.write_all(bytes) {
                error!("sink write failed: {e}");
            }
        }
    }
}

/// Fans decoded lines and structured side channels out to every open sink.
/// Owns [`QuietMode`], since stdout routing is the only place it applies.
#[derive(Debug, Default)]
pub struct OutputRouter {
    quiet: QuietMode,
    text: FileSink,
    binary: FileSink,
    matlab: FileSink,
    sequence: FileSink,
}

impl OutputRouter {
    /// A router with all sinks closed and quiet mode off.
    pub fn new(quiet: QuietMode) -> Self {
        OutputRouter {
            quiet,
            ..Default::default()
        }
    }

    /// The live quiet-mode state (for the `q` keystroke).
    pub fn quiet_mode(&mut self) -> &mut QuietMode {
        &mut self.quiet
    }

    /// Opens the always-on text sink at `path`. An open failure is logged
    /// as ERR and leaves the sink off, per §4.5/§7.
    pub fn open_text(&mut self, path: &Path) {
        if let Err(e) = self.text.open(path) {
            error!("failed to open text sink {}: {e}", path.display());
        }
    }

    /// Closes the text sink, flushing first.
    pub fn close_text(&mut self) {
        self.text.close();
    }

    /// Whether the text sink is open.
    pub fn text_open(&self) -> bool {
        self.text.is_open()
    }

    /// Opens the raw binary capture sink.
    pub fn open_binary(&mut self, path: &Path) {
        if let Err(e) = self.binary.open(path) {
            error!("failed to open binary sink {}: {e}", path.display());
        }
    }

    /// Closes the binary sink.
    pub fn close_binary(&mut self) {
        self.binary.close();
    }

    /// Whether the binary sink is open.
    pub fn binary_open(&self) -> bool {
        self.binary.is_open()
    }

    /// Opens the Matlab numeric-row sink.
    pub fn open_matlab(&mut self, path: &Path) {
        if let Err(e) = self.matlab.open(path) {
            error!("failed to open matlab sink {}: {e}", path.display());
        }
    }

    /// Closes the Matlab sink.
    pub fn close_matlab(&mut self) {
        self.matlab.close();
    }

    /// Whether the Matlab sink is open.
    pub fn matlab_open(&self) -> bool {
        self.matlab.is_open()
    }

    /// Opens the sequence-diagram sink.
    pub fn open_sequence(&mut self, path: &Path) {
        if let Err(e) = self.sequence.open(path) {
            error!("failed to open sequence sink {}: {e}", path.display());
        }
    }

    /// Closes the sequence sink.
    pub fn close_sequence(&mut self) {
        self.sequence.close();
    }

    /// Whether the sequence sink is open.
    pub fn sequence_open(&self) -> bool {
        self.sequence.is_open()
    }

    /// Persists raw target-link bytes to the binary sink, if open. Called
    /// on every `TargetBytes` event before the bytes are fed to the
    /// Framer, so a capture survives even a record this build can't decode.
    pub fn capture_raw_frame(&mut self, bytes: &[u8]) {
        self.binary.write_bytes(bytes);
    }

    /// Writes one Matlab numeric row, if the sink is open.
    pub fn write_matlab_row(&mut self, row: &[u64]) {
        if self.matlab.is_open() {
            let joined = row
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            self.matlab.write_line(&joined);
        }
    }

    /// Writes one sequence-diagram line, if the sink is open.
    pub fn write_sequence_line(&mut self, line: &str) {
        self.sequence.write_line(line);
    }

    /// Routes one decoded line to stdout (subject to quiet mode for REG
    /// lines; ERR/WARN/INF/USR always print) and the text sink (always,
    /// when open).
    pub fn route(&mut self, line: &DecodedLine) -> RouteOutcome {
        self.text.write_line(&line.text);

        if line.kind.always_visible() {
            println!("{}", line.text);
            return RouteOutcome {
                printed: true,
                dotted: false,
            };
        }

        debug_assert_eq!(line.kind, LineKind::Reg);
        match self.quiet.classify_reg() {
            RegAction::Print => {
                println!("{}", line.text);
                RouteOutcome {
                    printed: true,
                    dotted: false,
                }
            }
            RegAction::Dot => {
                print!(".");
                let _ = std::io::stdout().flush();
                RouteOutcome {
                    printed: false,
                    dotted: true,
                }
            }
        }
    }

    /// Flushes and closes every open sink. Idempotent; called once on any
    /// terminating event.
    pub fn close_all(&mut self) {
        self.text.close();
        self.binary.close();
        self.matlab.close();
        self.sequence.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile_shim::NamedTempFile;

    // A minimal stand-in for `tempfile` so the test module has no extra
    // dev-dependency: a file in `std::env::temp_dir()` removed on drop.
    mod tempfile_shim {
        use std::fs;
        use std::path::{Path, PathBuf};

        pub struct NamedTempFile {
            path: PathBuf,
        }

        impl NamedTempFile {
            pub fn new(tag: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!(
                    "tracespy-test-{tag}-{}-{:?}",
                    std::process::id(),
                    std::thread::current().id()
                ));
                NamedTempFile { path }
            }

            pub fn path(&self) -> &Path {
                &self.path
            }
        }

        impl Drop for NamedTempFile {
            fn drop(&mut self) {
                let _ = fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn err_line_always_prints_regardless_of_quiet() {
        let mut router = OutputRouter::new(QuietMode::new(0));
        let outcome = router.route(&DecodedLine::new(LineKind::Err, "boom"));
        assert!(outcome.printed);
        assert!(!outcome.dotted);
    }

    #[test]
    fn reg_line_dots_under_quiet_zero() {
        let mut router = OutputRouter::new(QuietMode::new(0));
        let outcome = router.route(&DecodedLine::new(LineKind::Reg, "x"));
        assert!(!outcome.printed);
        assert!(outcome.dotted);
    }

    #[test]
    fn text_sink_receives_every_line_when_open() {
        let tmp = NamedTempFile::new("text");
        let mut router = OutputRouter::new(QuietMode::new(-1));
        router.open_text(tmp.path());
        assert!(router.text_open());

        router.route(&DecodedLine::new(LineKind::Reg, "hello"));
        router.close_text();

        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents, "hello\n");
    }

    #[test]
    fn failed_open_leaves_sink_off() {
        let mut router = OutputRouter::new(QuietMode::new(-1));
        router.open_text(Path::new("/nonexistent/dir/does/not/exist.txt"));
        assert!(!router.text_open());
    }

    #[test]
    fn matlab_row_written_only_when_open() {
        let tmp = NamedTempFile::new("matlab");
        let mut router = OutputRouter::new(QuietMode::new(-1));
        router.write_matlab_row(&[1, 2, 3]); // sink not open: no-op, no panic

        router.open_matlab(tmp.path());
        router.write_matlab_row(&[1, 2, 3]);
        router.close_matlab();

        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents, "1 2 3\n");
    }
}
