//! Command-line surface (§6): a thin collaborator that turns flags into a
//! [`tracespy::Config`], a link choice, and the sink paths `EventLoop` needs.
//! The parser itself is out of scope for the decode engine; this crate owns
//! it.

use std::path::PathBuf;

use clap::Parser;
use tracespy::{Config, Width, WidthField};

#[cfg(windows)]
const DEFAULT_SERIAL_DEVICE: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_SERIAL_DEVICE: &str = "/dev/ttyS0";

const DEFAULT_DICT_FILE: &str = "tracespy.dict";

/// Decodes a framed binary trace stream from an instrumented target and
/// fans it out to stdout, files, and a back-end UDP socket.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
pub struct Args {
    /// Quiet mode: bare `-q` suppresses all REG lines (dots only); `-q N`
    /// prints one REG line every N.
    #[arg(short = 'q', num_args = 0..=1, default_missing_value = "0")]
    pub quiet: Option<i32>,

    /// Back-end UDP port front-end clients attach to. `0` disables it.
    #[arg(short = 'u', num_args = 0..=1, default_missing_value = "7701", default_value_t = 7701)]
    pub backend_port: u16,

    /// Target protocol version, e.g. `6.6` or `6.6.1`.
    #[arg(short = 'v', value_name = "X.Y")]
    pub protocol_version: Option<String>,

    /// Opens the text output sink at startup, using a timestamped filename.
    #[arg(short = 'o')]
    pub text_out: bool,

    /// Opens the raw binary capture sink at startup.
    #[arg(short = 's')]
    pub binary_out: bool,

    /// Opens the Matlab numeric-row sink at startup.
    #[arg(short = 'm')]
    pub matlab_out: bool,

    /// Opens the sequence-diagram sink, limited to this comma-separated list
    /// of active-object pointers (hex, no `0x` prefix).
    #[arg(short = 'g', value_name = "LIST")]
    pub sequence_list: Option<String>,

    /// TCP target link. Bare `-t` connects on the default port.
    #[arg(short = 't', num_args = 0..=1, default_missing_value = "6601")]
    pub tcp_port: Option<u16>,

    /// Serial target link device. Bare `-c` uses the platform default.
    #[arg(short = 'c', num_args = 0..=1, default_missing_value = "")]
    pub serial_port: Option<String>,

    /// Serial baud rate.
    #[arg(short = 'b', default_value_t = 115_200)]
    pub baud: u32,

    /// Replays a previously captured binary file instead of a live link.
    #[arg(short = 'f', value_name = "FILE")]
    pub replay_file: Option<PathBuf>,

    /// Dictionary file to load at startup and to reload/persist on the `d`
    /// keystroke. Bare `-d` uses a default filename.
    #[arg(short = 'd', num_args = 0..=1, default_missing_value = "")]
    pub dict_file: Option<String>,

    /// Timestamp field width override, in bytes.
    #[arg(short = 'T')]
    pub timestamp_size: Option<u8>,
    /// Active-object pointer width override, in bytes.
    #[arg(short = 'O')]
    pub obj_ptr_size: Option<u8>,
    /// State-handler function pointer width override, in bytes.
    #[arg(short = 'F')]
    pub fun_ptr_size: Option<u8>,
    /// Signal id width override, in bytes.
    #[arg(short = 'S')]
    pub sig_size: Option<u8>,
    /// Event id width override, in bytes.
    #[arg(short = 'E')]
    pub evt_size: Option<u8>,
    /// Queue occupancy counter width override, in bytes.
    #[arg(short = 'Q')]
    pub queue_ctr_size: Option<u8>,
    /// Pool free-block counter width override, in bytes.
    #[arg(short = 'P')]
    pub pool_ctr_size: Option<u8>,
    /// Pool block-size field width override, in bytes.
    #[arg(short = 'B')]
    pub pool_blk_size: Option<u8>,
    /// Time-event counter width override, in bytes.
    #[arg(short = 'C')]
    pub tevt_ctr_size: Option<u8>,
}

/// Which target link the CLI selected, fully resolved.
#[derive(Debug, Clone)]
pub enum LinkChoice {
    Tcp { port: u16 },
    Serial { device: String, baud: u32 },
    Replay { path: PathBuf },
}

/// The file paths derived from `-o/-s/-m/-g/-d`, ready to hand to
/// [`tracespy::event_loop::SinkPaths`] and the objects that open them at
/// startup.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSinks {
    pub text: Option<PathBuf>,
    pub binary: Option<PathBuf>,
    pub matlab: Option<PathBuf>,
    pub sequence: Option<PathBuf>,
    pub dict: Option<PathBuf>,
    pub sequence_objects: Vec<u64>,
}

impl Args {
    /// Resolves the requested target link, rejecting the case where more
    /// than one of `-c/-t/-f` was given and the case where none was,
    /// matching end-to-end scenario 6's "exits 1 with a usage banner".
    pub fn link_choice(&self) -> Result<LinkChoice, String> {
        let chosen = [
            self.tcp_port.is_some(),
            self.serial_port.is_some(),
            self.replay_file.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count();

        if chosen > 1 {
            return Err("conflicting link flags: only one of -c/-t/-f may be given".into());
        }

        if let Some(port) = self.tcp_port {
            return Ok(LinkChoice::Tcp { port });
        }
        if let Some(device) = &self.serial_port {
            let device = if device.is_empty() {
                DEFAULT_SERIAL_DEVICE.to_string()
            } else {
                device.clone()
            };
            return Ok(LinkChoice::Serial {
                device,
                baud: self.baud,
            });
        }
        if let Some(path) = &self.replay_file {
            return Ok(LinkChoice::Replay { path: path.clone() });
        }

        Err("no target link given: pass one of -c/-t/-f".into())
    }

    /// Back-end UDP port, or `None` if `-u 0` disabled it.
    pub fn backend_port(&self) -> Option<u16> {
        if self.backend_port == 0 {
            None
        } else {
            Some(self.backend_port)
        }
    }

    /// `-1` if `-q` was never given, else the requested quiet-mode value.
    pub fn quiet_value(&self) -> i32 {
        self.quiet.unwrap_or(-1)
    }

    /// Builds the effective `Config`, applying `-v` and any `-T/-O/.../-C`
    /// width overrides on top of the default QS-style widths.
    pub fn build_config(&self) -> Result<Config, String> {
        let mut config = Config::default();

        if let Some(v) = &self.protocol_version {
            config.protocol_version =
                Config::parse_version(v).map_err(|e| format!("invalid -v: {e}"))?;
        }

        macro_rules! apply_width {
            ($field:ident, $kind:expr) => {
                if let Some(n) = self.$field {
                    config.$field = Width::from_bytes_for_field($kind, n)
                        .map_err(|e| format!("invalid -{}: {e}", stringify!($field)))?;
                }
            };
        }
        apply_width!(timestamp_size, WidthField::Timestamp);
        apply_width!(obj_ptr_size, WidthField::ObjPtr);
        apply_width!(fun_ptr_size, WidthField::FunPtr);
        apply_width!(sig_size, WidthField::Sig);
        apply_width!(evt_size, WidthField::Evt);
        apply_width!(queue_ctr_size, WidthField::QueueCtr);
        apply_width!(pool_ctr_size, WidthField::PoolCtr);
        apply_width!(pool_blk_size, WidthField::PoolBlk);
        apply_width!(tevt_ctr_size, WidthField::TevtCtr);

        Ok(config)
    }

    /// Resolves every sink path named by `-o/-s/-m/-g/-d`, using a single
    /// shared timestamp so a run's text/binary/matlab/sequence filenames
    /// sort together.
    pub fn resolved_sinks(&self, timestamp: &str) -> ResolvedSinks {
        let mut sinks = ResolvedSinks::default();

        if self.text_out {
            sinks.text = Some(PathBuf::from(format!("trace-{timestamp}.txt")));
        }
        if self.binary_out {
            sinks.binary = Some(PathBuf::from(format!("trace-{timestamp}.bin")));
        }
        if self.matlab_out {
            sinks.matlab = Some(PathBuf::from(format!("trace-{timestamp}.m")));
        }
        if let Some(list) = &self.sequence_list {
            sinks.sequence = Some(PathBuf::from(format!("trace-{timestamp}.seq")));
            sinks.sequence_objects = list
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| u64::from_str_radix(s.trim(), 16).ok())
                .collect();
        }
        if let Some(d) = &self.dict_file {
            sinks.dict = Some(if d.is_empty() {
                PathBuf::from(DEFAULT_DICT_FILE)
            } else {
                PathBuf::from(d)
            });
        }

        sinks
    }
}
