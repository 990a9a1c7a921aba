//! Command-line front end for the Spy: resolves `-c/-t/-f` into a concrete
//! [`tracespy::pal::Pal`], wires the decode engine's remaining pieces
//! together, and runs the event loop to completion.

mod backend_socket;
mod cli;
mod pal_impl;

use std::fs::File;
use std::io::BufReader;

use anyhow::Context;
use log::error;
use tracespy::backend::BackEnd;
use tracespy::dict::Dictionaries;
use tracespy::event_loop::{EventLoop, SinkPaths};
use tracespy::interpreter::Interpreter;
use tracespy::line::QuietMode;
use tracespy::pal::Pal;
use tracespy::router::OutputRouter;

use clap::Parser;

use crate::cli::{Args, LinkChoice};
use crate::pal_impl::{file::FilePal, serial::SerialPal, tcp::TcpPal};

fn main() {
    env_logger::init();
    let args = Args::parse();
    std::process::exit(run(args));
}

fn run(args: Args) -> i32 {
    let link = match args.link_choice() {
        Ok(link) => link,
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            return 1;
        }
    };

    let config = match args.build_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let sinks = args.resolved_sinks(&timestamp);

    let dict = match load_dictionary(sinks.dict.as_deref()) {
        Ok(dict) => dict,
        Err(e) => {
            error!("{e:#}");
            Dictionaries::new()
        }
    };

    let backend_port = args.backend_port();

    let pal: Box<dyn Pal> = match link {
        LinkChoice::Tcp { port } => Box::new(TcpPal::new(port, backend_port)),
        LinkChoice::Serial { device, baud } => Box::new(SerialPal::new(device, baud, backend_port)),
        LinkChoice::Replay { path } => Box::new(FilePal::new(path, backend_port)),
    };

    let mut interpreter = Interpreter::new(config, dict);
    interpreter.set_seq_list(sinks.sequence_objects.iter().copied());

    let mut router = OutputRouter::new(QuietMode::new(args.quiet_value()));
    if let Some(path) = &sinks.text {
        router.open_text(path);
    }
    if let Some(path) = &sinks.binary {
        router.open_binary(path);
    }
    if let Some(path) = &sinks.matlab {
        router.open_matlab(path);
    }
    if let Some(path) = &sinks.sequence {
        router.open_sequence(path);
    }

    let backend = BackEnd::new();
    let paths = SinkPaths {
        text: sinks.text,
        binary: sinks.binary,
        matlab: sinks.matlab,
        sequence: sinks.sequence,
        dict: sinks.dict,
    };

    let mut event_loop = EventLoop::new(pal, interpreter, router, backend, paths);
    event_loop.run()
}

fn print_usage() {
    eprintln!("usage: tracespy-host (-c [device] | -t [port] | -f FILE) [options]");
    eprintln!("see --help for the full flag list");
}

/// Loads the dictionary file named by `-d`, if any and if it already
/// exists. A missing dictionary file is not an error (the `d` keystroke
/// will create it later); a present-but-malformed one is, per §7.
fn load_dictionary(path: Option<&std::path::Path>) -> anyhow::Result<Dictionaries> {
    let mut dict = Dictionaries::new();
    let Some(path) = path else {
        return Ok(dict);
    };
    if !path.exists() {
        return Ok(dict);
    }

    let f = File::open(path).with_context(|| format!("opening dictionary file {}", path.display()))?;
    let mut reader = BufReader::new(f);
    dict.deserialize(&mut reader)
        .with_context(|| format!("loading dictionary file {}", path.display()))?;
    Ok(dict)
}
