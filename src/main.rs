//! tardigrade CLI entry point
//!
//! Parsing, configuration and dispatch live in the CLI module. The
//! response is already on stdout when an error comes back; this only
//! reports it on stderr and sets the exit code.

use tardigrade::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
