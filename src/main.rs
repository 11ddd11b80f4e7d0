//! `nomad` command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use nomad::cli::{self, Cli};
use nomad::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init() {
        eprintln!("File logging disabled: {err}");
        logging::init_stderr_only();
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli::run(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            cli::report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
