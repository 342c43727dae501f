// Headless entry point: every run is a batch of session scripts.

use std::process::ExitCode;

use clap::Parser;
use thumbcraft::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    logger::init(args.verbose);

    cli::run(args)
}
