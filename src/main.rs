use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use gridpaint::cli::{self, CliArgs};
use gridpaint::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logger::init(level, args.verbose);
    cli::run(args)
}
