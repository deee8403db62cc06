//! Command-line entry point for moddeploy.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use moddeploy::{cli, commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(logging::Logger::new(name));

    match args.command {
        cli::Command::Purge(opts) => commands::purge::run(&args.global, &opts, &log),
        cli::Command::PurgePath(opts) => commands::purge_path::run(&args.global, &opts, &log),
        cli::Command::Conflicts(opts) => commands::conflicts::run(&args.global, &opts, &log),
        cli::Command::Check(opts) => commands::check::run(&args.global, &opts, &log),
        cli::Command::Repair(opts) => commands::repair::run(&args.global, &opts, &log),
        cli::Command::Version => {
            commands::version::run(log.as_ref());
            Ok(())
        }
    }
}
