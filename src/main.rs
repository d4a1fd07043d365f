//! `reconcile` command-line entry point.

use anyhow::Result;
use clap::Parser;

use reconcile_cli::cli::{Cli, Command};
use reconcile_cli::commands;
use reconcile_cli::logging::{Logger, init_subscriber};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return Ok(());
    }

    let command = args.command.log_name();
    init_subscriber(args.verbose, command);
    let log = Logger::new(command);
    log.debug(&format!("reconcile {}", commands::version::version()));

    match args.command {
        Command::AclInheritance(opts) => commands::acl_inheritance::run(&args.global, opts, &log),
        Command::RemoteSyslog(opts) => commands::remote_syslog::run(&args.global, opts, &log),
        Command::Run(opts) => commands::run::run(&args.global, &opts, &log),
        Command::Version => Ok(()),
    }
}
