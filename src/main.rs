use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use nucleus_cli::cli::{Cli, Command, GlobalOpts};
use nucleus_cli::logging::Logger;
use nucleus_cli::{commands, logging};

/// Print usage to stdout and fail, or let clap handle `--help`/`--version`.
#[allow(clippy::print_stdout)]
fn usage_error(err: &clap::Error) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand | ErrorKind::MissingSubcommand => {}
        _ => {
            let _ = err.print();
        }
    }
    println!("{}", Cli::command().render_help());
    ExitCode::FAILURE
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => return usage_error(&e),
    };

    let (run, failure): (fn(&GlobalOpts, &Arc<Logger>) -> anyhow::Result<()>, &str) =
        match args.command {
            Command::Install => (commands::install::run, "Installation failed"),
            Command::Cleanup => (commands::cleanup::run, "Cleanup failed"),
            Command::Version => {
                commands::version::run();
                return ExitCode::SUCCESS;
            }
        };

    logging::init_subscriber(args.verbose, args.command.name());
    let log = Arc::new(Logger::new(args.command.name()));

    match run(&args.global, &log) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{failure}: {e:#}");
            ExitCode::FAILURE
        }
    }
}
