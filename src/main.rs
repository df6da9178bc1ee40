mod catalog;
mod cli;
mod commands;
mod config;
mod hardeners;
mod progress;
mod report;
mod transport;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::run::HostFailures;
use config::Config;
use std::io;
use std::process::ExitCode;

/// Exit status of a run that finished with failed or incomplete topics
const EXIT_RUN_FAILED: u8 = 244;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match dispatch(&ctx, cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.downcast_ref::<HostFailures>().is_some() => ExitCode::from(EXIT_RUN_FAILED),
        Err(err) => {
            ui::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn dispatch(ctx: &Context, cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => {
            let config = Config::load(cli.config.as_deref())?;
            commands::run::run(ctx, args, &config)
        }
        Command::Scan(args) => {
            let config = Config::load(cli.config.as_deref())?;
            commands::scan::run(ctx, args, &config)
        }
        Command::Baselines => commands::baselines::run(),
        Command::Topics { baseline } => {
            let config = Config::load(cli.config.as_deref())?;
            commands::topics::run(baseline.as_deref(), &config)
        }
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "bastion", &mut io::stdout());
            Ok(())
        }
    }
}
