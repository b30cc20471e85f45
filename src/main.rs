//! `profman` binary: parses arguments, sets up logging and settings, and dispatches.
use anyhow::{Context as _, Result};
use clap::Parser;

use profman_cli::cli::{self, Command};
use profman_cli::commands;
use profman_cli::config::Settings;
use profman_cli::config::settings::{Overrides, ProcessEnv};
use profman_cli::credentials::Cancellation;
use profman_cli::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match &args.command {
        Command::Version => {
            commands::version::run();
            return Ok(());
        }
        Command::Completions(opts) => {
            commands::completions::run(opts);
            return Ok(());
        }
        _ => {}
    }

    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = Logger::new(name);

    let overrides = Overrides {
        config_file: args.global.config_file.clone(),
        credentials_file: args.global.credentials_file.clone(),
    };
    let settings = Settings::load(args.global.settings.as_deref(), &overrides, &ProcessEnv)
        .context("loading settings")?;

    let cancel = Cancellation::new();
    cancel
        .install_interrupt_handler()
        .context("installing interrupt handler")?;

    match &args.command {
        Command::List => commands::list::run(&settings, &log),
        Command::Generate(opts) => commands::generate::run(&settings, opts, &log),
        Command::Import(opts) => commands::import::run(&settings, opts, &log),
        Command::Export(opts) => commands::export::run(&settings, opts, &log),
        Command::Login(opts) => commands::login::run(&settings, opts, cancel, &log),
        Command::Clear(opts) => commands::clear::run(&settings, opts, &log),
        Command::Remove(opts) => commands::remove::run(&settings, opts, &log),
        Command::Console(opts) => commands::console::run(&settings, opts, &log),
        Command::Completions(_) | Command::Version => Ok(()),
    }
}
