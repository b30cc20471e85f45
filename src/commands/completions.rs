//! Command: print a shell completion script.
use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionsOpts};

/// Write the completion script for `opts.shell` to stdout.
pub fn run(opts: &CompletionsOpts) {
    let mut command = Cli::command();
    clap_complete::generate(opts.shell, &mut command, "profman", &mut std::io::stdout());
}
