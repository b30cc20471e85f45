//! Command: write a bundle of all sessions and profiles.
use anyhow::Result;

use crate::cli::ExportOpts;
use crate::config::store::{self, FileMode};
use crate::config::{Documents, Settings};
use crate::logging::Logger;
use crate::profiles::bundle;

/// Run the export command.
///
/// # Errors
///
/// Returns an error if the documents cannot be read or the output cannot be
/// written.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings, opts: &ExportOpts, log: &Logger) -> Result<()> {
    let documents = Documents::load(settings)?;
    let text = bundle::export(
        &documents.config,
        &documents.credentials,
        opts.include_credentials,
    )
    .serialize();

    match &opts.output {
        Some(path) => {
            let mode = if opts.include_credentials {
                FileMode::OwnerOnly
            } else {
                FileMode::Preserve
            };
            store::save_text(path, &text, mode)?;
            log.info(&format!("wrote {}", path.display()));
            if opts.include_credentials {
                log.warn("the bundle contains long-term access keys");
            }
        }
        None => print!("{text}"),
    }
    Ok(())
}
