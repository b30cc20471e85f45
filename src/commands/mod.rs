//! Subcommand handlers and the setup they share.
pub mod clear;
pub mod completions;
pub mod console;
pub mod export;
pub mod generate;
pub mod import;
pub mod list;
pub mod login;
pub mod remove;
pub mod version;

use anyhow::{Context as _, Result};

use crate::config::{Documents, Settings};
use crate::error::ProfileError;
use crate::logging::{EntryStatus, Log, Logger};
use crate::profiles::conflict::{Outcome, Proposal, Resolved};
use crate::profiles::{ConflictPrompt, ConflictResolver, Registry, Strategy};

/// Documents and the registry built from them.
///
/// Every command that reads profiles goes through this so that validation
/// warnings are reported the same way everywhere.
#[derive(Debug)]
pub struct CommandSetup {
    /// The config and credentials documents as loaded.
    pub documents: Documents,
    /// Registry over both documents.
    pub registry: Registry,
}

impl CommandSetup {
    /// Load both documents and build the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if either document cannot be read or parsed.
    pub fn init(settings: &Settings, log: &Logger) -> Result<Self> {
        log.stage("Loading profiles");
        log.debug(&format!("config: {}", settings.config_file.display()));
        log.debug(&format!("credentials: {}", settings.credentials_file.display()));
        let documents = Documents::load(settings).context("loading documents")?;
        let registry = Registry::build_with_credentials(&documents.config, &documents.credentials);

        log.debug(&format!("{} profiles", registry.profiles().len()));
        log.debug(&format!("{} sessions", registry.sessions().len()));

        let warnings = registry.warnings();
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.kind
                ));
            }
        }

        Ok(Self {
            documents,
            registry,
        })
    }
}

/// Resolver for `--strategy`, falling back to the configured default and
/// then to asking `prompt`.
#[must_use]
pub fn resolver<'a>(
    strategy: Option<Strategy>,
    settings: &Settings,
    prompt: &'a dyn ConflictPrompt,
) -> ConflictResolver<'a> {
    match strategy.or(settings.default_strategy) {
        Some(strategy) => ConflictResolver::new(Some(strategy), None),
        None => ConflictResolver::new(None, Some(prompt)),
    }
}

/// Record one entry per resolved proposal.
pub fn record_resolutions(
    results: &[(Proposal, Result<Resolved, ProfileError>)],
    log: &dyn Log,
) {
    for (proposal, result) in results {
        match result {
            Ok(resolved) => {
                let (status, message) = match &resolved.outcome {
                    Outcome::Added => (EntryStatus::Added, None),
                    Outcome::Unchanged => (EntryStatus::Unchanged, None),
                    Outcome::Renamed { from } => (EntryStatus::Renamed, Some(format!("from {from}"))),
                    Outcome::Replaced => (EntryStatus::Replaced, None),
                    Outcome::Skipped => (EntryStatus::Skipped, None),
                };
                log.record(&resolved.name, status, message.as_deref());
            }
            Err(e) => {
                let message = e.to_string();
                log.record(&proposal.name, EntryStatus::Failed, Some(&message));
            }
        }
    }
}

/// Print the summary and bail if any entry failed.
///
/// # Errors
///
/// Returns an error if one or more entries recorded a failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} entr{} failed", if count == 1 { "y" } else { "ies" });
    }
    Ok(())
}
