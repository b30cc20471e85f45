//! Command: merge an exported bundle into the local documents.
use std::path::Path;

use anyhow::{Context as _, Result};

use super::{CommandSetup, finish, record_resolutions};
use crate::cli::ImportOpts;
use crate::config::document::{Document, Flavor};
use crate::config::{Documents, Settings};
use crate::logging::{Log, Logger};
use crate::profiles::ConflictResolver;
use crate::profiles::bundle;
use crate::providers::ConsolePrompt;

/// Run the import command.
///
/// # Errors
///
/// Returns an error if the bundle cannot be read or parsed, a document
/// cannot be written, or any section failed to import.
pub fn run(settings: &Settings, opts: &ImportOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(settings, log)?;
    let bundle = read_bundle(&opts.bundle)?;

    let prompt = ConsolePrompt::stdio();
    let resolver = super::resolver(opts.strategy, settings, &prompt);
    let next = import(&bundle, &setup.documents, &resolver, log);

    if setup.documents.save_changes(&next, settings)? {
        log.info("documents updated");
    }
    finish(log)
}

fn read_bundle(path: &Path) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle: {}", path.display()))?;
    Document::parse(&text, Flavor::Config)
        .with_context(|| format!("Failed to parse bundle: {}", path.display()))
}

/// Merge `bundle` into `documents`, recording one entry per section.
#[must_use]
pub fn import(
    bundle: &Document,
    documents: &Documents,
    resolver: &ConflictResolver<'_>,
    log: &dyn Log,
) -> Documents {
    log.stage("Importing bundle");
    let result = bundle::import(bundle, documents, resolver);
    for name in &result.ignored {
        log.warn(&format!("ignoring [{name}]: not a profile or sso-session"));
    }
    record_resolutions(&result.results, log);
    log.debug(&format!("{} section(s) changed", result.change_count()));
    result.documents
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::Category;
    use crate::logging::{EntryStatus, isolated_logger};
    use crate::profiles::Strategy;

    #[test]
    fn bundle_is_read_and_merged() {
        let (log, tmp, _guard) = isolated_logger();
        let path = tmp.path().join("bundle.ini");
        std::fs::write(
            &path,
            "# profman export bundle\n[profile ci]\nregion = us-east-1\naws_access_key_id = AKIA\naws_secret_access_key = s\n\n[metadata]\nk = v\n",
        )
        .unwrap();

        let bundle = read_bundle(&path).unwrap();
        let current = Documents {
            config: Document::empty(Flavor::Config),
            credentials: Document::empty(Flavor::Credentials),
        };
        let next = import(
            &bundle,
            &current,
            &ConflictResolver::new(Some(Strategy::Skip), None),
            &log,
        );

        assert!(next.config.contains(Category::Profile, "ci"));
        assert!(next.credentials.contains(Category::Profile, "ci"));
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, EntryStatus::Added);
    }

    #[test]
    fn missing_bundle_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = read_bundle(&tmp.path().join("nope.ini")).unwrap_err();
        assert!(err.to_string().contains("Failed to read bundle"));
    }
}
