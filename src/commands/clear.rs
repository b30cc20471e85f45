//! Command: delete cached credentials.
use anyhow::Result;

use super::finish;
use crate::cli::ClearOpts;
use crate::config::Settings;
use crate::config::settings::{ProcessEnv, home_dir};
use crate::credentials::{Backends, Cancellation, CredentialManager};
use crate::logging::{EntryStatus, Log, Logger};
use crate::providers::{AwsCli, ConsolePrompt};

/// Run the clear command.
///
/// # Errors
///
/// Returns an error if the credentials document cannot be read or written,
/// or a named profile had no entry.
pub fn run(settings: &Settings, opts: &ClearOpts, log: &Logger) -> Result<()> {
    let backend = AwsCli::new(settings, &home_dir(&ProcessEnv));
    let prompt = ConsolePrompt::stdio();
    let backends = Backends {
        sessions: &backend,
        roles: &backend,
        mfa: &prompt,
    };
    let manager = CredentialManager::new(settings, backends, Cancellation::new(), log);

    log.stage(&format!("Clearing credentials in {}", manager.path().display()));
    clear(&manager, opts, log)?;
    finish(log)
}

/// Clear the entries selected by `opts`, recording each.
///
/// # Errors
///
/// Returns an error if `--all` could not read or write the document.
pub fn clear(manager: &CredentialManager<'_>, opts: &ClearOpts, log: &dyn Log) -> Result<()> {
    if opts.all {
        let cleared = manager.clear_all()?;
        if cleared.is_empty() {
            log.info("no temporary credentials cached");
        }
        for name in &cleared {
            log.record(name, EntryStatus::Removed, None);
        }
        return Ok(());
    }

    for name in &opts.profiles {
        match manager.clear(name) {
            Ok(()) => log.record(name, EntryStatus::Removed, None),
            Err(e) => {
                let message = e.to_string();
                log.record(name, EntryStatus::Failed, Some(&message));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::credentials::backend::{MockMfaPrompt, MockRoleAssumer, MockSessionExchange};
    use crate::logging::isolated_logger;

    const CREDENTIALS: &str = "\
[ci]
aws_access_key_id = AKIACI
aws_secret_access_key = ci-secret

[dev]
aws_access_key_id = ASIADEV
aws_secret_access_key = dev-secret
aws_session_token = dev-token
expiration = 2026-10-19T12:00:00Z
";

    #[test]
    fn all_keeps_long_term_keys_and_named_missing_entry_fails() {
        let (log, tmp, _guard) = isolated_logger();
        let mut settings = Settings::defaults_in(tmp.path());
        settings.credentials_file = tmp.path().join("credentials");
        std::fs::write(&settings.credentials_file, CREDENTIALS).unwrap();

        let sessions = MockSessionExchange::new();
        let roles = MockRoleAssumer::new();
        let mfa = MockMfaPrompt::new();
        let backends = Backends {
            sessions: &sessions,
            roles: &roles,
            mfa: &mfa,
        };
        let manager = CredentialManager::new(&settings, backends, Cancellation::new(), &log);

        clear(
            &manager,
            &ClearOpts {
                profiles: vec![],
                all: true,
            },
            &log,
        )
        .unwrap();
        let text = std::fs::read_to_string(&settings.credentials_file).unwrap();
        assert!(text.contains("[ci]"));
        assert!(!text.contains("[dev]"));

        clear(
            &manager,
            &ClearOpts {
                profiles: vec!["dev".into()],
                all: false,
            },
            &log,
        )
        .unwrap();

        let entries = log.entries();
        assert_eq!(entries[0].name, "dev");
        assert_eq!(entries[0].status, EntryStatus::Removed);
        assert_eq!(entries[1].status, EntryStatus::Failed);
    }
}
