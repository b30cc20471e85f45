//! Command: obtain fresh credentials for one or more profiles.
use anyhow::{Result, bail};
use chrono::Utc;

use super::{CommandSetup, finish};
use crate::cli::LoginOpts;
use crate::config::Settings;
use crate::config::settings::{ProcessEnv, home_dir};
use crate::credentials::{Backends, Cancellation, CredentialManager};
use crate::error::ProfileError;
use crate::logging::Logger;
use crate::profiles::{Profile, ProfileKind, Registry};
use crate::providers::{AwsCli, ConsolePrompt};

/// Run the login command.
///
/// # Errors
///
/// Returns an error if a named profile or session does not exist, or any
/// refresh failed.
pub fn run(settings: &Settings, opts: &LoginOpts, cancel: Cancellation, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(settings, log)?;
    let targets = select(&setup.registry, opts)?;
    if targets.is_empty() {
        log.info("no profiles to refresh");
        return Ok(());
    }

    let backend = AwsCli::new(settings, &home_dir(&ProcessEnv));
    if !backend.is_available() {
        bail!("the aws CLI was not found on PATH");
    }
    let prompt = ConsolePrompt::stdio();
    let backends = Backends {
        sessions: &backend,
        roles: &backend,
        mfa: &prompt,
    };
    let manager = CredentialManager::new(settings, backends, cancel, log);

    log.stage(&format!("Refreshing {} profile(s)", targets.len()));
    manager.refresh_all(&targets, &setup.registry, Utc::now(), opts.force);
    finish(log)
}

/// Profiles selected by the command line, in registry order for `--all` and
/// `--session`, in argument order otherwise.
///
/// # Errors
///
/// Returns [`ProfileError::NotFound`] for an unknown profile or session.
pub fn select<'r>(registry: &'r Registry, opts: &LoginOpts) -> Result<Vec<&'r Profile>, ProfileError> {
    if opts.all {
        return Ok(registry
            .profiles()
            .iter()
            .filter(|p| p.valid && !matches!(p.kind, ProfileKind::StaticKey))
            .collect());
    }
    if let Some(session) = &opts.session {
        registry.session(session)?;
        return Ok(registry.all_of_session(session));
    }
    opts.profiles.iter().map(|name| registry.lookup(name)).collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::{Document, Flavor};

    const CONFIG: &str = "\
[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1

[profile dev]
sso_session = corp
sso_account_id = 111111111111
sso_role_name = Developer

[profile admin]
role_arn = arn:aws:iam::222222222222:role/Admin
source_profile = dev

[profile stale]
sso_session = gone
sso_account_id = 333333333333
sso_role_name = Developer
";

    fn registry() -> Registry {
        let credentials =
            Document::parse("[ci]\naws_access_key_id = A\naws_secret_access_key = s\n", Flavor::Credentials)
                .unwrap();
        Registry::build_with_credentials(&Document::parse(CONFIG, Flavor::Config).unwrap(), &credentials)
    }

    fn opts(profiles: &[&str], session: Option<&str>, all: bool) -> LoginOpts {
        LoginOpts {
            profiles: profiles.iter().map(|p| (*p).to_string()).collect(),
            session: session.map(str::to_string),
            all,
            force: false,
        }
    }

    fn names(profiles: &[&Profile]) -> Vec<String> {
        profiles.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn all_skips_static_and_invalid_profiles() {
        let registry = registry();
        let selected = select(&registry, &opts(&[], None, true)).unwrap();
        assert_eq!(names(&selected), ["dev", "admin"]);
    }

    #[test]
    fn session_selects_its_profiles() {
        let registry = registry();
        let selected = select(&registry, &opts(&[], Some("corp"), false)).unwrap();
        assert_eq!(names(&selected), ["dev"]);
        assert!(matches!(
            select(&registry, &opts(&[], Some("nope"), false)),
            Err(ProfileError::NotFound { .. })
        ));
    }

    #[test]
    fn named_profiles_keep_argument_order() {
        let registry = registry();
        let selected = select(&registry, &opts(&["admin", "ci"], None, false)).unwrap();
        assert_eq!(names(&selected), ["admin", "ci"]);
        assert!(select(&registry, &opts(&["missing"], None, false)).is_err());
    }
}
