//! Command: remove profiles (and optionally their session) from both documents.
use anyhow::Result;

use super::{CommandSetup, finish};
use crate::cli::RemoveOpts;
use crate::config::document::Category;
use crate::config::{Documents, Settings};
use crate::error::ProfileError;
use crate::logging::{EntryStatus, Logger};
use crate::profiles::Registry;

/// Run the remove command.
///
/// # Errors
///
/// Returns an error if any named profile or session does not exist (nothing
/// is written in that case) or a document cannot be written.
pub fn run(settings: &Settings, opts: &RemoveOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(settings, log)?;
    let (next, removed) = remove(&setup.documents, &setup.registry, opts)?;

    setup.documents.save_changes(&next, settings)?;
    for name in &removed {
        log.record(name, EntryStatus::Removed, None);
    }
    finish(log)
}

/// Remove the profiles selected by `opts` and their credentials entries.
///
/// Every name is checked before anything is removed. Returns the new
/// documents and the removed names; a removed session is listed as
/// `sso-session <name>`.
///
/// # Errors
///
/// Returns [`ProfileError::NotFound`] for the first unknown profile or session.
pub fn remove(
    documents: &Documents,
    registry: &Registry,
    opts: &RemoveOpts,
) -> Result<(Documents, Vec<String>), ProfileError> {
    let mut targets: Vec<String> = Vec::new();
    for name in &opts.profiles {
        let known = documents.config.contains(Category::Profile, name)
            || documents.credentials.contains(Category::Profile, name);
        if !known {
            return Err(ProfileError::profile_not_found(name.as_str()));
        }
        if !targets.contains(name) {
            targets.push(name.clone());
        }
    }
    if let Some(session) = &opts.session {
        if !documents.config.contains(Category::SsoSession, session) {
            return Err(ProfileError::session_not_found(session.as_str()));
        }
        for profile in registry.all_of_session(session) {
            if !targets.contains(&profile.name) {
                targets.push(profile.name.clone());
            }
        }
    }

    let mut config = documents.config.clone();
    let mut credentials = documents.credentials.clone();
    // A hand-edited file may repeat a section; every copy goes.
    for name in &targets {
        while config.contains(Category::Profile, name) {
            config = config.remove_section(Category::Profile, name)?;
        }
        while credentials.contains(Category::Profile, name) {
            credentials = credentials.remove_section(Category::Profile, name)?;
        }
    }
    if opts.with_session
        && let Some(session) = &opts.session
    {
        config = config.remove_section(Category::SsoSession, session)?;
        targets.push(format!("sso-session {session}"));
    }

    Ok((
        Documents {
            config,
            credentials,
        },
        targets,
    ))
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

[profile prod]
sso_session = corp
sso_account_id = 222222222222
sso_role_name = Developer

[profile other]
region = us-east-1
role_arn = arn:aws:iam::333333333333:role/Other
source_profile = dev
";

    const CREDENTIALS: &str = "\
[dev]
aws_access_key_id = ASIADEV
aws_secret_access_key = s
aws_session_token = t

[ci]
aws_access_key_id = AKIACI
aws_secret_access_key = s
";

    fn setup() -> (Documents, Registry) {
        let documents = Documents {
            config: Document::parse(CONFIG, Flavor::Config).unwrap(),
            credentials: Document::parse(CREDENTIALS, Flavor::Credentials).unwrap(),
        };
        let registry = Registry::build_with_credentials(&documents.config, &documents.credentials);
        (documents, registry)
    }

    fn opts(profiles: &[&str], session: Option<&str>, with_session: bool) -> RemoveOpts {
        RemoveOpts {
            profiles: profiles.iter().map(|p| (*p).to_string()).collect(),
            session: session.map(str::to_string),
            with_session,
        }
    }

    #[test]
    fn removes_profile_and_its_credentials() {
        let (documents, registry) = setup();
        let (next, removed) = remove(&documents, &registry, &opts(&["dev", "ci"], None, false)).unwrap();
        assert_eq!(removed, ["dev", "ci"]);
        assert!(!next.config.contains(Category::Profile, "dev"));
        assert!(!next.credentials.contains(Category::Profile, "dev"));
        assert!(!next.credentials.contains(Category::Profile, "ci"));
        assert!(next.config.contains(Category::Profile, "prod"));
    }

    #[test]
    fn session_removal_takes_every_member_and_the_session() {
        let (documents, registry) = setup();
        let (next, removed) = remove(&documents, &registry, &opts(&[], Some("corp"), true)).unwrap();
        assert_eq!(removed, ["dev", "prod", "sso-session corp"]);
        assert!(!next.config.contains(Category::SsoSession, "corp"));
        assert!(next.config.contains(Category::Profile, "other"));
    }

    #[test]
    fn unknown_name_aborts_before_any_removal() {
        let (documents, registry) = setup();
        let err = remove(&documents, &registry, &opts(&["dev", "nope"], None, false)).unwrap_err();
        assert!(matches!(err, ProfileError::NotFound { ref name, .. } if name == "nope"));
        assert!(remove(&documents, &registry, &opts(&[], Some("gone"), false)).is_err());
    }

    #[test]
    fn repeated_sections_are_all_removed() {
        let config = format!("{CONFIG}\n[profile dev]\nregion = eu-west-1\n");
        let credentials = format!("{CREDENTIALS}\n[dev]\naws_access_key_id = AKIAOLD\n");
        let documents = Documents {
            config: Document::parse(&config, Flavor::Config).unwrap(),
            credentials: Document::parse(&credentials, Flavor::Credentials).unwrap(),
        };
        let registry = Registry::build_with_credentials(&documents.config, &documents.credentials);

        let (next, removed) = remove(&documents, &registry, &opts(&["dev"], None, false)).unwrap();
        assert_eq!(removed, ["dev"]);
        assert!(!next.config.contains(Category::Profile, "dev"));
        assert!(!next.credentials.contains(Category::Profile, "dev"));
        assert!(next.config.contains(Category::Profile, "prod"));
    }
}
