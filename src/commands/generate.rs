//! Command: generate profiles for every role reachable through a session.
use anyhow::{Result, bail};

use super::{CommandSetup, finish, record_resolutions};
use crate::cli::GenerateOpts;
use crate::config::settings::{ProcessEnv, home_dir};
use crate::config::{Documents, Settings};
use crate::error::ProfileError;
use crate::logging::{EntryStatus, Log, Logger};
use crate::profiles::generate::{DiscoverySource, discover, proposals};
use crate::profiles::{ConflictResolver, Session};
use crate::providers::{AwsCli, ConsolePrompt};

/// Run the generate command.
///
/// # Errors
///
/// Returns an error if the session is unknown, the account listing fails,
/// a document cannot be written, or any proposal failed.
pub fn run(settings: &Settings, opts: &GenerateOpts, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(settings, log)?;
    let session = setup.registry.session(&opts.session)?;

    let backend = AwsCli::new(settings, &home_dir(&ProcessEnv));
    if !backend.is_available() {
        bail!("the aws CLI was not found on PATH");
    }

    let prompt = ConsolePrompt::stdio();
    let resolver = super::resolver(opts.strategy, settings, &prompt);
    let next = generate(
        &setup.documents,
        session,
        &backend,
        &resolver,
        &Template {
            name: &settings.generate.name_template,
            region: opts.region.as_deref(),
        },
        log,
    )?;

    if setup.documents.save_changes(&next, settings)? {
        log.info(&format!("updated {}", settings.config_file.display()));
    }
    finish(log)
}

/// Naming and region for generated profiles.
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    /// Name template.
    pub name: &'a str,
    /// Region override; the session region when `None`.
    pub region: Option<&'a str>,
}

/// Discover roles through `session` and merge one profile per role into the
/// config document. Each proposal and each failed account is recorded.
///
/// # Errors
///
/// Returns [`ProfileError::Auth`] if the account listing fails.
pub fn generate(
    documents: &Documents,
    session: &Session,
    source: &dyn DiscoverySource,
    resolver: &ConflictResolver<'_>,
    template: &Template<'_>,
    log: &dyn Log,
) -> Result<Documents, ProfileError> {
    log.stage(&format!("Discovering roles for session '{}'", session.name));
    let discovery = discover(source, session).map_err(|source| ProfileError::Auth {
        profile: session.name.clone(),
        source,
    })?;
    for (account, e) in &discovery.failures {
        let message = e.to_string();
        log.record(
            &format!("{} ({})", account.name, account.id),
            EntryStatus::Failed,
            Some(&message),
        );
    }
    log.info(&format!("found {} role(s)", discovery.roles.len()));

    log.stage("Merging profiles");
    let proposals = proposals(&discovery.roles, session, template.name, template.region);
    let batch = resolver.resolve_batch(&documents.config, proposals);
    record_resolutions(&batch.results, log);

    Ok(Documents {
        config: batch.document,
        credentials: documents.credentials.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::{Category, Document, Flavor};
    use crate::error::AuthError;
    use crate::logging::isolated_logger;
    use crate::profiles::generate::{Account, MockDiscoverySource};
    use crate::profiles::{Registry, Strategy};

    const CONFIG: &str = "\
[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1

[profile dev-readonly]
sso_session = corp
sso_account_id = 111111111111
sso_role_name = Admin
region = us-east-1
";

    fn documents() -> Documents {
        Documents {
            config: Document::parse(CONFIG, Flavor::Config).unwrap(),
            credentials: Document::empty(Flavor::Credentials),
        }
    }

    fn source() -> MockDiscoverySource {
        let mut source = MockDiscoverySource::new();
        source.expect_accounts().returning(|_| {
            Ok(vec![
                Account {
                    id: "111111111111".into(),
                    name: "Dev".into(),
                },
                Account {
                    id: "999999999999".into(),
                    name: "Locked".into(),
                },
            ])
        });
        source.expect_roles().returning(|_, account| match account.id.as_str() {
            "111111111111" => Ok(vec!["ReadOnly".into()]),
            _ => Err(AuthError::Rejected("AccessDenied".into())),
        });
        source
    }

    const TEMPLATE: Template<'static> = Template {
        name: "{account}-{role}",
        region: Some("eu-west-1"),
    };

    #[test]
    fn collisions_are_renamed_and_failed_accounts_recorded() {
        let (log, _tmp, _guard) = isolated_logger();
        let docs = documents();
        let registry = Registry::build(&docs.config);
        let session = registry.session("corp").unwrap();
        let resolver = ConflictResolver::new(Some(Strategy::AutoRename), None);

        let next = generate(&docs, session, &source(), &resolver, &TEMPLATE, &log).unwrap();

        let renamed = next
            .config
            .find(Category::Profile, "dev-readonly-sso")
            .unwrap();
        assert_eq!(renamed.body().get("sso_role_name"), Some("ReadOnly"));
        assert_eq!(renamed.body().get("region"), Some("eu-west-1"));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Locked (999999999999)");
        assert_eq!(entries[0].status, EntryStatus::Failed);
        assert_eq!(entries[1].status, EntryStatus::Renamed);
        assert_eq!(log.failure_count(), 1);
    }

    #[test]
    fn account_listing_failure_is_an_auth_error() {
        let (log, _tmp, _guard) = isolated_logger();
        let docs = documents();
        let registry = Registry::build(&docs.config);
        let mut source = MockDiscoverySource::new();
        source
            .expect_accounts()
            .returning(|_| Err(AuthError::Rejected("token expired".into())));
        let resolver = ConflictResolver::new(Some(Strategy::Skip), None);

        let err = generate(
            &docs,
            registry.session("corp").unwrap(),
            &source,
            &resolver,
            &TEMPLATE,
            &log,
        )
        .unwrap_err();
        assert!(matches!(err, ProfileError::Auth { .. }));
    }
}
