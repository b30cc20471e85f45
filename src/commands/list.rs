//! Command: list profiles, sessions, and credential freshness.
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};

use super::CommandSetup;
use crate::config::Settings;
use crate::config::document::{Category, Document};
use crate::credentials::set::format_expiration;
use crate::credentials::{CredentialSet, CredentialState};
use crate::logging::Logger;
use crate::profiles::{ProfileKind, Registry};

/// Print every profile and session.
///
/// # Errors
///
/// Returns an error if the documents cannot be loaded.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings, log: &Logger) -> Result<()> {
    let setup = CommandSetup::init(settings, log)?;
    let margin = TimeDelta::from_std(settings.safety_margin).unwrap_or(TimeDelta::MAX);
    let text = render(
        &setup.registry,
        &setup.documents.credentials,
        Utc::now(),
        margin,
    );
    if text.is_empty() {
        log.info("no profiles found");
    } else {
        println!("{text}");
    }
    Ok(())
}

/// Render the profile and session tables.
#[must_use]
pub fn render(
    registry: &Registry,
    credentials: &Document,
    now: DateTime<Utc>,
    margin: TimeDelta,
) -> String {
    let mut blocks = Vec::new();

    if !registry.profiles().is_empty() {
        let mut rows = vec![header(&["PROFILE", "KIND", "REGION", "SOURCE", "CREDENTIALS"])];
        for profile in registry.profiles() {
            let source = match &profile.kind {
                ProfileKind::FederatedSession(f) => {
                    format!("{}/{}/{}", f.session_name, f.account_id, f.role_name)
                }
                ProfileKind::AssumedRole(r) => r.role_arn.clone(),
                ProfileKind::StaticKey => "-".to_string(),
            };
            rows.push(vec![
                profile.name.clone(),
                profile.kind.label().to_string(),
                profile.region.clone().unwrap_or_else(|| "-".to_string()),
                source,
                credential_column(credentials, &profile.name, now, margin),
            ]);
        }
        blocks.push(table(&rows));
    }

    if !registry.sessions().is_empty() {
        let mut rows = vec![header(&["SESSION", "START URL", "REGION"])];
        for session in registry.sessions() {
            rows.push(vec![
                session.name.clone(),
                session.start_url.to_string(),
                session.region.clone(),
            ]);
        }
        blocks.push(table(&rows));
    }

    blocks.join("\n\n")
}

fn header(titles: &[&str]) -> Vec<String> {
    titles.iter().map(|t| (*t).to_string()).collect()
}

fn credential_column(credentials: &Document, name: &str, now: DateTime<Utc>, margin: TimeDelta) -> String {
    let Some(section) = credentials.find(Category::Profile, name) else {
        return CredentialState::Absent.label().to_string();
    };
    let Ok(set) = CredentialSet::from_section(section) else {
        return "invalid".to_string();
    };
    if set.is_static() {
        return "long-term".to_string();
    }
    let state = CredentialState::evaluate(Some(&set), now, margin);
    set.expiration.map_or_else(
        || state.label().to_string(),
        |at| format!("{} {}", state.label(), format_expiration(at)),
    )
}

/// Left-aligned columns separated by two spaces.
fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(String::len)
                .max()
                .unwrap_or(0)
        })
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::Flavor;
    use chrono::TimeZone as _;

    const CONFIG: &str = "\
[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1

[profile dev]
sso_session = corp
sso_account_id = 111111111111
sso_role_name = Developer
region = eu-west-1

[profile admin]
role_arn = arn:aws:iam::222222222222:role/Admin
source_profile = dev
";

    const CREDENTIALS: &str = "\
[dev]
aws_access_key_id = ASIADEV
aws_secret_access_key = dev-secret
aws_session_token = dev-token
expiration = 2026-10-19T12:00:00Z

[ci]
aws_access_key_id = AKIACI
aws_secret_access_key = ci-secret
";

    #[test]
    fn renders_profiles_and_sessions() {
        let config = Document::parse(CONFIG, Flavor::Config).unwrap();
        let credentials = Document::parse(CREDENTIALS, Flavor::Credentials).unwrap();
        let registry = Registry::build_with_credentials(&config, &credentials);
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 11, 58, 0).unwrap();

        let text = render(&registry, &credentials, now, TimeDelta::minutes(5));
        insta::assert_snapshot!(text, @r"
        PROFILE  KIND          REGION     SOURCE                                CREDENTIALS
        dev      federated     eu-west-1  corp/111111111111/Developer           expiring 2026-10-19T12:00:00Z
        admin    assumed-role  -          arn:aws:iam::222222222222:role/Admin  absent
        ci       static-key    -          -                                     long-term

        SESSION  START URL                       REGION
        corp     https://corp.awsapps.com/start  us-east-1
        ");
    }

    #[test]
    fn empty_registry_renders_nothing() {
        let empty = Document::empty(Flavor::Config);
        let registry = Registry::build(&empty);
        assert!(render(&registry, &empty, Utc::now(), TimeDelta::minutes(5)).is_empty());
    }
}
