//! Refresh and discovery backends that shell out to the `aws` CLI.
//!
//! The CLI performs all network calls and the browser login; this module
//! only builds argument lists and parses the JSON it prints.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::Settings;
use crate::credentials::{AssumeRoleRequest, CredentialSet, RoleAssumer, SessionExchange};
use crate::error::AuthError;
use crate::exec;
use crate::profiles::generate::{Account, DiscoverySource};
use crate::profiles::kind::{FederatedSession, Session};

/// Backend driving the `aws` executable.
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    config_file: String,
    credentials_file: String,
    sso_cache: PathBuf,
}

impl AwsCli {
    /// Backend using the document paths from `settings`. The login cache is
    /// expected under `~/.aws/sso/cache`.
    #[must_use]
    pub fn new(settings: &Settings, home: &Path) -> Self {
        Self {
            program: "aws".to_string(),
            config_file: settings.config_file.to_string_lossy().into_owned(),
            credentials_file: settings.credentials_file.to_string_lossy().into_owned(),
            sso_cache: home.join(".aws").join("sso").join("cache"),
        }
    }

    /// Whether the executable can be found on `PATH`.
    #[must_use]
    pub fn is_available(&self) -> bool {
        exec::find(&self.program).is_some()
    }

    /// Environment pointing the CLI at the same documents as this tool.
    fn env(&self) -> [(&str, &str); 2] {
        [
            ("AWS_CONFIG_FILE", self.config_file.as_str()),
            ("AWS_SHARED_CREDENTIALS_FILE", self.credentials_file.as_str()),
        ]
    }

    fn run(&self, args: &[&str]) -> Result<String, AuthError> {
        let result = exec::run_unchecked_with_env(&self.program, args, &self.env())
            .map_err(|e| AuthError::Backend(format!("{e:#}")))?;
        if result.success {
            Ok(result.stdout)
        } else {
            Err(classify_failure(&result.stderr))
        }
    }

    /// Run the browser login for `session` attached to the terminal.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the CLI is missing or the login fails.
    pub fn login(&self, session: &Session) -> Result<(), AuthError> {
        let ok = exec::run_interactive_with_env(
            &self.program,
            &["sso", "login", "--sso-session", &session.name],
            &self.env(),
        )
        .map_err(|e| AuthError::Backend(format!("{e:#}")))?;
        if ok {
            Ok(())
        } else {
            Err(AuthError::Rejected(format!(
                "login for session '{}' did not complete",
                session.name
            )))
        }
    }

    fn access_token(&self, session: &Session) -> Result<String, AuthError> {
        if let Some(token) = find_cached_token(&self.sso_cache, session.start_url.as_str(), Utc::now()) {
            return Ok(token);
        }
        self.login(session)?;
        find_cached_token(&self.sso_cache, session.start_url.as_str(), Utc::now()).ok_or_else(|| {
            AuthError::Rejected(format!("no cached login found for session '{}'", session.name))
        })
    }
}

impl SessionExchange for AwsCli {
    fn exchange_session(
        &self,
        profile_name: &str,
        session: &Session,
        _target: &FederatedSession,
    ) -> Result<CredentialSet, AuthError> {
        if find_cached_token(&self.sso_cache, session.start_url.as_str(), Utc::now()).is_none() {
            self.login(session)?;
        }
        let out = self.run(&[
            "configure",
            "export-credentials",
            "--profile",
            profile_name,
            "--format",
            "process",
        ])?;
        parse_process_credentials(profile_name, &out)
    }
}

impl RoleAssumer for AwsCli {
    fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet, AuthError> {
        let session_name = role_session_name(&request.profile_name);
        let duration = request.duration.as_secs().to_string();
        let mut args = vec![
            "sts",
            "assume-role",
            "--role-arn",
            request.role_arn.as_str(),
            "--role-session-name",
            session_name.as_str(),
            "--duration-seconds",
            duration.as_str(),
            "--output",
            "json",
        ];
        if let Some(source) = &request.source_profile {
            args.extend(["--profile", source.as_str()]);
        }
        if let (Some(serial), Some(token)) = (&request.mfa_serial, &request.mfa_token) {
            args.extend(["--serial-number", serial.as_str(), "--token-code", token.as_str()]);
        }
        let out = self.run(&args)?;
        parse_assume_role(&request.profile_name, &out)
    }
}

impl DiscoverySource for AwsCli {
    fn accounts(&self, session: &Session) -> Result<Vec<Account>, AuthError> {
        let token = self.access_token(session)?;
        let out = self.run(&[
            "sso",
            "list-accounts",
            "--access-token",
            &token,
            "--region",
            &session.region,
            "--output",
            "json",
        ])?;
        parse_accounts(&out)
    }

    fn roles(&self, session: &Session, account: &Account) -> Result<Vec<String>, AuthError> {
        let token = find_cached_token(&self.sso_cache, session.start_url.as_str(), Utc::now())
            .ok_or_else(|| AuthError::Rejected("cached login expired during discovery".to_string()))?;
        let out = self.run(&[
            "sso",
            "list-account-roles",
            "--access-token",
            &token,
            "--account-id",
            &account.id,
            "--region",
            &session.region,
            "--output",
            "json",
        ])?;
        parse_roles(&out)
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleOutput {
    credentials: ProcessCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountList {
    #[serde(default)]
    account_list: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    account_id: String,
    #[serde(default)]
    account_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleList {
    #[serde(default)]
    role_list: Vec<RoleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleEntry {
    role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedToken {
    start_url: Option<String>,
    access_token: Option<String>,
    expires_at: Option<String>,
}

fn unreadable(what: &str, e: &serde_json::Error) -> AuthError {
    AuthError::Backend(format!("unreadable {what} output: {e}"))
}

fn into_set(profile_name: &str, raw: ProcessCredentials) -> Result<CredentialSet, AuthError> {
    let expiration = raw
        .expiration
        .as_deref()
        .map(|s| parse_timestamp(s).ok_or_else(|| AuthError::Backend(format!("invalid expiration '{s}'"))))
        .transpose()?;
    Ok(CredentialSet {
        profile_name: profile_name.to_string(),
        access_key_id: raw.access_key_id,
        secret_access_key: raw.secret_access_key,
        session_token: raw.session_token,
        expiration,
    })
}

/// Parse `configure export-credentials --format process` output.
fn parse_process_credentials(profile_name: &str, json: &str) -> Result<CredentialSet, AuthError> {
    let raw: ProcessCredentials =
        serde_json::from_str(json).map_err(|e| unreadable("export-credentials", &e))?;
    into_set(profile_name, raw)
}

/// Parse `sts assume-role` output.
fn parse_assume_role(profile_name: &str, json: &str) -> Result<CredentialSet, AuthError> {
    let raw: AssumeRoleOutput =
        serde_json::from_str(json).map_err(|e| unreadable("assume-role", &e))?;
    into_set(profile_name, raw.credentials)
}

fn parse_accounts(json: &str) -> Result<Vec<Account>, AuthError> {
    let list: AccountList =
        serde_json::from_str(json).map_err(|e| unreadable("list-accounts", &e))?;
    Ok(list
        .account_list
        .into_iter()
        .map(|a| Account {
            name: a.account_name.unwrap_or_else(|| a.account_id.clone()),
            id: a.account_id,
        })
        .collect())
}

fn parse_roles(json: &str) -> Result<Vec<String>, AuthError> {
    let list: RoleList =
        serde_json::from_str(json).map_err(|e| unreadable("list-account-roles", &e))?;
    Ok(list.role_list.into_iter().map(|r| r.role_name).collect())
}

/// RFC 3339, or the `...UTC` suffix older CLI versions write to the cache.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let normalised = raw
        .strip_suffix("UTC")
        .map_or_else(|| raw.to_string(), |s| format!("{s}Z"));
    DateTime::parse_from_rfc3339(&normalised)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Map CLI error output to an [`AuthError`].
fn classify_failure(stderr: &str) -> AuthError {
    let message = stderr.trim().lines().last().unwrap_or_default().to_string();
    let lower = stderr.to_lowercase();
    if lower.contains("multifactorauthentication") || lower.contains("mfa one time pass code") {
        AuthError::BadToken(message)
    } else if [
        "accessdenied",
        "expiredtoken",
        "unauthorizedexception",
        "invalidclienttokenid",
        "token has expired",
        "session has expired",
        "forbiddenexception",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        AuthError::Rejected(message)
    } else {
        AuthError::Backend(message)
    }
}

/// Role session names allow `[\w+=,.@-]` and at most 64 characters.
fn role_session_name(profile_name: &str) -> String {
    format!("profman-{profile_name}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "_+=,.@-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(64)
        .collect()
}

/// The newest unexpired access token cached for `start_url`.
fn find_cached_token(cache_dir: &Path, start_url: &str, now: DateTime<Utc>) -> Option<String> {
    let wanted = start_url.trim_end_matches('/');
    fs::read_dir(cache_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter_map(|path| fs::read_to_string(path).ok())
        .filter_map(|text| serde_json::from_str::<CachedToken>(&text).ok())
        .filter(|t| {
            t.start_url
                .as_deref()
                .is_some_and(|u| u.trim_end_matches('/') == wanted)
        })
        .filter_map(|t| {
            let expires = parse_timestamp(t.expires_at.as_deref()?)?;
            Some((expires, t.access_token?))
        })
        .filter(|(expires, _)| *expires > now)
        .max_by_key(|(expires, _)| *expires)
        .map(|(_, token)| token)
}
