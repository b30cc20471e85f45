//! Typed profile and session views, and the rule that classifies a section body.
use url::Url;

use super::validation::WarningKind;
use crate::config::document::Body;

/// Profile fields identifying a federated-session profile.
pub const FEDERATED_KEYS: &[&str] = &["sso_session", "sso_account_id", "sso_role_name", "sso_start_url"];
/// Profile fields identifying an assumed-role profile.
pub const ROLE_KEYS: &[&str] = &["role_arn", "source_profile", "credential_source", "mfa_serial"];
/// Profile fields identifying a static-key profile.
pub const STATIC_KEYS: &[&str] = &["aws_access_key_id", "aws_secret_access_key"];

/// A typed profile derived from a `profile` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name.
    pub name: String,
    /// Default region, if configured.
    pub region: Option<String>,
    /// Kind-specific fields.
    pub kind: ProfileKind,
    /// `false` when a validation warning applies (e.g. a dangling session reference).
    pub valid: bool,
}

/// The three supported profile kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileKind {
    /// Credentials obtained through a browser-authenticated session.
    FederatedSession(FederatedSession),
    /// Credentials obtained by assuming a role.
    AssumedRole(AssumedRole),
    /// Long-term keys stored directly in the credentials document.
    StaticKey,
}

/// Fields of a federated-session profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedSession {
    /// Name of the referenced `sso-session` section.
    pub session_name: String,
    /// Target account.
    pub account_id: String,
    /// Target permission set / role.
    pub role_name: String,
}

/// Fields of an assumed-role profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumedRole {
    /// Role to assume.
    pub role_arn: String,
    /// Profile whose credentials sign the request.
    pub source_profile: Option<String>,
    /// Non-profile credential source (`Environment`, `Ec2InstanceMetadata`, ...).
    pub credential_source: Option<String>,
    /// Second-factor device; when set a token is required.
    pub mfa_serial: Option<String>,
}

impl ProfileKind {
    /// Short label used in listings.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FederatedSession(_) => "federated",
            Self::AssumedRole(_) => "assumed-role",
            Self::StaticKey => "static-key",
        }
    }

    /// Suffix appended when auto-renaming a colliding profile of this kind.
    #[must_use]
    pub const fn rename_suffix(&self) -> &'static str {
        match self {
            Self::FederatedSession(_) => "sso",
            Self::AssumedRole(_) => "role",
            Self::StaticKey => "key",
        }
    }
}

/// Result of classifying a profile body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Exactly one kind, with all required fields.
    Kind(ProfileKind),
    /// The body is not usable on its own.
    Invalid(WarningKind),
}

/// Classify a profile body into exactly one kind.
///
/// Precedence is total: a body carrying fields of more than one kind is
/// rejected as [`WarningKind::MixedKinds`] rather than guessing a winner, and
/// a body with none is [`WarningKind::UnknownKind`].
///
/// # Examples
///
/// ```
/// use profman_cli::config::document::Body;
/// use profman_cli::profiles::kind::{classify, Classification};
///
/// let body = Body::new().with("role_arn", "arn:aws:iam::1:role/x").with("source_profile", "base");
/// assert!(matches!(classify(&body), Classification::Kind(k) if k.label() == "assumed-role"));
/// ```
#[must_use]
pub fn classify(body: &Body) -> Classification {
    let has_any = |keys: &[&str]| keys.iter().any(|k| body.contains_key(k));
    let present: Vec<&'static str> = [
        ("federated", has_any(FEDERATED_KEYS)),
        ("assumed-role", has_any(ROLE_KEYS)),
        ("static-key", has_any(STATIC_KEYS)),
    ]
    .into_iter()
    .filter_map(|(kind, present)| present.then_some(kind))
    .collect();

    match present.as_slice() {
        [] => Classification::Invalid(WarningKind::UnknownKind),
        ["federated"] => federated(body),
        ["assumed-role"] => assumed_role(body),
        ["static-key"] => static_key(body),
        _ => Classification::Invalid(WarningKind::MixedKinds(present)),
    }
}

fn required<'a>(body: &'a Body, kind: &'static str, key: &'static str) -> Result<&'a str, WarningKind> {
    body.get(key)
        .filter(|v| !v.is_empty())
        .ok_or(WarningKind::Incomplete { kind, missing: key })
}

fn federated_fields(body: &Body) -> Result<FederatedSession, WarningKind> {
    Ok(FederatedSession {
        session_name: required(body, "federated", "sso_session")?.to_string(),
        account_id: required(body, "federated", "sso_account_id")?.to_string(),
        role_name: required(body, "federated", "sso_role_name")?.to_string(),
    })
}

fn federated(body: &Body) -> Classification {
    match federated_fields(body) {
        Ok(f) => Classification::Kind(ProfileKind::FederatedSession(f)),
        Err(w) => Classification::Invalid(w),
    }
}

fn assumed_role(body: &Body) -> Classification {
    let role_arn = match required(body, "assumed-role", "role_arn") {
        Ok(arn) => arn.to_string(),
        Err(w) => return Classification::Invalid(w),
    };
    let opt = |key: &str| body.get(key).filter(|v| !v.is_empty()).map(String::from);
    let role = AssumedRole {
        role_arn,
        source_profile: opt("source_profile"),
        credential_source: opt("credential_source"),
        mfa_serial: opt("mfa_serial"),
    };
    if role.source_profile.is_none() && role.credential_source.is_none() && role.mfa_serial.is_none() {
        return Classification::Invalid(WarningKind::Incomplete {
            kind: "assumed-role",
            missing: "source_profile",
        });
    }
    Classification::Kind(ProfileKind::AssumedRole(role))
}

fn static_key(body: &Body) -> Classification {
    for key in STATIC_KEYS {
        if let Err(w) = required(body, "static-key", key) {
            return Classification::Invalid(w);
        }
    }
    Classification::Kind(ProfileKind::StaticKey)
}

/// A typed view of an `sso-session` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session name.
    pub name: String,
    /// Portal start URL.
    pub start_url: Url,
    /// Region of the identity center instance.
    pub region: String,
    /// OAuth registration scopes.
    pub registration_scopes: Vec<String>,
}

impl Session {
    /// Build a session from its section body.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if the start URL is missing or
    /// malformed, or the region is missing.
    pub fn from_body(name: &str, body: &Body) -> Result<Self, String> {
        let raw_url = body
            .get("sso_start_url")
            .filter(|v| !v.is_empty())
            .ok_or("missing 'sso_start_url'")?;
        let start_url = Url::parse(raw_url)
            .map_err(|e| format!("malformed sso_start_url '{raw_url}': {e}"))?;
        if !matches!(start_url.scheme(), "https" | "http") || start_url.host_str().is_none() {
            return Err(format!("sso_start_url '{raw_url}' is not an http(s) URL"));
        }
        let region = body
            .get("sso_region")
            .filter(|v| !v.is_empty())
            .ok_or("missing 'sso_region'")?
            .to_string();
        let registration_scopes = body
            .get("sso_registration_scopes")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            name: name.to_string(),
            start_url,
            region,
            registration_scopes,
        })
    }

    /// Console deep link that signs into `account_id` as `role_name`.
    #[must_use]
    pub fn console_url(&self, account_id: &str, role_name: &str) -> String {
        let base = self.start_url.as_str().trim_end_matches('/');
        format!("{base}/#/console?account_id={account_id}&role_name={role_name}")
    }
}
