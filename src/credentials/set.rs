//! A cached credential set and its mapping to a credentials-document section.
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::document::{Body, Category, Section};
use crate::error::ProfileError;

pub(crate) const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub(crate) const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub(crate) const SESSION_TOKEN: &str = "aws_session_token";
pub(crate) const EXPIRATION: &str = "expiration";

/// Keys owned by a credential set; everything else in an entry is left alone.
pub const CREDENTIAL_KEYS: &[&str] = &[ACCESS_KEY_ID, SECRET_ACCESS_KEY, SESSION_TOKEN, EXPIRATION];

/// Access keys for one profile, optionally short-lived.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Profile the set belongs to.
    pub profile_name: String,
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Session token; absent for static keys.
    pub session_token: Option<String>,
    /// Expiry; absent means the set never expires.
    pub expiration: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("profile_name", &self.profile_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl CredentialSet {
    /// Read a set from a credentials-document section.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Config`] if the key pair is missing or the
    /// expiration is not an RFC 3339 timestamp.
    pub fn from_section(section: &Section) -> Result<Self, ProfileError> {
        let name = section.name();
        let body = section.body();
        let field = |key: &str| {
            body.get(key)
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or_else(|| ProfileError::Config {
                    profile: name.to_string(),
                    message: format!("credentials entry is missing '{key}'"),
                })
        };
        let expiration = body
            .get(EXPIRATION)
            .filter(|v| !v.is_empty())
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| ProfileError::Config {
                        profile: name.to_string(),
                        message: format!("invalid expiration '{raw}': {e}"),
                    })
            })
            .transpose()?;

        Ok(Self {
            profile_name: name.to_string(),
            access_key_id: field(ACCESS_KEY_ID)?,
            secret_access_key: field(SECRET_ACCESS_KEY)?,
            session_token: body
                .get(SESSION_TOKEN)
                .filter(|v| !v.is_empty())
                .map(String::from),
            expiration,
        })
    }

    /// Write this set into `base`, replacing credential keys and keeping others.
    #[must_use]
    pub fn apply_to(&self, base: &Body) -> Body {
        let mut body = base.clone();
        body.set(ACCESS_KEY_ID, &self.access_key_id);
        body.set(SECRET_ACCESS_KEY, &self.secret_access_key);
        match &self.session_token {
            Some(token) => body.set(SESSION_TOKEN, token),
            None => {
                body.remove(SESSION_TOKEN);
            }
        }
        match self.expiration {
            Some(at) => body.set(EXPIRATION, format_expiration(at)),
            None => {
                body.remove(EXPIRATION);
            }
        }
        body
    }

    /// A fresh credentials-document section holding only this set.
    #[must_use]
    pub fn to_section(&self) -> Section {
        Section::new(
            Category::Profile,
            self.profile_name.clone(),
            self.apply_to(&Body::new()),
        )
    }

    /// Whether this set is long-term (no session token and no expiry).
    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.session_token.is_none() && self.expiration.is_none()
    }
}

/// RFC 3339 with second precision and a `Z` suffix.
#[must_use]
pub fn format_expiration(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::document::{Document, Flavor};
    use chrono::TimeZone as _;

    fn entry(text: &str) -> Section {
        Document::parse(text, Flavor::Credentials)
            .unwrap()
            .sections()
            .first()
            .cloned()
            .unwrap()
    }

    #[test]
    fn reads_temporary_set() {
        let set = CredentialSet::from_section(&entry(
            "[dev]\naws_access_key_id = ASIA\naws_secret_access_key = s\naws_session_token = t\nexpiration = 2026-10-19T12:00:00Z\n",
        ))
        .unwrap();
        assert_eq!(set.profile_name, "dev");
        assert_eq!(set.session_token.as_deref(), Some("t"));
        assert_eq!(
            set.expiration,
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap())
        );
        assert!(!set.is_static());
    }

    #[test]
    fn offset_expiration_is_normalised_to_utc() {
        let set = CredentialSet::from_section(&entry(
            "[dev]\naws_access_key_id = a\naws_secret_access_key = s\nexpiration = 2026-10-19T14:00:00+02:00\n",
        ))
        .unwrap();
        assert_eq!(
            set.expiration.map(format_expiration).as_deref(),
            Some("2026-10-19T12:00:00Z")
        );
    }

    #[test]
    fn missing_secret_is_config_error() {
        let err = CredentialSet::from_section(&entry("[dev]\naws_access_key_id = a\n")).unwrap_err();
        assert!(matches!(err, ProfileError::Config { .. }));
    }

    #[test]
    fn bad_expiration_is_config_error() {
        let err = CredentialSet::from_section(&entry(
            "[dev]\naws_access_key_id = a\naws_secret_access_key = s\nexpiration = tomorrow\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("invalid expiration"));
    }

    #[test]
    fn apply_keeps_unrelated_keys_and_drops_stale_token() {
        let base = Body::new()
            .with("region", "eu-west-1")
            .with(SESSION_TOKEN, "old");
        let set = CredentialSet {
            profile_name: "dev".into(),
            access_key_id: "AKIA".into(),
            secret_access_key: "s".into(),
            session_token: None,
            expiration: None,
        };
        let body = set.apply_to(&base);
        assert_eq!(body.get("region"), Some("eu-west-1"));
        assert_eq!(body.get(SESSION_TOKEN), None);
        assert_eq!(body.get(ACCESS_KEY_ID), Some("AKIA"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let set = CredentialSet {
            profile_name: "dev".into(),
            access_key_id: "AKIA".into(),
            secret_access_key: "very-secret".into(),
            session_token: Some("token-value".into()),
            expiration: None,
        };
        let shown = format!("{set:?}");
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("token-value"));
    }
}
