//! Typed, validated view of the profiles and sessions in a document.
//!
//! The registry is recomputed from the documents on every load and never
//! mutates sections itself.
use std::collections::HashSet;

use super::kind::{Classification, Profile, ProfileKind, STATIC_KEYS, Session, classify};
use super::validation::{ValidationWarning, WarningKind};
use crate::config::document::{Category, Document};
use crate::error::ProfileError;

const CONFIG_SOURCE: &str = "config";
const CREDENTIALS_SOURCE: &str = "credentials";

/// Profiles, sessions, and warnings derived from the documents.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    profiles: Vec<Profile>,
    sessions: Vec<Session>,
    warnings: Vec<ValidationWarning>,
}

impl Registry {
    /// Build the registry from the config document alone.
    ///
    /// Profiles whose credentials live only in the credentials document are
    /// reported as [`WarningKind::UnknownKind`]; use
    /// [`build_with_credentials`](Self::build_with_credentials) to recognise them.
    #[must_use]
    pub fn build(config: &Document) -> Self {
        Self::build_inner(config, None)
    }

    /// Build the registry from both documents.
    ///
    /// A config profile without kind fields whose credentials entry carries a
    /// key pair is a static-key profile. Credentials entries without a config
    /// section are static-key profiles when they hold long-term keys (no
    /// session token) and orphans otherwise.
    #[must_use]
    pub fn build_with_credentials(config: &Document, credentials: &Document) -> Self {
        Self::build_inner(config, Some(credentials))
    }

    fn build_inner(config: &Document, credentials: Option<&Document>) -> Self {
        let mut registry = Self::default();
        let session_names: HashSet<&str> = config
            .of_category(Category::SsoSession)
            .map(|s| s.name())
            .collect();

        let mut seen_sessions = HashSet::new();
        for section in config.of_category(Category::SsoSession) {
            if !seen_sessions.insert(section.name()) {
                registry.warn(CONFIG_SOURCE, section.name(), WarningKind::DuplicateName);
                continue;
            }
            match Session::from_body(section.name(), section.body()) {
                Ok(session) => registry.sessions.push(session),
                Err(reason) => registry.warn(
                    CONFIG_SOURCE,
                    section.name(),
                    WarningKind::InvalidSession(reason),
                ),
            }
        }

        let mut seen_profiles = HashSet::new();
        for section in config.of_category(Category::Profile) {
            let name = section.name();
            if !seen_profiles.insert(name) {
                registry.warn(CONFIG_SOURCE, name, WarningKind::DuplicateName);
                continue;
            }
            let region = section.body().get("region").map(String::from);
            let kind = match classify(section.body()) {
                Classification::Kind(kind) => kind,
                Classification::Invalid(WarningKind::UnknownKind)
                    if credentials.is_some_and(|c| has_static_keys(c, name)) =>
                {
                    ProfileKind::StaticKey
                }
                Classification::Invalid(warning) => {
                    registry.warn(CONFIG_SOURCE, name, warning);
                    continue;
                }
            };

            let mut valid = true;
            if let ProfileKind::FederatedSession(f) = &kind
                && !session_names.contains(f.session_name.as_str())
            {
                registry.warn(
                    CONFIG_SOURCE,
                    name,
                    WarningKind::DanglingSession(f.session_name.clone()),
                );
                valid = false;
            }

            registry.profiles.push(Profile {
                name: name.to_string(),
                region,
                kind,
                valid,
            });
        }

        if let Some(credentials) = credentials {
            let mut seen_entries = HashSet::new();
            for entry in credentials.of_category(Category::Profile) {
                let name = entry.name();
                if !seen_entries.insert(name) {
                    registry.warn(CREDENTIALS_SOURCE, name, WarningKind::DuplicateName);
                    continue;
                }
                if seen_profiles.contains(name) {
                    continue;
                }
                if entry.body().contains_key("aws_session_token") {
                    registry.warn(CREDENTIALS_SOURCE, name, WarningKind::OrphanedCredentials);
                } else if has_static_keys(credentials, name) {
                    registry.profiles.push(Profile {
                        name: name.to_string(),
                        region: entry.body().get("region").map(String::from),
                        kind: ProfileKind::StaticKey,
                        valid: true,
                    });
                } else {
                    registry.warn(CREDENTIALS_SOURCE, name, WarningKind::UnknownKind);
                }
            }
        }

        registry
    }

    fn warn(&mut self, source: &str, item: &str, kind: WarningKind) {
        self.warnings.push(ValidationWarning::new(source, item, kind));
    }

    /// All typed profiles, in document order.
    #[must_use]
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// All valid sessions, in document order.
    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Non-fatal findings.
    #[must_use]
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    /// Profile by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no typed profile has this name.
    pub fn lookup(&self, name: &str) -> Result<&Profile, ProfileError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ProfileError::profile_not_found(name))
    }

    /// Session by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no valid session has this name.
    pub fn session(&self, name: &str) -> Result<&Session, ProfileError> {
        self.sessions
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ProfileError::session_not_found(name))
    }

    /// Every federated profile that references `session_name`.
    #[must_use]
    pub fn all_of_session(&self, session_name: &str) -> Vec<&Profile> {
        self.profiles
            .iter()
            .filter(|p| {
                matches!(&p.kind, ProfileKind::FederatedSession(f) if f.session_name == session_name)
            })
            .collect()
    }
}

fn has_static_keys(credentials: &Document, name: &str) -> bool {
    credentials
        .find(Category::Profile, name)
        .is_some_and(|entry| STATIC_KEYS.iter().all(|k| entry.body().contains_key(k)))
}
