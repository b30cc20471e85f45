//! Export bundles and their import.
//!
//! A bundle is a config-flavoured document holding every session and profile
//! section, optionally with long-term keys folded into their profile
//! sections, so that it can be re-imported on another machine.
use std::collections::HashMap;

use super::conflict::{ConflictResolver, Proposal, Resolved};
use crate::config::Documents;
use crate::config::document::{Body, Category, Document, Flavor, Section};
use crate::credentials::set::{CREDENTIAL_KEYS, CredentialSet};
use crate::error::ProfileError;

/// First line of every exported bundle.
pub const BUNDLE_HEADER: &str = "# profman export bundle";

/// Build a self-contained bundle from both documents.
///
/// Sessions come first, then profiles, each in document order. With
/// `include_credentials`, long-term keys are added to their profile's
/// section (or to a new one for credentials-only profiles); short-lived
/// credential sets are never exported.
#[must_use]
pub fn export(config: &Document, credentials: &Document, include_credentials: bool) -> Document {
    let mut sections: Vec<Section> = Vec::new();
    let mut push = |section: Section| {
        if !sections
            .iter()
            .any(|s| s.is(section.category(), section.name()))
        {
            sections.push(section);
        }
    };

    for session in config.of_category(Category::SsoSession) {
        push(session.clone());
    }

    let static_keys = |name: &str| -> Option<CredentialSet> {
        credentials
            .find(Category::Profile, name)
            .and_then(|entry| CredentialSet::from_section(entry).ok())
            .filter(CredentialSet::is_static)
    };

    for profile in config.of_category(Category::Profile) {
        match static_keys(profile.name()).filter(|_| include_credentials) {
            Some(set) => push(profile.with_body(set.apply_to(profile.body()))),
            None => push(profile.clone()),
        }
    }

    if include_credentials {
        for entry in credentials.of_category(Category::Profile) {
            if config.contains(Category::Profile, entry.name()) {
                continue;
            }
            if static_keys(entry.name()).is_some() {
                push(Section::new(
                    Category::Profile,
                    entry.name(),
                    entry.body().clone(),
                ));
            }
        }
    }

    sections
        .into_iter()
        .fold(
            Document::empty(Flavor::Config).with_preamble(BUNDLE_HEADER),
            |doc, section| doc.upsert_section(section),
        )
}

/// Result of importing a bundle.
#[derive(Debug)]
pub struct ImportResult {
    /// The merged documents.
    pub documents: Documents,
    /// Per-section results, sessions first, in bundle order.
    pub results: Vec<(Proposal, Result<Resolved, ProfileError>)>,
    /// Names of bundle sections that are neither sessions nor profiles.
    pub ignored: Vec<String>,
}

impl ImportResult {
    /// Number of sections that changed a document.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| r.as_ref().is_ok_and(|r| r.outcome.is_change()))
            .count()
    }
}

/// Merge `bundle` into `current`.
///
/// Sessions are resolved first; profiles referencing a session that was
/// renamed are rewritten to the new name. A profile carrying key material is
/// compared together with the keys already stored for it, and on a change
/// its keys move to the credentials document under the resolved name.
/// Failures are isolated per section.
#[must_use]
pub fn import(bundle: &Document, current: &Documents, resolver: &ConflictResolver<'_>) -> ImportResult {
    let mut config = current.config.clone();
    let mut credentials = current.credentials.clone();
    let mut results = Vec::new();
    let mut session_names: HashMap<String, String> = HashMap::new();

    for section in bundle.of_category(Category::SsoSession) {
        let proposal = Proposal::session(section.name(), section.body().clone());
        let result = resolver.resolve(&config, &proposal).map(|(next, resolved)| {
            config = next;
            session_names.insert(proposal.name.clone(), resolved.name.clone());
            resolved
        });
        results.push((proposal, result));
    }

    for section in bundle.of_category(Category::Profile) {
        let (mut settings, keys) = split_credentials(section.body());
        if let Some(renamed) = settings
            .get("sso_session")
            .and_then(|s| session_names.get(s))
        {
            settings.set("sso_session", renamed.as_str());
        }

        if settings.is_empty() {
            let proposal = Proposal::profile(section.name(), keys);
            let result = resolver
                .resolve(&credentials, &proposal)
                .map(|(next, resolved)| {
                    credentials = next;
                    resolved
                });
            results.push((proposal, result));
            continue;
        }

        if keys.is_empty() {
            let proposal = Proposal::profile(section.name(), settings);
            let result = resolver.resolve(&config, &proposal).map(|(next, resolved)| {
                config = next;
                resolved
            });
            results.push((proposal, result));
            continue;
        }

        // Settings and keys collide as one profile, so differing keys under
        // an identical config body still go through the strategy.
        let proposal = Proposal::profile(section.name(), joined(&settings, &keys));
        let view = with_stored_keys(&config, &credentials);
        let result = resolver.resolve(&view, &proposal).map(|(_, resolved)| {
            if resolved.outcome.is_change() {
                config = place_settings(&config, &resolved.name, settings);
                credentials = store_keys(&credentials, &resolved.name, &keys);
            }
            resolved
        });
        results.push((proposal, result));
    }

    let ignored = bundle
        .of_category(Category::Opaque)
        .map(|s| s.name().to_string())
        .collect();

    ImportResult {
        documents: Documents {
            config,
            credentials,
        },
        results,
        ignored,
    }
}

/// Split a profile body into its settings and its credential keys.
fn split_credentials(body: &Body) -> (Body, Body) {
    body.iter()
        .fold((Body::new(), Body::new()), |(settings, keys), (k, v)| {
            if CREDENTIAL_KEYS.contains(&k) {
                (settings, keys.with(k, v))
            } else {
                (settings.with(k, v), keys)
            }
        })
}

/// `settings` followed by the credential keys of `keys` in canonical order.
fn joined(settings: &Body, keys: &Body) -> Body {
    CREDENTIAL_KEYS
        .iter()
        .filter_map(|k| keys.get(k).map(|v| (*k, v)))
        .fold(settings.clone(), |body, (k, v)| body.with(k, v))
}

/// The config document with every profile carrying the keys stored for it
/// in the credentials document.
fn with_stored_keys(config: &Document, credentials: &Document) -> Document {
    credentials
        .of_category(Category::Profile)
        .fold(config.clone(), |view, entry| {
            let (_, stored) = split_credentials(entry.body());
            let section = match view.find(Category::Profile, entry.name()) {
                Some(existing) => {
                    let (settings, _) = split_credentials(existing.body());
                    existing.with_body(joined(&settings, &stored))
                }
                None => Section::new(Category::Profile, entry.name(), joined(&Body::new(), &stored)),
            };
            view.upsert_section(section)
        })
}

/// Put `settings` into the config section `name`, leaving an identical
/// section untouched.
fn place_settings(config: &Document, name: &str, settings: Body) -> Document {
    match config.find(Category::Profile, name) {
        Some(existing) if existing.body() == &settings => config.clone(),
        Some(existing) => config.upsert_section(existing.with_body(settings)),
        None => config.upsert_section(Section::new(Category::Profile, name, settings)),
    }
}

/// Write `keys` into the credentials entry `name`, keeping unrelated keys.
fn store_keys(credentials: &Document, name: &str, keys: &Body) -> Document {
    let mut body = credentials
        .find(Category::Profile, name)
        .map_or_else(Body::new, |entry| entry.body().clone());
    for key in CREDENTIAL_KEYS {
        match keys.get(key) {
            Some(value) => body.set(*key, value),
            None => {
                body.remove(key);
            }
        }
    }
    credentials.upsert_section(Section::new(Category::Profile, name, body))
}
