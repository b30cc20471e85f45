//! Credential lifecycle: freshness checks, refresh dispatch, and persistence.
//!
//! Each operation touches exactly one profile's credentials entry. Writes are
//! staged to a temporary file and committed only after the cancellation flag
//! has been checked, so an interrupted refresh never changes the document.
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::backend::{AssumeRoleRequest, Backends, Cancellation};
use super::set::CredentialSet;
use super::state::CredentialState;
use crate::config::Settings;
use crate::config::document::{Category, Document, Flavor};
use crate::config::store::{self, FileMode, StagedWrite};
use crate::error::{AuthError, ProfileError};
use crate::logging::{EntryStatus, Log};
use crate::profiles::kind::{AssumedRole, FederatedSession, Profile, ProfileKind};
use crate::profiles::registry::Registry;

/// Maximum number of MFA prompts for one role assumption.
const MFA_ATTEMPTS: u32 = 2;

/// What [`CredentialManager::ensure_fresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cached credentials were fresh and left alone.
    Cached,
    /// New credentials were obtained and written.
    Refreshed,
}

impl RefreshOutcome {
    /// Status recorded in the batch summary.
    #[must_use]
    pub const fn status(self) -> EntryStatus {
        match self {
            Self::Cached => EntryStatus::Cached,
            Self::Refreshed => EntryStatus::Refreshed,
        }
    }
}

/// Drives refresh of cached credential sets and persists the results.
pub struct CredentialManager<'a> {
    path: PathBuf,
    config_path: PathBuf,
    margin: TimeDelta,
    role_duration: Duration,
    backends: Backends<'a>,
    cancel: Cancellation,
    log: &'a dyn Log,
}

impl std::fmt::Debug for CredentialManager<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("path", &self.path)
            .field("margin", &self.margin)
            .field("role_duration", &self.role_duration)
            .finish_non_exhaustive()
    }
}

impl<'a> CredentialManager<'a> {
    /// Create a manager for the credentials document named in `settings`.
    #[must_use]
    pub fn new(
        settings: &Settings,
        backends: Backends<'a>,
        cancel: Cancellation,
        log: &'a dyn Log,
    ) -> Self {
        Self {
            path: settings.credentials_file.clone(),
            config_path: settings.config_file.clone(),
            margin: TimeDelta::from_std(settings.safety_margin).unwrap_or(TimeDelta::MAX),
            role_duration: settings.assume_role_duration,
            backends,
            cancel,
            log,
        }
    }

    /// Path of the credentials document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document, ProfileError> {
        store::load(&self.path, Flavor::Credentials)
    }

    /// The credential set cached for `profile_name`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read, or the entry exists
    /// but is malformed.
    pub fn current(&self, profile_name: &str) -> Result<Option<CredentialSet>, ProfileError> {
        self.load()?
            .find(Category::Profile, profile_name)
            .map(CredentialSet::from_section)
            .transpose()
    }

    /// Freshness of the credentials cached for `profile_name` at `now`.
    ///
    /// # Errors
    ///
    /// See [`current`](Self::current).
    pub fn state(&self, profile_name: &str, now: DateTime<Utc>) -> Result<CredentialState, ProfileError> {
        let current = self.current(profile_name)?;
        Ok(CredentialState::evaluate(current.as_ref(), now, self.margin))
    }

    /// Long-term keys for a static-key profile: its credentials entry, or
    /// failing that the key pair written into its config section.
    fn static_keys(&self, profile_name: &str) -> Result<Option<CredentialSet>, ProfileError> {
        if let Some(set) = self.current(profile_name)? {
            return Ok(Some(set));
        }
        store::load(&self.config_path, Flavor::Config)?
            .find(Category::Profile, profile_name)
            .map(CredentialSet::from_section)
            .transpose()
    }

    /// The cached set for `profile` and its freshness.
    ///
    /// A malformed entry of a refreshable profile counts as expired so that
    /// the next login replaces it.
    fn cached(
        &self,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<(CredentialState, Option<CredentialSet>), ProfileError> {
        let current = match &profile.kind {
            ProfileKind::StaticKey => self.static_keys(&profile.name)?,
            _ => match self.current(&profile.name) {
                Ok(current) => current,
                Err(ProfileError::Config { message, .. }) => {
                    self.log.debug(&format!(
                        "discarding malformed entry for {}: {message}",
                        profile.name
                    ));
                    return Ok((CredentialState::Expired, None));
                }
                Err(e) => return Err(e),
            },
        };
        Ok((CredentialState::evaluate(current.as_ref(), now, self.margin), current))
    }

    /// Whether `profile` must be refreshed before its credentials are used.
    ///
    /// Static keys never need a refresh; a static entry carrying an expiry
    /// that has been reached is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Config`] for an expired static entry or a
    /// static-key profile with no keys in either document, or an I/O error
    /// from reading them.
    pub fn need_refresh(&self, profile: &Profile, now: DateTime<Utc>) -> Result<bool, ProfileError> {
        let (state, _) = self.cached(profile, now)?;
        if profile.kind == ProfileKind::StaticKey {
            return match state {
                CredentialState::Expired => Err(static_expired(&profile.name)),
                CredentialState::Absent => Err(ProfileError::Config {
                    profile: profile.name.clone(),
                    message: "static-key profile has no key pair".to_string(),
                }),
                CredentialState::Fresh | CredentialState::Expiring => Ok(false),
            };
        }
        Ok(state.needs_refresh())
    }

    /// The cached credentials for `profile`, only if they are fresh.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Config`] when nothing is cached or the cached
    /// set is within the safety margin or past its expiry; stale credentials
    /// are never handed out.
    pub fn credentials_for_use(
        &self,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<CredentialSet, ProfileError> {
        match self.cached(profile, now)? {
            (CredentialState::Fresh, Some(set)) => Ok(set),
            (CredentialState::Expired, _) if profile.kind == ProfileKind::StaticKey => {
                Err(static_expired(&profile.name))
            }
            (state, _) => Err(ProfileError::Config {
                profile: profile.name.clone(),
                message: format!("cached credentials are {}; run login first", state.label()),
            }),
        }
    }

    /// Obtain new credentials for `profile` and persist them.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Auth`] if the backend fails,
    /// [`ProfileError::Interrupted`] if cancelled (nothing is written),
    /// [`ProfileError::Config`] for static keys, or an I/O error from the
    /// write.
    pub fn refresh(&self, profile: &Profile, registry: &Registry) -> Result<CredentialSet, ProfileError> {
        if self.cancel.is_cancelled() {
            return Err(ProfileError::Interrupted);
        }
        let result = match &profile.kind {
            ProfileKind::StaticKey => {
                return Err(ProfileError::Config {
                    profile: profile.name.clone(),
                    message: "static keys cannot be refreshed".to_string(),
                });
            }
            ProfileKind::FederatedSession(target) => self.exchange(profile, target, registry)?,
            ProfileKind::AssumedRole(role) => self.assume(profile, role),
        };
        let mut set = result.map_err(|source| auth_error(&profile.name, source))?;
        set.profile_name.clone_from(&profile.name);

        self.persist(&set)?;
        self.log.debug(&format!(
            "wrote credentials for {} (expires {})",
            profile.name,
            set.expiration
                .map_or_else(|| "never".to_string(), super::set::format_expiration)
        ));
        Ok(set)
    }

    fn exchange(
        &self,
        profile: &Profile,
        target: &FederatedSession,
        registry: &Registry,
    ) -> Result<Result<CredentialSet, AuthError>, ProfileError> {
        let session = registry.session(&target.session_name)?;
        self.log.info(&format!(
            "signing in to {} via session '{}'",
            profile.name, session.name
        ));
        Ok(self
            .backends
            .sessions
            .exchange_session(&profile.name, session, target))
    }

    fn assume(&self, profile: &Profile, role: &AssumedRole) -> Result<CredentialSet, AuthError> {
        let mut request = AssumeRoleRequest {
            profile_name: profile.name.clone(),
            role_arn: role.role_arn.clone(),
            source_profile: role.source_profile.clone(),
            mfa_serial: role.mfa_serial.clone(),
            mfa_token: None,
            duration: self.role_duration,
        };
        self.log.info(&format!("assuming {} for {}", role.role_arn, profile.name));

        let mut attempt = 1;
        loop {
            if let Some(serial) = &role.mfa_serial {
                request.mfa_token = Some(self.backends.mfa.mfa_token(&profile.name, serial, attempt)?);
            }
            match self.backends.roles.assume_role(&request) {
                Err(e) if e.is_token_failure() && request.mfa_token.is_some() && attempt < MFA_ATTEMPTS => {
                    self.log.warn(&format!("{e}; try again"));
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Refresh `profile` only when its cached credentials are not fresh, or
    /// unconditionally when `force` is set.
    ///
    /// # Errors
    ///
    /// See [`need_refresh`](Self::need_refresh) and [`refresh`](Self::refresh).
    pub fn ensure_fresh(
        &self,
        profile: &Profile,
        registry: &Registry,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<RefreshOutcome, ProfileError> {
        if !force && !self.need_refresh(profile, now)? {
            return Ok(RefreshOutcome::Cached);
        }
        self.refresh(profile, registry)?;
        Ok(RefreshOutcome::Refreshed)
    }

    /// [`ensure_fresh`](Self::ensure_fresh) for each profile in turn.
    ///
    /// Failures are isolated per profile; once cancelled, the remaining
    /// profiles are reported as interrupted without contacting any backend.
    pub fn refresh_all(
        &self,
        profiles: &[&Profile],
        registry: &Registry,
        now: DateTime<Utc>,
        force: bool,
    ) -> Vec<(String, Result<RefreshOutcome, ProfileError>)> {
        profiles
            .iter()
            .map(|profile| {
                let result = if self.cancel.is_cancelled() {
                    Err(ProfileError::Interrupted)
                } else {
                    self.ensure_fresh(profile, registry, now, force)
                };
                match &result {
                    Ok(outcome) => self.log.record(&profile.name, outcome.status(), None),
                    Err(e) => {
                        let message = e.to_string();
                        self.log
                            .record(&profile.name, EntryStatus::Failed, Some(&message));
                    }
                }
                (profile.name.clone(), result)
            })
            .collect()
    }

    /// Delete the credentials entry of `profile_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if there is no entry.
    pub fn clear(&self, profile_name: &str) -> Result<(), ProfileError> {
        let next = self.load()?.remove_section(Category::Profile, profile_name)?;
        store::save(&self.path, &next)
    }

    /// Delete every temporary credential set; long-term keys are kept.
    ///
    /// Returns the names of the cleared entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or written.
    pub fn clear_all(&self) -> Result<Vec<String>, ProfileError> {
        let document = self.load()?;
        let doomed: Vec<String> = document
            .of_category(Category::Profile)
            .filter(|s| CredentialSet::from_section(s).is_ok_and(|set| !set.is_static()))
            .map(|s| s.name().to_string())
            .collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }
        let next = doomed.iter().try_fold(document, |doc, name| {
            doc.remove_section(Category::Profile, name)
        })?;
        store::save(&self.path, &next)?;
        Ok(doomed)
    }

    fn persist(&self, set: &CredentialSet) -> Result<(), ProfileError> {
        let document = self.load()?;
        let section = match document.find(Category::Profile, &set.profile_name) {
            Some(existing) => existing.with_body(set.apply_to(existing.body())),
            None => set.to_section(),
        };
        let next = document.upsert_section(section);
        let staged = StagedWrite::stage(&self.path, &next.serialize(), FileMode::OwnerOnly)?;
        if self.cancel.is_cancelled() {
            return Err(ProfileError::Interrupted);
        }
        staged.commit()
    }
}

fn static_expired(profile: &str) -> ProfileError {
    ProfileError::Config {
        profile: profile.to_string(),
        message: "static credentials are marked expired and cannot be refreshed".to_string(),
    }
}

fn auth_error(profile: &str, source: AuthError) -> ProfileError {
    match source {
        AuthError::Cancelled => ProfileError::Interrupted,
        source => ProfileError::Auth {
            profile: profile.to_string(),
            source,
        },
    }
}
