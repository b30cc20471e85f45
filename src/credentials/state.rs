//! Freshness of a cached credential set.
use chrono::{DateTime, TimeDelta, Utc};

use super::set::CredentialSet;

/// Freshness of the credentials cached for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing cached.
    Absent,
    /// No expiry, or expiry more than the safety margin away.
    Fresh,
    /// Expires within the safety margin; refresh before use.
    Expiring,
    /// Already expired; any use must be aborted.
    Expired,
}

impl CredentialState {
    /// Evaluate `credentials` at `now` with the given safety margin.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeDelta, Utc};
    /// use profman_cli::credentials::{CredentialSet, CredentialState};
    ///
    /// let now = Utc::now();
    /// let set = CredentialSet {
    ///     profile_name: "dev".into(),
    ///     access_key_id: "ASIA".into(),
    ///     secret_access_key: "s".into(),
    ///     session_token: Some("t".into()),
    ///     expiration: Some(now + TimeDelta::minutes(2)),
    /// };
    /// let state = CredentialState::evaluate(Some(&set), now, TimeDelta::minutes(5));
    /// assert_eq!(state, CredentialState::Expiring);
    /// ```
    #[must_use]
    pub fn evaluate(
        credentials: Option<&CredentialSet>,
        now: DateTime<Utc>,
        margin: TimeDelta,
    ) -> Self {
        let Some(credentials) = credentials else {
            return Self::Absent;
        };
        match credentials.expiration {
            None => Self::Fresh,
            Some(at) if at <= now => Self::Expired,
            Some(at) if at - now > margin => Self::Fresh,
            Some(_) => Self::Expiring,
        }
    }

    /// Whether the credentials must be refreshed before use.
    #[must_use]
    pub const fn needs_refresh(self) -> bool {
        !matches!(self, Self::Fresh)
    }

    /// Short label used in listings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Fresh => "fresh",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
        }
    }
}
