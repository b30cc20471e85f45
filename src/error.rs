//! Domain-specific error types for the profile engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Library modules return [`ProfileError`] (and [`AuthError`] from refresh
//! backends) while command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ProfileError
//! ├── Parse        — malformed section header or body; the document is rejected
//! ├── Io           — file unreadable or unwritable
//! ├── NotFound     — referenced profile or session is absent
//! ├── Conflict     — naming collision with no applicable strategy
//! ├── Auth(AuthError) — refresh backend rejected the request
//! ├── Config       — configuration that can never be refreshed automatically
//! └── Interrupted  — the user cancelled a blocking refresh
//! ```
use std::path::PathBuf;

use thiserror::Error;

use crate::config::document::Category;

/// Top-level error type for the profile engine.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The document contains a malformed header or body line.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending line.
        line: usize,
        /// Human-readable description of the problem.
        message: String,
    },

    /// An I/O error occurred while reading or writing a document.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path to the file that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A referenced section does not exist.
    #[error("{category} '{name}' not found")]
    NotFound {
        /// Category of the missing section.
        category: Category,
        /// Name that was looked up.
        name: String,
    },

    /// A proposed name collides and no resolution strategy applies.
    #[error("unresolved naming conflict for {category} '{name}'")]
    Conflict {
        /// Category of the colliding section.
        category: Category,
        /// Colliding name.
        name: String,
    },

    /// A refresh backend rejected the request.
    #[error("authentication failed for profile '{profile}': {source}")]
    Auth {
        /// Profile whose refresh failed.
        profile: String,
        /// Backend failure.
        source: AuthError,
    },

    /// Configuration that cannot be fixed by an automatic refresh.
    #[error("configuration error for profile '{profile}': {message}")]
    Config {
        /// Offending profile.
        profile: String,
        /// Human-readable explanation.
        message: String,
    },

    /// The user interrupted a blocking operation; nothing was written.
    #[error("interrupted; no credentials were written")]
    Interrupted,
}

impl ProfileError {
    /// Build an [`Io`](Self::Io) error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`NotFound`](Self::NotFound) error for a profile.
    pub fn profile_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            category: Category::Profile,
            name: name.into(),
        }
    }

    /// Build a [`NotFound`](Self::NotFound) error for an `sso-session`.
    pub fn session_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            category: Category::SsoSession,
            name: name.into(),
        }
    }
}

/// Failures reported by refresh backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The second-factor token was rejected. Eligible for one re-prompt.
    #[error("MFA token rejected: {0}")]
    BadToken(String),

    /// The backend refused the identity or role (expired session, access denied, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached or produced unreadable output.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The user cancelled the interactive step.
    #[error("cancelled by user")]
    Cancelled,
}

impl AuthError {
    /// Whether re-prompting for a new token may fix this failure.
    #[must_use]
    pub const fn is_token_failure(&self) -> bool {
        matches!(self, Self::BadToken(_))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn parse_error_display() {
        let e = ProfileError::Parse {
            line: 3,
            message: "unterminated section header".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "parse error at line 3: unterminated section header"
        );
    }

    #[test]
    fn io_error_has_source() {
        use std::error::Error as StdError;
        let e = ProfileError::io(
            "/home/me/.aws/config",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );
        assert!(e.to_string().contains("/home/me/.aws/config"));
        assert!(e.source().is_some());
    }

    #[test]
    fn not_found_names_category() {
        assert_eq!(
            ProfileError::profile_not_found("dev").to_string(),
            "profile 'dev' not found"
        );
        assert_eq!(
            ProfileError::session_not_found("corp").to_string(),
            "sso-session 'corp' not found"
        );
    }

    #[test]
    fn auth_error_wraps_source() {
        use std::error::Error as StdError;
        let e = ProfileError::Auth {
            profile: "admin".to_string(),
            source: AuthError::BadToken("invalid one time pass code".to_string()),
        };
        assert!(e.to_string().contains("admin"));
        assert!(e.source().is_some());
    }

    #[test]
    fn only_bad_token_is_retryable() {
        assert!(AuthError::BadToken("x".into()).is_token_failure());
        assert!(!AuthError::Rejected("x".into()).is_token_failure());
        assert!(!AuthError::Backend("x".into()).is_token_failure());
        assert!(!AuthError::Cancelled.is_token_failure());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_types_are_send_sync() {
        assert_send_sync::<ProfileError>();
        assert_send_sync::<AuthError>();
    }

    #[test]
    fn profile_error_converts_to_anyhow() {
        let e = ProfileError::Interrupted;
        let _anyhow_err: anyhow::Error = e.into();
    }
}
