//! Interfaces to the collaborators that actually obtain credentials.
//!
//! The lifecycle manager only invokes these and persists the result; the
//! browser flow, the role exchange, and token entry live behind them.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::set::CredentialSet;
use crate::error::AuthError;
use crate::profiles::kind::{FederatedSession, Session};

/// Browser-mediated session exchange followed by a role-credential fetch.
#[cfg_attr(test, mockall::automock)]
pub trait SessionExchange {
    /// Obtain credentials for `target` through `session`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the login or the credential fetch fails.
    fn exchange_session(
        &self,
        profile_name: &str,
        session: &Session,
        target: &FederatedSession,
    ) -> Result<CredentialSet, AuthError>;
}

/// Everything needed to assume a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    /// Profile being refreshed.
    pub profile_name: String,
    /// Role to assume.
    pub role_arn: String,
    /// Profile whose credentials sign the request.
    pub source_profile: Option<String>,
    /// Second-factor device.
    pub mfa_serial: Option<String>,
    /// Current token for `mfa_serial`.
    pub mfa_token: Option<String>,
    /// Requested credential lifetime.
    pub duration: Duration,
}

/// Role assumption, optionally with a second factor.
#[cfg_attr(test, mockall::automock)]
pub trait RoleAssumer {
    /// Exchange the source identity for role credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::BadToken`] when only the token was rejected, and
    /// another [`AuthError`] variant for any other failure.
    fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet, AuthError>;
}

/// Source of second-factor tokens.
#[cfg_attr(test, mockall::automock)]
pub trait MfaPrompt {
    /// Ask for a token for `serial`. `attempt` starts at 1.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Cancelled`] if the user aborts entry.
    fn mfa_token(&self, profile_name: &str, serial: &str, attempt: u32)
    -> Result<String, AuthError>;
}

/// The three collaborators a refresh may need.
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    /// Federated-session backend.
    pub sessions: &'a dyn SessionExchange,
    /// Role-assumption backend.
    pub roles: &'a dyn RoleAssumer,
    /// Token prompt.
    pub mfa: &'a dyn MfaPrompt,
}

impl std::fmt::Debug for Backends<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// Shared flag set when the user interrupts a blocking refresh.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A flag that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a Ctrl-C handler that sets this flag. A second interrupt
    /// exits immediately with status 130.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed.
    pub fn install_interrupt_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = Arc::clone(&self.0);
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                std::process::exit(130);
            }
            tracing::warn!("interrupt received; finishing without writing credentials");
        })
    }

    /// Mark as cancelled.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt has been observed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
