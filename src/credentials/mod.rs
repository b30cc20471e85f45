//! Cached credential sets and their lifecycle.

pub mod backend;
pub mod manager;
pub mod set;
pub mod state;

pub use backend::{AssumeRoleRequest, Backends, Cancellation, MfaPrompt, RoleAssumer, SessionExchange};
pub use manager::{CredentialManager, RefreshOutcome};
pub use set::CredentialSet;
pub use state::CredentialState;
