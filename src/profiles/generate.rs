//! Profile generation from a discovery source.
//!
//! Discovery queries fan out across accounts in parallel; the resulting
//! proposals are merged into the document sequentially by the
//! [`ConflictResolver`](super::conflict::ConflictResolver).
use super::conflict::Proposal;
use super::kind::Session;
use crate::config::document::Body;
use crate::error::AuthError;

/// An account visible through a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// One role available in one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRole {
    /// Account the role belongs to.
    pub account: Account,
    /// Role (permission set) name.
    pub role_name: String,
}

/// Read-only listing of what a session grants access to.
#[cfg_attr(test, mockall::automock)]
pub trait DiscoverySource: Sync {
    /// Accounts visible through `session`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the listing fails (e.g. no cached login).
    fn accounts(&self, session: &Session) -> Result<Vec<Account>, AuthError>;

    /// Roles available in `account`.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the listing fails.
    fn roles(&self, session: &Session, account: &Account) -> Result<Vec<String>, AuthError>;
}

/// Everything discovery found, plus the accounts whose role listing failed.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Roles, sorted by account name then role name.
    pub roles: Vec<DiscoveredRole>,
    /// Accounts that could not be listed, with the reason.
    pub failures: Vec<(Account, AuthError)>,
}

/// List every role reachable through `session`.
///
/// Role listings run in parallel, one per account. A failing account is
/// reported in [`Discovery::failures`] and does not stop the others.
///
/// # Errors
///
/// Returns an [`AuthError`] if the account listing itself fails.
pub fn discover(source: &dyn DiscoverySource, session: &Session) -> Result<Discovery, AuthError> {
    use rayon::prelude::*;

    let accounts = source.accounts(session)?;
    let listed: Vec<(Account, Result<Vec<String>, AuthError>)> = accounts
        .into_par_iter()
        .map(|account| {
            let roles = source.roles(session, &account);
            (account, roles)
        })
        .collect();

    let mut discovery = Discovery::default();
    for (account, roles) in listed {
        match roles {
            Ok(names) => discovery
                .roles
                .extend(names.into_iter().map(|role_name| DiscoveredRole {
                    account: account.clone(),
                    role_name,
                })),
            Err(e) => discovery.failures.push((account, e)),
        }
    }
    discovery.roles.sort_by(|a, b| {
        (&a.account.name, &a.account.id, &a.role_name).cmp(&(&b.account.name, &b.account.id, &b.role_name))
    });
    Ok(discovery)
}

/// Render a profile name from `template`.
///
/// Placeholders are `{account}` (account name), `{account_id}`, `{role}` and
/// `{session}`. The result is lower-cased and every character outside
/// `[a-z0-9-_.]` becomes `-`, with runs of `-` collapsed.
///
/// # Examples
///
/// ```
/// use profman_cli::profiles::generate::{render_name, Account, DiscoveredRole};
///
/// let role = DiscoveredRole {
///     account: Account { id: "111111111111".into(), name: "Data Platform".into() },
///     role_name: "AdministratorAccess".into(),
/// };
/// assert_eq!(render_name("{account}-{role}", &role, "corp"), "data-platform-administratoraccess");
/// ```
#[must_use]
pub fn render_name(template: &str, role: &DiscoveredRole, session_name: &str) -> String {
    let rendered = template
        .replace("{account_id}", &role.account.id)
        .replace("{account}", &role.account.name)
        .replace("{role}", &role.role_name)
        .replace("{session}", session_name);

    let mut name = String::with_capacity(rendered.len());
    for c in rendered.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            c
        } else {
            '-'
        };
        if c == '-' && name.ends_with('-') {
            continue;
        }
        name.push(c);
    }
    let trimmed = name.trim_matches('-');
    if trimmed.is_empty() {
        format!("{}-{}", role.account.id, role.role_name.to_lowercase())
    } else {
        trimmed.to_string()
    }
}

/// Turn discovered roles into profile proposals for `session`.
///
/// `region` overrides the profile region; by default the session's own
/// region is used.
#[must_use]
pub fn proposals(
    roles: &[DiscoveredRole],
    session: &Session,
    template: &str,
    region: Option<&str>,
) -> Vec<Proposal> {
    let region = region.unwrap_or(&session.region);
    roles
        .iter()
        .map(|role| {
            let body = Body::new()
                .with("sso_session", session.name.as_str())
                .with("sso_account_id", role.account.id.as_str())
                .with("sso_role_name", role.role_name.as_str())
                .with("region", region);
            Proposal::profile(render_name(template, role, &session.name), body)
        })
        .collect()
}
