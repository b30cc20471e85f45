#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the credential lifecycle against real files.

mod common;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use common::*;
use profman_cli::credentials::{
    AssumeRoleRequest, Backends, Cancellation, CredentialManager, CredentialSet, CredentialState,
    MfaPrompt, RefreshOutcome, RoleAssumer, SessionExchange,
};
use profman_cli::error::{AuthError, ProfileError};
use profman_cli::logging::{EntryStatus, Logger};
use profman_cli::profiles::Session;
use profman_cli::profiles::kind::FederatedSession;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

fn issued(profile: &str, key: &str, now: DateTime<Utc>) -> CredentialSet {
    CredentialSet {
        profile_name: profile.to_string(),
        access_key_id: key.to_string(),
        secret_access_key: "secret".to_string(),
        session_token: Some("token".to_string()),
        expiration: Some(now + TimeDelta::hours(1)),
    }
}

/// Session exchange that counts calls and can fire an interrupt mid-call.
#[derive(Default)]
struct FakeExchange {
    calls: Cell<u32>,
    interrupt: Option<Cancellation>,
}

impl SessionExchange for FakeExchange {
    fn exchange_session(
        &self,
        profile_name: &str,
        session: &Session,
        target: &FederatedSession,
    ) -> Result<CredentialSet, AuthError> {
        self.calls.set(self.calls.get() + 1);
        assert_eq!(session.name, target.session_name);
        if let Some(cancel) = &self.interrupt {
            cancel.cancel();
        }
        Ok(issued(profile_name, "ASIAEXCHANGED", Utc::now()))
    }
}

/// Role assumer that accepts only one token.
#[derive(Default)]
struct FakeRoles {
    requests: RefCell<Vec<AssumeRoleRequest>>,
}

impl RoleAssumer for FakeRoles {
    fn assume_role(&self, request: &AssumeRoleRequest) -> Result<CredentialSet, AuthError> {
        self.requests.borrow_mut().push(request.clone());
        match request.mfa_token.as_deref() {
            Some("123456") => Ok(issued(&request.profile_name, "ASIAASSUMED", Utc::now())),
            _ => Err(AuthError::BadToken("MultiFactorAuthentication failed".into())),
        }
    }
}

/// Prompt that hands out queued tokens and cancels when empty.
struct QueuedTokens(RefCell<VecDeque<&'static str>>);

impl QueuedTokens {
    fn new(tokens: &[&'static str]) -> Self {
        Self(RefCell::new(tokens.iter().copied().collect()))
    }
}

impl MfaPrompt for QueuedTokens {
    fn mfa_token(&self, _profile: &str, _serial: &str, _attempt: u32) -> Result<String, AuthError> {
        self.0
            .borrow_mut()
            .pop_front()
            .map(str::to_string)
            .ok_or(AuthError::Cancelled)
    }
}

fn manager<'a>(
    ws: &Workspace,
    sessions: &'a FakeExchange,
    roles: &'a FakeRoles,
    mfa: &'a QueuedTokens,
    cancel: Cancellation,
    log: &'a Logger,
) -> CredentialManager<'a> {
    CredentialManager::new(
        &ws.settings,
        Backends {
            sessions,
            roles,
            mfa,
        },
        cancel,
        log,
    )
}

// ---------------------------------------------------------------------------
// Federated sessions
// ---------------------------------------------------------------------------

#[test]
fn federated_refresh_is_persisted_then_served_from_cache() {
    let ws = base_workspace();
    let (sessions, roles, mfa) = (FakeExchange::default(), FakeRoles::default(), QueuedTokens::new(&[]));
    let log = Logger::new("test");
    let manager = manager(&ws, &sessions, &roles, &mfa, Cancellation::new(), &log);
    let registry = ws.registry();
    let dev = registry.lookup("dev").unwrap();
    let now = Utc::now();

    assert_eq!(manager.state("dev", now).unwrap(), CredentialState::Absent);
    assert!(manager.need_refresh(dev, now).unwrap());
    assert_eq!(
        manager.ensure_fresh(dev, &registry, now, false).unwrap(),
        RefreshOutcome::Refreshed
    );
    assert_eq!(
        manager.ensure_fresh(dev, &registry, now, false).unwrap(),
        RefreshOutcome::Cached
    );
    assert_eq!(sessions.calls.get(), 1);

    let text = ws.credentials_text();
    assert!(text.starts_with(BASE_CREDENTIALS));
    assert!(text.contains("[dev]\naws_access_key_id = ASIAEXCHANGED"));
    assert_eq!(
        manager.credentials_for_use(dev, now).unwrap().access_key_id,
        "ASIAEXCHANGED"
    );

    manager.ensure_fresh(dev, &registry, now, true).unwrap();
    assert_eq!(sessions.calls.get(), 2);
    assert_eq!(ws.credentials_text().matches("[dev]").count(), 1);
}

#[test]
fn interrupt_during_exchange_writes_nothing_and_stops_the_batch() {
    let ws = base_workspace();
    let cancel = Cancellation::new();
    let sessions = FakeExchange {
        calls: Cell::new(0),
        interrupt: Some(cancel.clone()),
    };
    let (roles, mfa) = (FakeRoles::default(), QueuedTokens::new(&["123456"]));
    let log = Logger::new("test");
    let manager = manager(&ws, &sessions, &roles, &mfa, cancel, &log);
    let registry = ws.registry();
    let targets = [registry.lookup("dev").unwrap(), registry.lookup("admin").unwrap()];

    let results = manager.refresh_all(&targets, &registry, Utc::now(), false);

    assert!(matches!(results[0].1, Err(ProfileError::Interrupted)));
    assert!(matches!(results[1].1, Err(ProfileError::Interrupted)));
    assert!(roles.requests.borrow().is_empty());
    assert_eq!(ws.credentials_text(), BASE_CREDENTIALS);
    assert_eq!(log.failure_count(), 2);
}

// ---------------------------------------------------------------------------
// Assumed roles
// ---------------------------------------------------------------------------

#[test]
fn rejected_token_is_prompted_again_once() {
    let ws = base_workspace();
    let (sessions, roles) = (FakeExchange::default(), FakeRoles::default());
    let mfa = QueuedTokens::new(&["000000", "123456"]);
    let log = Logger::new("test");
    let manager = manager(&ws, &sessions, &roles, &mfa, Cancellation::new(), &log);
    let registry = ws.registry();

    let set = manager
        .refresh(registry.lookup("admin").unwrap(), &registry)
        .unwrap();
    assert_eq!(set.access_key_id, "ASIAASSUMED");

    let requests = roles.requests.borrow();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].source_profile.as_deref(), Some("ci"));
    assert_eq!(
        requests[1].mfa_serial.as_deref(),
        Some("arn:aws:iam::222222222222:mfa/me")
    );
    assert_eq!(ws.credentials_text().matches("[admin]").count(), 1);
}

#[test]
fn second_rejection_or_abandoned_prompt_fails_without_writing() {
    let ws = base_workspace();
    let (sessions, roles) = (FakeExchange::default(), FakeRoles::default());
    let log = Logger::new("test");
    let registry = ws.registry();
    let admin = registry.lookup("admin").unwrap();

    let twice_wrong = QueuedTokens::new(&["000000", "999999", "123456"]);
    let err = manager(&ws, &sessions, &roles, &twice_wrong, Cancellation::new(), &log)
        .refresh(admin, &registry)
        .unwrap_err();
    assert!(matches!(
        err,
        ProfileError::Auth {
            source: AuthError::BadToken(_),
            ..
        }
    ));

    let abandoned = QueuedTokens::new(&[]);
    let err = manager(&ws, &sessions, &roles, &abandoned, Cancellation::new(), &log)
        .refresh(admin, &registry)
        .unwrap_err();
    assert!(matches!(err, ProfileError::Interrupted));
    assert_eq!(ws.credentials_text(), BASE_CREDENTIALS);
}

// ---------------------------------------------------------------------------
// Expiry and clearing
// ---------------------------------------------------------------------------

#[test]
fn stale_credentials_are_refused_and_expired_static_keys_are_errors() {
    let ws = WorkspaceBuilder::new()
        .with_config(BASE_CONFIG)
        .with_credentials(
            "[ci]\naws_access_key_id = AKIACI\naws_secret_access_key = s\nexpiration = 2020-01-01T00:00:00Z\n\n\
             [dev]\naws_access_key_id = ASIADEV\naws_secret_access_key = s\naws_session_token = t\nexpiration = 2026-10-19T12:02:00Z\n",
        )
        .with_margin_secs(300)
        .build();
    let (sessions, roles, mfa) = (FakeExchange::default(), FakeRoles::default(), QueuedTokens::new(&[]));
    let log = Logger::new("test");
    let manager = manager(&ws, &sessions, &roles, &mfa, Cancellation::new(), &log);
    let registry = ws.registry();
    let now = DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    let dev = registry.lookup("dev").unwrap();
    assert_eq!(manager.state("dev", now).unwrap(), CredentialState::Expiring);
    assert!(manager.need_refresh(dev, now).unwrap());
    assert!(matches!(
        manager.credentials_for_use(dev, now),
        Err(ProfileError::Config { .. })
    ));

    let ci = registry.lookup("ci").unwrap();
    assert!(matches!(
        manager.need_refresh(ci, now),
        Err(ProfileError::Config { .. })
    ));
    assert!(matches!(
        manager.ensure_fresh(ci, &registry, now, false),
        Err(ProfileError::Config { .. })
    ));
    assert_eq!(sessions.calls.get(), 0);
}

#[test]
fn clear_all_keeps_long_term_keys() {
    let ws = WorkspaceBuilder::new()
        .with_config(BASE_CONFIG)
        .with_credentials(
            "[ci]\naws_access_key_id = AKIACI\naws_secret_access_key = ci-secret\n\n\
             [dev]\naws_access_key_id = ASIADEV\naws_secret_access_key = s\naws_session_token = t\nexpiration = 2026-10-19T12:02:00Z\n",
        )
        .build();
    let (sessions, roles, mfa) = (FakeExchange::default(), FakeRoles::default(), QueuedTokens::new(&[]));
    let log = Logger::new("test");
    let manager = manager(&ws, &sessions, &roles, &mfa, Cancellation::new(), &log);

    assert_eq!(manager.clear_all().unwrap(), ["dev"]);
    assert_eq!(ws.credentials_text().trim_end(), BASE_CREDENTIALS.trim_end());
    assert!(matches!(
        manager.clear("dev"),
        Err(ProfileError::NotFound { .. })
    ));
    assert!(
        log.entries()
            .iter()
            .all(|e| e.status != EntryStatus::Failed)
    );
}
