// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed workspace holding a config and a
// credentials document, plus a fluent builder so each integration test can
// set up an isolated environment without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use profman_cli::config::{Documents, Settings};
use profman_cli::profiles::Registry;

/// A config document with one session and one federated profile.
pub const BASE_CONFIG: &str = "\
# managed by hand
[default]
region = us-east-1

[sso-session corp]
sso_start_url = https://corp.awsapps.com/start
sso_region = us-east-1
sso_registration_scopes = sso:account:access

[profile dev]
sso_session = corp
sso_account_id = 111111111111
sso_role_name = Developer
region = eu-west-1
s3 =
  max_concurrent_requests = 4

[profile admin]
role_arn = arn:aws:iam::222222222222:role/Admin
source_profile = ci
mfa_serial = arn:aws:iam::222222222222:mfa/me
";

/// A credentials document with one long-term key pair.
pub const BASE_CREDENTIALS: &str = "\
[ci]
aws_access_key_id = AKIACI
aws_secret_access_key = ci-secret
";

/// An isolated workspace backed by a [`tempfile::TempDir`].
///
/// The directory is automatically deleted when dropped.
pub struct Workspace {
    /// Temporary directory holding both documents.
    pub root: tempfile::TempDir,
    /// Settings pointing at the documents in `root`.
    pub settings: Settings,
}

impl Workspace {
    /// A workspace with no documents on disk.
    pub fn empty() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let mut settings = Settings::defaults_in(root.path());
        settings.config_file = root.path().join("config");
        settings.credentials_file = root.path().join("credentials");
        Self { root, settings }
    }

    /// Path of the config document.
    pub fn config_path(&self) -> &Path {
        &self.settings.config_file
    }

    /// Path of the credentials document.
    pub fn credentials_path(&self) -> &Path {
        &self.settings.credentials_file
    }

    /// Path for an arbitrary file inside the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// Raw text of the config document.
    pub fn config_text(&self) -> String {
        std::fs::read_to_string(self.config_path()).expect("read config")
    }

    /// Raw text of the credentials document.
    pub fn credentials_text(&self) -> String {
        std::fs::read_to_string(self.credentials_path()).expect("read credentials")
    }

    /// Both documents, parsed.
    pub fn documents(&self) -> Documents {
        Documents::load(&self.settings).expect("load documents")
    }

    /// Registry over both documents.
    pub fn registry(&self) -> Registry {
        let documents = self.documents();
        Registry::build_with_credentials(&documents.config, &documents.credentials)
    }
}

/// Fluent builder for [`Workspace`].
pub struct WorkspaceBuilder {
    ws: Workspace,
}

impl WorkspaceBuilder {
    /// Begin building an empty workspace.
    pub fn new() -> Self {
        Self {
            ws: Workspace::empty(),
        }
    }

    /// Write `content` as the config document.
    pub fn with_config(self, content: &str) -> Self {
        std::fs::write(self.ws.config_path(), content).expect("write config");
        self
    }

    /// Write `content` as the credentials document.
    pub fn with_credentials(self, content: &str) -> Self {
        std::fs::write(self.ws.credentials_path(), content).expect("write credentials");
        self
    }

    /// Set the safety margin.
    pub fn with_margin_secs(mut self, secs: u64) -> Self {
        self.ws.settings.safety_margin = std::time::Duration::from_secs(secs);
        self
    }

    /// Finalise the builder.
    pub fn build(self) -> Workspace {
        self.ws
    }
}

/// The base config and credentials documents.
pub fn base_workspace() -> Workspace {
    WorkspaceBuilder::new()
        .with_config(BASE_CONFIG)
        .with_credentials(BASE_CREDENTIALS)
        .build()
}
