//! Non-fatal findings produced while building the registry.
use std::fmt;

/// A validation warning detected during registry construction.
///
/// Warnings are surfaced to the user but never block loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The document the finding came from (`"config"` or `"credentials"`).
    pub source: String,
    /// The section that triggered the warning.
    pub item: String,
    /// What is wrong.
    pub kind: WarningKind,
}

/// Classification of a [`ValidationWarning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// A federated profile names an `sso-session` that does not exist.
    DanglingSession(String),
    /// No federated, assumed-role, or static-key fields are present.
    UnknownKind,
    /// Fields from more than one kind are present.
    MixedKinds(Vec<&'static str>),
    /// A kind was recognised but a required field is missing.
    Incomplete {
        /// The recognised kind.
        kind: &'static str,
        /// The missing field.
        missing: &'static str,
    },
    /// A later section reuses a name; the first one wins.
    DuplicateName,
    /// An `sso-session` section is unusable.
    InvalidSession(String),
    /// A credentials entry has no profile to belong to.
    OrphanedCredentials,
}

impl ValidationWarning {
    /// A warning about `item` found in `source`.
    #[must_use]
    pub fn new(source: impl Into<String>, item: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            kind,
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingSession(session) => {
                write!(f, "references missing sso-session '{session}'")
            }
            Self::UnknownKind => f.write_str(
                "no sso_session, role_arn, or access key fields; profile kind is unknown",
            ),
            Self::MixedKinds(kinds) => {
                write!(f, "mixes fields of several kinds ({})", kinds.join(", "))
            }
            Self::Incomplete { kind, missing } => {
                write!(f, "{kind} profile is missing '{missing}'")
            }
            Self::DuplicateName => f.write_str("duplicate name; the first definition is used"),
            Self::InvalidSession(reason) => write!(f, "invalid sso-session: {reason}"),
            Self::OrphanedCredentials => {
                f.write_str("temporary credentials without a matching profile")
            }
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.source, self.item, self.kind)
    }
}
