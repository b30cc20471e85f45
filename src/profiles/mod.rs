//! Typed profiles, their validation, and the operations that add profiles
//! to a document (generation, import) without breaking name uniqueness.

pub mod bundle;
pub mod conflict;
pub mod generate;
pub mod kind;
pub mod registry;
pub mod validation;

pub use conflict::{ConflictPrompt, ConflictResolver, Outcome, Proposal, Strategy};
pub use kind::{Profile, ProfileKind, Session};
pub use registry::Registry;
pub use validation::{ValidationWarning, WarningKind};
