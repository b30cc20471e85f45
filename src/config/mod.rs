//! Documents on disk: the format-preserving model, the atomic store, and tool settings.
pub mod document;
pub mod settings;
pub mod store;

pub use settings::Settings;

use crate::error::ProfileError;
use document::{Document, Flavor};

/// The two documents the engine operates on, loaded together.
#[derive(Debug, Clone)]
pub struct Documents {
    /// Shared config document (profiles and sessions).
    pub config: Document,
    /// Shared credentials document (static keys and cached credential sets).
    pub credentials: Document,
}

impl Documents {
    /// Load both documents from the paths in `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if either file exists but cannot be read or parsed.
    pub fn load(settings: &Settings) -> Result<Self, ProfileError> {
        Ok(Self {
            config: store::load(&settings.config_file, Flavor::Config)?,
            credentials: store::load(&settings.credentials_file, Flavor::Credentials)?,
        })
    }

    /// Save `next` over `self`, writing only the documents that changed.
    ///
    /// The config document is written first; each write is atomic on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Io`] if a write fails.
    pub fn save_changes(&self, next: &Self, settings: &Settings) -> Result<bool, ProfileError> {
        let mut changed = false;
        if next.config.serialize() != self.config.serialize() {
            store::save(&settings.config_file, &next.config)?;
            changed = true;
        }
        if next.credentials.serialize() != self.credentials.serialize() {
            store::save(&settings.credentials_file, &next.credentials)?;
            changed = true;
        }
        Ok(changed)
    }
}
