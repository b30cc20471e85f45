//! Tool settings loaded from `settings.toml`.
//!
//! Settings are read once at startup into a [`Settings`] value which is then
//! passed by reference to every component that needs it.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::profiles::conflict::Strategy;

/// Default safety margin before expiry, in seconds.
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 300;

/// Default template for generated profile names.
pub const DEFAULT_NAME_TEMPLATE: &str = "{account}-{role}";

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path of the shared config document.
    pub config_file: PathBuf,
    /// Path of the shared credentials document.
    pub credentials_file: PathBuf,
    /// Time before expiry after which cached credentials are unusable.
    pub safety_margin: Duration,
    /// Conflict strategy applied when the caller does not force one.
    pub default_strategy: Option<Strategy>,
    /// Browser launch settings.
    pub browser: BrowserSettings,
    /// Profile generation settings.
    pub generate: GenerateSettings,
    /// Requested lifetime of assumed-role credentials.
    pub assume_role_duration: Duration,
}

/// Browser launch settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserSettings {
    /// Explicit browser executable; overrides Chrome and the platform opener.
    pub command: Option<String>,
    /// Alias map from profile or session name to a Chrome profile directory.
    pub chrome_profiles: BTreeMap<String, String>,
}

/// Profile generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateSettings {
    /// Name template with `{account}`, `{account_id}`, `{role}`, `{session}` placeholders.
    pub name_template: String,
}

impl Default for GenerateSettings {
    fn default() -> Self {
        Self {
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
        }
    }
}

/// On-disk shape of `settings.toml`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    config_file: Option<PathBuf>,
    credentials_file: Option<PathBuf>,
    safety_margin_secs: Option<u64>,
    default_strategy: Option<Strategy>,
    browser: BrowserSettings,
    generate: GenerateSettings,
    assume_role: AssumeRoleFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AssumeRoleFile {
    duration_secs: Option<u64>,
}

/// Explicit path overrides, typically from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the config document path.
    pub config_file: Option<PathBuf>,
    /// Replaces the credentials document path.
    pub credentials_file: Option<PathBuf>,
}

/// Lookup of environment variables, injectable for tests.
pub trait Env {
    /// Value of `key`, if set and valid Unicode.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

impl Settings {
    /// Load settings from `path` (or the default location) and apply
    /// environment and command-line overrides, in that order.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>, overrides: &Overrides, env: &dyn Env) -> Result<Self> {
        let file = match path {
            Some(p) => read_settings_file(p)?,
            None => match default_settings_path(env) {
                Some(p) => read_settings_file(&p)?,
                None => SettingsFile::default(),
            },
        };
        Ok(Self::resolve(file, overrides, env))
    }

    /// Settings with every default applied, rooted at `home`.
    #[must_use]
    pub fn defaults_in(home: &Path) -> Self {
        let aws = home.join(".aws");
        Self {
            config_file: aws.join("config"),
            credentials_file: aws.join("credentials"),
            safety_margin: Duration::from_secs(DEFAULT_SAFETY_MARGIN_SECS),
            default_strategy: None,
            browser: BrowserSettings::default(),
            generate: GenerateSettings::default(),
            assume_role_duration: Duration::from_secs(3600),
        }
    }

    fn resolve(file: SettingsFile, overrides: &Overrides, env: &dyn Env) -> Self {
        let home = home_dir(env);
        let defaults = Self::defaults_in(&home);

        let config_file = overrides
            .config_file
            .clone()
            .or_else(|| env.var("AWS_CONFIG_FILE").map(PathBuf::from))
            .or(file.config_file)
            .map_or(defaults.config_file, |p| expand_home(&p, &home));
        let credentials_file = overrides
            .credentials_file
            .clone()
            .or_else(|| env.var("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from))
            .or(file.credentials_file)
            .map_or(defaults.credentials_file, |p| expand_home(&p, &home));

        Self {
            config_file,
            credentials_file,
            safety_margin: file
                .safety_margin_secs
                .map_or(defaults.safety_margin, Duration::from_secs),
            default_strategy: file.default_strategy,
            browser: file.browser,
            generate: file.generate,
            assume_role_duration: file
                .assume_role
                .duration_secs
                .map_or(defaults.assume_role_duration, Duration::from_secs),
        }
    }
}

fn read_settings_file(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))
}

/// `$XDG_CONFIG_HOME/profman/settings.toml`, falling back to `~/.config`.
fn default_settings_path(env: &dyn Env) -> Option<PathBuf> {
    let base = env
        .var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env.var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .or_else(|| env.var("APPDATA").map(PathBuf::from))?;
    Some(base.join("profman").join("settings.toml"))
}

/// The user's home directory (`HOME`, then `USERPROFILE`), or `.`.
#[must_use]
pub fn home_dir(env: &dyn Env) -> PathBuf {
    env.var("HOME")
        .or_else(|| env.var("USERPROFILE"))
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    path.strip_prefix("~").map_or_else(|_| path.to_path_buf(), |rest| home.join(rest))
}
