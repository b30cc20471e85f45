//! Opening URLs in a browser, optionally in a specific Chrome profile.
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::settings::BrowserSettings;
use crate::exec;

/// Opens a URL for the user.
pub trait BrowserLaunch {
    /// Open `url`. `hint` names the profile or session the URL belongs to and
    /// selects a browser profile when one is configured for it.
    ///
    /// # Errors
    ///
    /// Returns an error if no browser could be started.
    fn open(&self, url: &str, hint: Option<&str>) -> Result<()>;
}

/// Executable names tried, in order, when looking for Chrome.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "macos")]
const CHROME_APP_PATH: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

/// A resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    /// Executable to start.
    pub program: String,
    /// Arguments, the URL included.
    pub args: Vec<String>,
}

/// Browser launcher driven by [`BrowserSettings`].
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    command: Option<String>,
    chrome_profiles: BTreeMap<String, String>,
}

impl BrowserLauncher {
    /// Launcher for the given settings.
    #[must_use]
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            command: settings.command.clone(),
            chrome_profiles: settings.chrome_profiles.clone(),
        }
    }

    /// Decide how `url` would be opened, using `locate` to find executables.
    ///
    /// An explicit `browser.command` always wins. Otherwise a configured Chrome
    /// profile for `hint` selects Chrome, and everything else goes to the
    /// platform opener.
    ///
    /// # Errors
    ///
    /// Returns an error if `browser.command` is blank.
    pub fn plan(
        &self,
        url: &str,
        hint: Option<&str>,
        locate: impl Fn(&str) -> Option<PathBuf>,
    ) -> Result<Launch> {
        if let Some(command) = &self.command {
            let mut words = command.split_whitespace();
            let Some(program) = words.next() else {
                bail!("browser.command is empty");
            };
            let mut args: Vec<String> = words.map(str::to_string).collect();
            args.push(url.to_string());
            return Ok(Launch {
                program: program.to_string(),
                args,
            });
        }

        if let Some(directory) = hint.and_then(|h| self.chrome_profiles.get(h))
            && let Some(chrome) = find_chrome(&locate)
        {
            return Ok(Launch {
                program: chrome,
                args: vec![format!("--profile-directory={directory}"), url.to_string()],
            });
        }

        Ok(platform_opener(url))
    }
}

impl BrowserLaunch for BrowserLauncher {
    fn open(&self, url: &str, hint: Option<&str>) -> Result<()> {
        let launch = self.plan(url, hint, exec::find)?;
        tracing::debug!("opening browser: {} {}", launch.program, launch.args.join(" "));
        let args: Vec<&str> = launch.args.iter().map(String::as_str).collect();
        exec::spawn_detached(&launch.program, &args)
    }
}

fn find_chrome(locate: &impl Fn(&str) -> Option<PathBuf>) -> Option<String> {
    let found = CHROME_CANDIDATES
        .iter()
        .find_map(|name| locate(name))
        .map(|p| p.to_string_lossy().into_owned());
    #[cfg(target_os = "macos")]
    let found = found.or_else(|| {
        std::path::Path::new(CHROME_APP_PATH)
            .exists()
            .then(|| CHROME_APP_PATH.to_string())
    });
    found
}

fn platform_opener(url: &str) -> Launch {
    if cfg!(target_os = "windows") {
        Launch {
            program: "cmd".to_string(),
            args: vec!["/C".into(), "start".into(), String::new(), url.to_string()],
        }
    } else if cfg!(target_os = "macos") {
        Launch {
            program: "open".to_string(),
            args: vec![url.to_string()],
        }
    } else {
        Launch {
            program: "xdg-open".to_string(),
            args: vec![url.to_string()],
        }
    }
}
