//! Command: open the web console for a federated profile.
use anyhow::{Result, bail};

use crate::cli::ConsoleOpts;
use crate::config::Settings;
use crate::config::document::Flavor;
use crate::config::store;
use crate::logging::Logger;
use crate::profiles::{ProfileKind, Registry};
use crate::providers::{BrowserLaunch, BrowserLauncher};

/// Run the console command.
///
/// # Errors
///
/// Returns an error if the profile is unknown or not federated, or the
/// browser cannot be started.
#[allow(clippy::print_stdout)]
pub fn run(settings: &Settings, opts: &ConsoleOpts, log: &Logger) -> Result<()> {
    let config = store::load(&settings.config_file, Flavor::Config)?;
    let registry = Registry::build(&config);
    let (url, hint) = console_link(&registry, &opts.profile, settings)?;

    if opts.print {
        println!("{url}");
        return Ok(());
    }
    log.info(&format!("opening console for {}", opts.profile));
    open(&BrowserLauncher::new(&settings.browser), &url, &hint)
}

/// The deep link for `profile_name` and the browser hint to open it with.
///
/// The hint is the profile name when a browser profile is configured for
/// it, and the session name otherwise.
///
/// # Errors
///
/// Returns an error if the profile is unknown or not federated.
pub fn console_link(registry: &Registry, profile_name: &str, settings: &Settings) -> Result<(String, String)> {
    let profile = registry.lookup(profile_name)?;
    let ProfileKind::FederatedSession(federated) = &profile.kind else {
        bail!(
            "profile '{profile_name}' is {}; only federated profiles have a console link",
            profile.kind.label()
        );
    };
    let session = registry.session(&federated.session_name)?;
    let url = session.console_url(&federated.account_id, &federated.role_name);
    let hint = if settings.browser.chrome_profiles.contains_key(profile_name) {
        profile_name.to_string()
    } else {
        session.name.clone()
    };
    Ok((url, hint))
}

fn open(browser: &dyn BrowserLaunch, url: &str, hint: &str) -> Result<()> {
    browser.open(url, Some(hint))
}
