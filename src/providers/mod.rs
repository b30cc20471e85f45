//! Concrete implementations of the collaborator traits: the `aws` CLI
//! backend, the browser launcher, and console prompts.
pub mod aws_cli;
pub mod browser;
pub mod prompt;

pub use aws_cli::AwsCli;
pub use browser::{BrowserLaunch, BrowserLauncher};
pub use prompt::ConsolePrompt;
