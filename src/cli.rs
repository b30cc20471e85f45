//! Command-line surface: global flags and one options struct per subcommand.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::profiles::Strategy;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "profman",
    about = "Manage cloud access profiles and their short-lived credentials",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Document and settings paths.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Path of the config document (default ~/.aws/config)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Path of the credentials document (default ~/.aws/credentials)
    #[arg(long, global = true)]
    pub credentials_file: Option<PathBuf>,

    /// Path of the tool settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List profiles, sessions, and credential freshness
    List,
    /// Generate profiles for every account and role a session can reach
    Generate(GenerateOpts),
    /// Merge an exported bundle into the local documents
    Import(ImportOpts),
    /// Write a bundle of all sessions and profiles
    Export(ExportOpts),
    /// Obtain fresh credentials for profiles
    Login(LoginOpts),
    /// Delete cached credentials
    Clear(ClearOpts),
    /// Remove profiles and their credentials
    Remove(RemoveOpts),
    /// Open the web console for a federated profile
    Console(ConsoleOpts),
    /// Print a shell completion script
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Generate(_) => "generate",
            Self::Import(_) => "import",
            Self::Export(_) => "export",
            Self::Login(_) => "login",
            Self::Clear(_) => "clear",
            Self::Remove(_) => "remove",
            Self::Console(_) => "console",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `generate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateOpts {
    /// Session to discover accounts and roles through
    #[arg(long)]
    pub session: String,

    /// Region for generated profiles (default: the session region)
    #[arg(long)]
    pub region: Option<String>,

    /// How to settle name collisions (default: ask)
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,
}

/// Options for the `import` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ImportOpts {
    /// Bundle file produced by `export`
    pub bundle: PathBuf,

    /// How to settle name collisions (default: ask)
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,
}

/// Options for the `export` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ExportOpts {
    /// Include long-term access keys
    #[arg(long)]
    pub include_credentials: bool,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for the `login` subcommand.
#[derive(Args, Debug, Clone)]
pub struct LoginOpts {
    /// Profiles to refresh
    #[arg(conflicts_with_all = ["session", "all"])]
    pub profiles: Vec<String>,

    /// Refresh every profile of this session
    #[arg(long, conflicts_with = "all")]
    pub session: Option<String>,

    /// Refresh every refreshable profile
    #[arg(long)]
    pub all: bool,

    /// Refresh even if cached credentials are fresh
    #[arg(short, long)]
    pub force: bool,
}

/// Options for the `clear` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ClearOpts {
    /// Profiles whose credentials to delete
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub profiles: Vec<String>,

    /// Delete every temporary credential set (long-term keys are kept)
    #[arg(long)]
    pub all: bool,
}

/// Options for the `remove` subcommand.
#[derive(Args, Debug, Clone)]
pub struct RemoveOpts {
    /// Profiles to remove
    #[arg(required_unless_present = "session")]
    pub profiles: Vec<String>,

    /// Remove every profile of this session
    #[arg(long)]
    pub session: Option<String>,

    /// Also remove the sso-session section itself
    #[arg(long, requires = "session")]
    pub with_session: bool,
}

/// Options for the `console` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConsoleOpts {
    /// Federated profile to open
    pub profile: String,

    /// Print the link instead of opening it
    #[arg(long)]
    pub print: bool,
}

/// Options for the `completions` subcommand.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_global_paths() {
        let cli = Cli::parse_from([
            "profman",
            "--config-file",
            "/tmp/config",
            "--credentials-file",
            "/tmp/credentials",
            "list",
        ]);
        assert_eq!(cli.global.config_file, Some(PathBuf::from("/tmp/config")));
        assert_eq!(
            cli.global.credentials_file,
            Some(PathBuf::from("/tmp/credentials"))
        );
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["profman", "-v", "list"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_generate_with_strategy() {
        let cli = Cli::parse_from([
            "profman",
            "generate",
            "--session",
            "corp",
            "--strategy",
            "auto-rename",
        ]);
        assert!(
            matches!(&cli.command, Command::Generate(_)),
            "Expected Generate command"
        );
        if let Command::Generate(opts) = cli.command {
            assert_eq!(opts.session, "corp");
            assert_eq!(opts.strategy, Some(Strategy::AutoRename));
            assert_eq!(opts.region, None);
        }
    }

    #[test]
    fn generate_requires_session() {
        assert!(Cli::try_parse_from(["profman", "generate"]).is_err());
    }

    #[test]
    fn parse_login_profiles_and_force() {
        let cli = Cli::parse_from(["profman", "login", "dev", "prod", "--force"]);
        assert!(
            matches!(&cli.command, Command::Login(_)),
            "Expected Login command"
        );
        if let Command::Login(opts) = cli.command {
            assert_eq!(opts.profiles, ["dev", "prod"]);
            assert!(opts.force);
        }
    }

    #[test]
    fn login_all_conflicts_with_profiles() {
        assert!(Cli::try_parse_from(["profman", "login", "dev", "--all"]).is_err());
    }

    #[test]
    fn clear_needs_target() {
        assert!(Cli::try_parse_from(["profman", "clear"]).is_err());
        assert!(Cli::try_parse_from(["profman", "clear", "--all"]).is_ok());
    }

    #[test]
    fn with_session_requires_session() {
        assert!(Cli::try_parse_from(["profman", "remove", "dev", "--with-session"]).is_err());
        let cli = Cli::parse_from(["profman", "remove", "--session", "corp", "--with-session"]);
        assert!(
            matches!(&cli.command, Command::Remove(_)),
            "Expected Remove command"
        );
        if let Command::Remove(opts) = cli.command {
            assert!(opts.with_session);
            assert!(opts.profiles.is_empty());
        }
    }

    #[test]
    fn command_names_match_subcommands() {
        let cli = Cli::parse_from(["profman", "export", "--include-credentials"]);
        assert_eq!(cli.command.name(), "export");
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["profman", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts {
                shell: clap_complete::Shell::Bash
            })
        ));
    }
}
