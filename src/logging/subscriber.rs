//! Console and log-file rendering of tracing events.
//!
//! Both sinks render the same [`Line`]: the event message with credential
//! values masked, tagged with its [`Kind`]. The log file names profiles and
//! accounts, so it is created readable by the owner only.
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "profman::stage";

/// Replacement for a masked value.
const MASK: &str = "****";

/// Keys and flags whose values never reach a sink: credentials-file keys,
/// `aws` CLI JSON fields, and CLI flags carrying tokens.
const SECRET_MARKERS: &[&str] = &[
    "aws_secret_access_key",
    "aws_session_token",
    "SecretAccessKey",
    "SessionToken",
    "accessToken",
    "--token-code",
    "--access-token",
];

/// Characters between a marker and its value.
const SEPARATORS: &[char] = &[' ', '=', ':', '"'];

/// Characters that end a value.
const TERMINATORS: &[char] = &[' ', '"', ',', '}', '\n'];

/// Mask the value following every secret marker in `msg`.
fn redact(msg: &str) -> String {
    let mut out = msg.to_string();
    for marker in SECRET_MARKERS {
        let mut from = 0;
        while let Some(pos) = out.get(from..).and_then(|rest| rest.find(marker)) {
            let marker_end = from + pos + marker.len();
            let tail = out.get(marker_end..).unwrap_or_default();
            let value_start = marker_end + (tail.len() - tail.trim_start_matches(SEPARATORS).len());
            let value = out.get(value_start..).unwrap_or_default();
            let value_len = value.find(TERMINATORS).unwrap_or(value.len());
            if value_len == 0 || value.starts_with(MASK) {
                from = value_start;
                continue;
            }
            out.replace_range(value_start..value_start + value_len, MASK);
            from = value_start + MASK.len();
        }
    }
    out
}

/// How an event is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(level: Level, target: &str) -> Self {
        match level {
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warn,
            Level::INFO if target == STAGE_TARGET => Self::Stage,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }
}

/// One event, ready to render.
#[derive(Debug)]
struct Line {
    kind: Kind,
    text: String,
}

impl Line {
    fn new(level: Level, target: &str, message: &str) -> Self {
        Self {
            kind: Kind::of(level, target),
            text: redact(message),
        }
    }

    fn from_event(event: &tracing::Event<'_>) -> Self {
        let mut message = MessageExtractor::default();
        event.record(&mut message);
        let metadata = event.metadata();
        Self::new(*metadata.level(), metadata.target(), &message.0)
    }

    fn console(&self) -> String {
        let text = &self.text;
        match self.kind {
            Kind::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{text}\x1b[0m"),
            Kind::Error => format!("\x1b[31mERROR\x1b[0m {text}"),
            Kind::Warn => format!("\x1b[33mWARN\x1b[0m  {text}"),
            Kind::Info => format!("  {text}"),
            Kind::Debug => format!("  \x1b[2m{text}\x1b[0m"),
        }
    }

    fn file(&self, ts: &str) -> String {
        let text = strip_ansi(&self.text);
        match self.kind {
            Kind::Stage => format!("[{ts}] ==> {text}"),
            Kind::Error => format!("[{ts}]     [error] {text}"),
            Kind::Warn => format!("[{ts}]     [warn] {text}"),
            Kind::Info => format!("[{ts}]     {text}"),
            Kind::Debug => format!("[{ts}]     [debug] {text}"),
        }
    }
}

/// Captures the `message` field of an event.
#[derive(Default)]
struct MessageExtractor(String);

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }
}

/// Appends every event at `DEBUG` and above to the per-command log file.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file for `command` and write a run header.
    ///
    /// Returns `None` when the cache directory or the file is unavailable;
    /// logging then continues on the console only.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let mut file = open_private(&path).ok()?;
        let version =
            option_env!("PROFMAN_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        writeln!(file, "# profman {version} {command} {}", format_utc_datetime()).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // An existing file keeps its old mode on open.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let line = Line::from_event(event).file(&format_utc_time());
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// Console rendering of [`Line`]s.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        writeln!(writer, "{}", Line::from_event(event).console())
    }
}

/// Install the global subscriber: the console (warnings and errors on
/// stderr, the rest on stdout, debug only when `verbose`) and the log file
/// at `$XDG_CACHE_HOME/profman/<command>.log`.
///
/// Must be called once, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);
    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
