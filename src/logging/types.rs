//! Core logging types: batch entries, their status, and the [`Log`] trait.

/// One entry of a batch operation, for summary reporting.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// Profile or session the entry is about.
    pub name: String,
    /// Final status of the entry.
    pub status: EntryStatus,
    /// Optional detail (e.g. the original name of a renamed profile, or an error).
    pub message: Option<String>,
}

/// Outcome of one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Inserted under its proposed name.
    Added,
    /// Already present with an identical body.
    Unchanged,
    /// Inserted under a different name.
    Renamed,
    /// Replaced an existing entry.
    Replaced,
    /// Dropped in favour of the existing entry.
    Skipped,
    /// Credentials were obtained and written.
    Refreshed,
    /// Cached credentials were still fresh.
    Cached,
    /// Removed from the documents.
    Removed,
    /// Failed; the rest of the batch continued.
    Failed,
}

impl EntryStatus {
    /// All statuses, in summary order.
    pub const ALL: [Self; 9] = [
        Self::Added,
        Self::Unchanged,
        Self::Renamed,
        Self::Replaced,
        Self::Skipped,
        Self::Refreshed,
        Self::Cached,
        Self::Removed,
        Self::Failed,
    ];

    /// Lower-case label used in the summary.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Unchanged => "unchanged",
            Self::Renamed => "renamed",
            Self::Replaced => "replaced",
            Self::Skipped => "skipped",
            Self::Refreshed => "refreshed",
            Self::Cached => "cached",
            Self::Removed => "removed",
            Self::Failed => "failed",
        }
    }

    /// Console icon and ANSI colour.
    pub(super) const fn style(self) -> (&'static str, &'static str) {
        match self {
            Self::Added | Self::Refreshed => ("✓", "\x1b[32m"),
            Self::Renamed | Self::Replaced => ("~", "\x1b[36m"),
            Self::Unchanged | Self::Cached => ("·", "\x1b[2m"),
            Self::Skipped => ("○", "\x1b[33m"),
            Self::Removed => ("-", "\x1b[35m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }
}

/// Abstraction over logging backends.
///
/// Library code logs through `&dyn Log` so it never depends on how or where
/// output is rendered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a batch entry for the summary.
    fn record(&self, name: &str, status: EntryStatus, message: Option<&str>);
}
