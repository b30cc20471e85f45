//! Ordered, format-preserving model of INI-style configuration documents.
//!
//! A [`Document`] is parsed once into an ordered list of [`Section`]s. Each
//! parsed section remembers its verbatim text so that untouched sections are
//! written back byte-for-byte; edited sections are re-rendered in a
//! normalised `key = value` layout.
//!
//! All mutating operations take `&self` and return a new [`Document`], leaving
//! the caller's value untouched.
use std::fmt;

use crate::error::ProfileError;

/// The kind of a section, derived from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// `[profile <name>]` (or `[default]`) in the config document, or a bare
    /// `[<name>]` entry in the credentials document.
    Profile,
    /// `[sso-session <name>]`.
    SsoSession,
    /// Any other header (`[services x]`, `[plugins]`, ...). Preserved, never interpreted.
    Opaque,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Profile => "profile",
            Self::SsoSession => "sso-session",
            Self::Opaque => "opaque",
        })
    }
}

/// Which file a document was read from. Decides how headers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Shared config file: `[profile x]`, `[sso-session x]`, `[default]`.
    Config,
    /// Shared credentials file: bare `[x]` headers.
    Credentials,
}

/// Ordered key/value body of a section. Keys are unique.
///
/// # Examples
///
/// ```
/// use profman_cli::config::document::Body;
///
/// let body = Body::new()
///     .with("region", "eu-west-1")
///     .with("output", "json")
///     .with("region", "us-east-1");
/// assert_eq!(body.get("region"), Some("us-east-1"));
/// assert_eq!(body.keys().collect::<Vec<_>>(), ["region", "output"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    entries: Vec<(String, String)>,
}

impl Body {
    /// Create an empty body.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Set `key`, replacing an existing value in place or appending a new entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Remove `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterate entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the body has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a parsed entry, rejecting duplicates.
    fn insert_new(&mut self, key: String, value: String) -> Result<(), String> {
        if self.contains_key(&key) {
            return Err(format!("duplicate key '{key}'"));
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Append a continuation line to the value of `key`.
    fn continue_value(&mut self, key: &str, line: &str) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| k == key) {
            slot.1.push('\n');
            slot.1.push_str(line);
        }
    }
}

/// One bracket-delimited block of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    category: Category,
    name: String,
    body: Body,
    /// Verbatim text (header through the line before the next header).
    /// `None` once the section has been created or edited in memory.
    raw: Option<String>,
}

impl Section {
    /// Create a new in-memory section. It is rendered in normalised form.
    #[must_use]
    pub fn new(category: Category, name: impl Into<String>, body: Body) -> Self {
        Self {
            category,
            name: name.into(),
            body,
            raw: None,
        }
    }

    /// Section category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Section name (unique within its category).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key/value body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Original text of a parsed, unedited section.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Copy of this section with a different body. Drops the verbatim text.
    #[must_use]
    pub fn with_body(&self, body: Body) -> Self {
        Self::new(self.category, self.name.clone(), body)
    }

    /// Copy of this section under a different name. Drops the verbatim text.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.category, name, self.body.clone())
    }

    /// Whether this section has `(category, name)` as its identity.
    #[must_use]
    pub fn is(&self, category: Category, name: &str) -> bool {
        self.category == category && self.name == name
    }

    /// Render the header line (without newline) for the given flavour.
    #[must_use]
    pub fn header(&self, flavor: Flavor) -> String {
        match (flavor, self.category) {
            (Flavor::Config, Category::Profile) if self.name == DEFAULT_PROFILE => {
                format!("[{DEFAULT_PROFILE}]")
            }
            (Flavor::Config, Category::Profile) => format!("[{PROFILE_PREFIX} {}]", self.name),
            (_, Category::SsoSession) => format!("[{SESSION_PREFIX} {}]", self.name),
            (Flavor::Credentials, Category::Profile) | (_, Category::Opaque) => {
                format!("[{}]", self.name)
            }
        }
    }

    fn render(&self, flavor: Flavor) -> String {
        let mut out = self.header(flavor);
        out.push('\n');
        for (key, value) in self.body.iter() {
            let mut lines = value.split('\n');
            match lines.next() {
                Some(first) if !first.is_empty() => {
                    out.push_str(&format!("{key} = {first}\n"));
                }
                _ => out.push_str(&format!("{key} =\n")),
            }
            for nested in lines {
                out.push_str(&format!("  {nested}\n"));
            }
        }
        out
    }
}

const DEFAULT_PROFILE: &str = "default";
const PROFILE_PREFIX: &str = "profile";
const SESSION_PREFIX: &str = "sso-session";

/// A parsed configuration or credentials document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    flavor: Flavor,
    /// Comments and blank lines before the first header.
    preamble: String,
    sections: Vec<Section>,
}

impl Document {
    /// An empty document of the given flavour.
    #[must_use]
    pub const fn empty(flavor: Flavor) -> Self {
        Self {
            flavor,
            preamble: String::new(),
            sections: Vec::new(),
        }
    }

    /// Parse `text` in a single pass.
    ///
    /// Format:
    /// ```ini
    /// # comment
    /// [sso-session corp]
    /// sso_start_url = https://corp.awsapps.com/start
    ///
    /// [profile dev]
    /// sso_session = corp
    /// s3 =
    ///   max_concurrent_requests = 4
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use profman_cli::config::document::{Category, Document, Flavor};
    ///
    /// let text = "[profile dev]\nregion = eu-west-1\n";
    /// let doc = Document::parse(text, Flavor::Config).unwrap();
    /// let dev = doc.find(Category::Profile, "dev").unwrap();
    /// assert_eq!(dev.body().get("region"), Some("eu-west-1"));
    /// assert_eq!(doc.serialize(), text);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Parse`] for an unterminated or empty header,
    /// a body line that is not `key = value`, a duplicate key within one
    /// section, or an entry before the first header.
    pub fn parse(text: &str, flavor: Flavor) -> Result<Self, ProfileError> {
        let mut preamble = String::new();
        let mut sections = Vec::new();
        let mut current: Option<PendingSection> = None;

        for (idx, line) in text.split_inclusive('\n').enumerate() {
            let line_num = idx + 1;
            let content = line.trim_end_matches(['\n', '\r']);
            let trimmed = content.trim();

            if trimmed.starts_with('[') {
                let (category, name) = parse_header(trimmed, flavor).map_err(|message| {
                    ProfileError::Parse {
                        line: line_num,
                        message,
                    }
                })?;
                if let Some(pending) = current.take() {
                    sections.push(pending.finish());
                }
                current = Some(PendingSection::new(category, name, line));
                continue;
            }

            let Some(pending) = current.as_mut() else {
                if trimmed.is_empty() || is_comment(trimmed) {
                    preamble.push_str(line);
                    continue;
                }
                return Err(ProfileError::Parse {
                    line: line_num,
                    message: format!("entry outside of section: {trimmed}"),
                });
            };

            pending.raw.push_str(line);

            if trimmed.is_empty() || is_comment(trimmed) {
                pending.last_key = None;
                continue;
            }

            let indented = content.starts_with([' ', '\t']);
            if indented && let Some(key) = &pending.last_key {
                pending.body.continue_value(key, trimmed);
                continue;
            }

            let (key, value) = parse_kv_line(trimmed).ok_or_else(|| ProfileError::Parse {
                line: line_num,
                message: format!("invalid key-value pair: {trimmed}"),
            })?;
            pending
                .body
                .insert_new(key.clone(), value)
                .map_err(|message| ProfileError::Parse {
                    line: line_num,
                    message,
                })?;
            pending.last_key = Some(key);
        }

        if let Some(pending) = current {
            sections.push(pending.finish());
        }

        Ok(Self {
            flavor,
            preamble,
            sections,
        })
    }

    /// Render the document. Unedited sections are reproduced verbatim.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = self.preamble.clone();
        let mut previous_rendered = false;
        for section in &self.sections {
            if let Some(raw) = &section.raw {
                if previous_rendered {
                    separate(&mut out);
                } else if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(raw);
                previous_rendered = false;
            } else {
                separate(&mut out);
                out.push_str(&section.render(self.flavor));
                previous_rendered = true;
            }
        }
        out
    }

    /// This document with `preamble` as its leading comment block.
    ///
    /// Every non-blank line of `preamble` must be a `#` or `;` comment so the
    /// result still parses.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        if !self.preamble.is_empty() && !self.preamble.ends_with('\n') {
            self.preamble.push('\n');
        }
        self
    }

    /// Leading comments and blank lines.
    #[must_use]
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Document flavour.
    #[must_use]
    pub const fn flavor(&self) -> Flavor {
        self.flavor
    }

    /// All sections in document order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Whether the document has no sections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Sections of one category, in document order.
    pub fn of_category(&self, category: Category) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(move |s| s.category == category)
    }

    /// First section with the given identity.
    #[must_use]
    pub fn find(&self, category: Category, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.is(category, name))
    }

    /// Like [`find`](Self::find), but a missing section is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no section matches.
    pub fn require(&self, category: Category, name: &str) -> Result<&Section, ProfileError> {
        self.find(category, name)
            .ok_or_else(|| ProfileError::NotFound {
                category,
                name: name.to_string(),
            })
    }

    /// Whether a section with this identity exists.
    #[must_use]
    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.find(category, name).is_some()
    }

    /// New document with the section sharing `section`'s identity replaced in place.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no section has that identity.
    pub fn replace_section(&self, section: Section) -> Result<Self, ProfileError> {
        let idx = self
            .position(section.category, &section.name)
            .ok_or_else(|| ProfileError::NotFound {
                category: section.category,
                name: section.name.clone(),
            })?;
        let mut next = self.clone();
        if let Some(slot) = next.sections.get_mut(idx) {
            *slot = section;
        }
        Ok(next)
    }

    /// New document without the identified section.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotFound`] if no section has that identity.
    pub fn remove_section(&self, category: Category, name: &str) -> Result<Self, ProfileError> {
        let idx = self
            .position(category, name)
            .ok_or_else(|| ProfileError::NotFound {
                category,
                name: name.to_string(),
            })?;
        let mut next = self.clone();
        next.sections.remove(idx);
        Ok(next)
    }

    /// New document with `section` appended at the end.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Conflict`] if a section with the same identity exists.
    pub fn append_section(&self, section: Section) -> Result<Self, ProfileError> {
        if self.contains(section.category, &section.name) {
            return Err(ProfileError::Conflict {
                category: section.category,
                name: section.name,
            });
        }
        let mut next = self.clone();
        next.sections.push(section);
        Ok(next)
    }

    /// Replace the section if present, otherwise append it.
    #[must_use]
    pub fn upsert_section(&self, section: Section) -> Self {
        let mut next = self.clone();
        match self.position(section.category, &section.name) {
            Some(idx) => {
                if let Some(slot) = next.sections.get_mut(idx) {
                    *slot = section;
                }
            }
            None => next.sections.push(section),
        }
        next
    }

    /// Whether every `(category, name)` pair appears at most once.
    #[must_use]
    pub fn has_unique_identities(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.sections
            .iter()
            .all(|s| seen.insert((s.category, s.name.as_str())))
    }

    fn position(&self, category: Category, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.is(category, name))
    }
}

/// A section being accumulated during parsing.
struct PendingSection {
    category: Category,
    name: String,
    body: Body,
    raw: String,
    last_key: Option<String>,
}

impl PendingSection {
    fn new(category: Category, name: String, header_line: &str) -> Self {
        Self {
            category,
            name,
            body: Body::new(),
            raw: header_line.to_string(),
            last_key: None,
        }
    }

    fn finish(self) -> Section {
        Section {
            category: self.category,
            name: self.name,
            body: self.body,
            raw: Some(self.raw),
        }
    }
}

/// Ensure a blank line separates the next section from preceding text.
fn separate(out: &mut String) {
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with(';')
}

/// Parse a `[...]` header line into its category and name.
fn parse_header(line: &str, flavor: Flavor) -> Result<(Category, String), String> {
    let inner = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| format!("unterminated section header: {line}"))?
        .trim();
    if inner.is_empty() {
        return Err("empty section header".to_string());
    }

    if flavor == Flavor::Credentials {
        return Ok((Category::Profile, inner.to_string()));
    }

    let (prefix, rest) = inner
        .split_once(char::is_whitespace)
        .map_or((inner, ""), |(p, r)| (p, r.trim()));
    match prefix {
        PROFILE_PREFIX | SESSION_PREFIX if rest.is_empty() => {
            Err(format!("missing name in section header: {line}"))
        }
        PROFILE_PREFIX => Ok((Category::Profile, rest.to_string())),
        SESSION_PREFIX => Ok((Category::SsoSession, rest.to_string())),
        DEFAULT_PROFILE if rest.is_empty() => Ok((Category::Profile, DEFAULT_PROFILE.to_string())),
        _ => Ok((Category::Opaque, inner.to_string())),
    }
}

/// Parse a `key = value` line, stripping inline comments from the value.
fn parse_kv_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((
        key.to_string(),
        strip_inline_comment(value.trim()).to_string(),
    ))
}

/// Strip inline comments (`#` or `;` preceded by whitespace) from a value.
fn strip_inline_comment(value: &str) -> &str {
    [" #", "\t#", " ;", "\t;"]
        .iter()
        .filter_map(|marker| value.find(marker))
        .min()
        .map_or(value, |idx| value.get(..idx).unwrap_or(value).trim_end())
}
