//! Reconciles proposed sections against an existing document.
//!
//! Used by generation and import. The algorithm is free of I/O: when no
//! strategy is forced, the decision is delegated to a [`ConflictPrompt`]
//! callback.
use serde::Deserialize;

use super::kind::{Classification, classify};
use crate::config::document::{Body, Category, Document, Section};
use crate::error::ProfileError;

/// Upper bound on custom-name rounds for a single proposal.
const MAX_CUSTOM_ROUNDS: usize = 5;

/// How a collision with a differing body is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Keep the existing section and drop the proposal.
    Skip,
    /// Insert the proposal under a suffixed name.
    AutoRename,
    /// Ask the caller for a replacement name.
    CustomName,
    /// Replace the existing body.
    Overwrite,
}

/// A single decision returned by a [`ConflictPrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the existing section.
    Skip,
    /// Insert under a suffixed name.
    AutoRename,
    /// Retry resolution under this name.
    Rename(String),
    /// Replace the existing body.
    Overwrite,
}

/// Details of a collision presented to a [`ConflictPrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Category of both sections.
    pub category: Category,
    /// The colliding name.
    pub name: String,
    /// Body already in the document.
    pub existing: Body,
    /// Body being proposed.
    pub proposed: Body,
}

/// Caller-supplied decisions for collisions.
#[cfg_attr(test, mockall::automock)]
pub trait ConflictPrompt {
    /// Pick a resolution. `None` means no decision can be made (e.g. no terminal).
    fn choose(&self, conflict: &Conflict) -> Option<Resolution>;

    /// Supply a replacement name. `None` means the caller declined.
    fn custom_name(&self, conflict: &Conflict) -> Option<String>;
}

/// A section proposed by generation or import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Category of the proposed section.
    pub category: Category,
    /// Requested name.
    pub name: String,
    /// Proposed body.
    pub body: Body,
}

impl Proposal {
    /// A proposed `profile` section.
    #[must_use]
    pub fn profile(name: impl Into<String>, body: Body) -> Self {
        Self {
            category: Category::Profile,
            name: name.into(),
            body,
        }
    }

    /// A proposed `sso-session` section.
    #[must_use]
    pub fn session(name: impl Into<String>, body: Body) -> Self {
        Self {
            category: Category::SsoSession,
            name: name.into(),
            body,
        }
    }

    /// Suffix used by [`Strategy::AutoRename`], derived from the proposed kind.
    #[must_use]
    pub fn rename_suffix(&self) -> &'static str {
        match self.category {
            Category::Profile => match classify(&self.body) {
                Classification::Kind(kind) => kind.rename_suffix(),
                Classification::Invalid(_) => "new",
            },
            Category::SsoSession => "session",
            Category::Opaque => "copy",
        }
    }
}

/// What happened to one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Inserted under the requested name.
    Added,
    /// An identical section already existed.
    Unchanged,
    /// Inserted under a different name.
    Renamed {
        /// The originally requested name.
        from: String,
    },
    /// The existing body was replaced.
    Replaced,
    /// The existing section was kept and the proposal dropped.
    Skipped,
}

impl Outcome {
    /// Whether the document changed because of this outcome.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(self, Self::Added | Self::Renamed { .. } | Self::Replaced)
    }
}

/// Final name and outcome of one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Name under which the proposal now lives (or the existing name if skipped).
    pub name: String,
    /// What happened.
    pub outcome: Outcome,
}

/// Result of resolving a whole batch.
#[derive(Debug)]
pub struct BatchResult {
    /// The merged document.
    pub document: Document,
    /// Per-proposal result, keyed by the requested name, in input order.
    pub results: Vec<(Proposal, Result<Resolved, ProfileError>)>,
}

impl BatchResult {
    /// Number of proposals that changed the document.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| r.as_ref().is_ok_and(|r| r.outcome.is_change()))
            .count()
    }
}

/// Resolves proposals against a document.
#[derive(Clone, Copy)]
pub struct ConflictResolver<'a> {
    strategy: Option<Strategy>,
    prompt: Option<&'a dyn ConflictPrompt>,
}

impl std::fmt::Debug for ConflictResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("strategy", &self.strategy)
            .field("interactive", &self.prompt.is_some())
            .finish()
    }
}

impl<'a> ConflictResolver<'a> {
    /// A resolver that applies `strategy` to every collision, or asks
    /// `prompt` when no strategy is forced.
    #[must_use]
    pub fn new(strategy: Option<Strategy>, prompt: Option<&'a dyn ConflictPrompt>) -> Self {
        Self { strategy, prompt }
    }

    /// Resolve one proposal against `document`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Conflict`] when the names collide with
    /// differing bodies and neither a forced strategy nor the prompt settles it.
    pub fn resolve(
        &self,
        document: &Document,
        proposal: &Proposal,
    ) -> Result<(Document, Resolved), ProfileError> {
        let category = proposal.category;
        let mut name = proposal.name.clone();

        for _ in 0..MAX_CUSTOM_ROUNDS {
            let Some(existing) = document.find(category, &name) else {
                let next = document.append_section(Section::new(
                    category,
                    name.clone(),
                    proposal.body.clone(),
                ))?;
                let outcome = if name == proposal.name {
                    Outcome::Added
                } else {
                    Outcome::Renamed {
                        from: proposal.name.clone(),
                    }
                };
                return Ok((next, Resolved { name, outcome }));
            };

            if existing.body() == &proposal.body {
                return Ok((
                    document.clone(),
                    Resolved {
                        name,
                        outcome: Outcome::Unchanged,
                    },
                ));
            }

            let conflict = Conflict {
                category,
                name: name.clone(),
                existing: existing.body().clone(),
                proposed: proposal.body.clone(),
            };
            match self.decide(&conflict)? {
                Resolution::Skip => {
                    return Ok((
                        document.clone(),
                        Resolved {
                            name,
                            outcome: Outcome::Skipped,
                        },
                    ));
                }
                Resolution::Overwrite => {
                    let next = document.replace_section(existing.with_body(proposal.body.clone()))?;
                    return Ok((
                        next,
                        Resolved {
                            name,
                            outcome: Outcome::Replaced,
                        },
                    ));
                }
                Resolution::AutoRename => return auto_rename(document, proposal, &name),
                Resolution::Rename(custom) => name = custom,
            }
        }

        Err(ProfileError::Conflict { category, name })
    }

    /// Resolve every proposal in order, isolating per-proposal failures.
    ///
    /// The returned document keeps every `(category, name)` pair unique.
    #[must_use]
    pub fn resolve_batch(&self, document: &Document, proposals: Vec<Proposal>) -> BatchResult {
        let mut current = document.clone();
        let mut results = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            let result = match self.resolve(&current, &proposal) {
                Ok((next, resolved)) => {
                    current = next;
                    Ok(resolved)
                }
                Err(e) => Err(e),
            };
            results.push((proposal, result));
        }
        BatchResult {
            document: current,
            results,
        }
    }

    fn decide(&self, conflict: &Conflict) -> Result<Resolution, ProfileError> {
        let unresolved = || ProfileError::Conflict {
            category: conflict.category,
            name: conflict.name.clone(),
        };
        match self.strategy {
            Some(Strategy::Skip) => Ok(Resolution::Skip),
            Some(Strategy::AutoRename) => Ok(Resolution::AutoRename),
            Some(Strategy::Overwrite) => Ok(Resolution::Overwrite),
            Some(Strategy::CustomName) => self
                .prompt
                .and_then(|p| p.custom_name(conflict))
                .filter(|n| !n.trim().is_empty())
                .map(|n| Resolution::Rename(n.trim().to_string()))
                .ok_or_else(unresolved),
            None => self
                .prompt
                .and_then(|p| p.choose(conflict))
                .ok_or_else(unresolved),
        }
    }
}

/// Insert `proposal` under `<base>-<suffix>`, then `<base>-<suffix>-2`, `-3`, ...
/// An existing candidate with an identical body counts as already applied.
fn auto_rename(
    document: &Document,
    proposal: &Proposal,
    base: &str,
) -> Result<(Document, Resolved), ProfileError> {
    let stem = format!("{base}-{}", proposal.rename_suffix());
    let candidates = std::iter::once(stem.clone()).chain((2..).map(|n| format!("{stem}-{n}")));
    for candidate in candidates {
        match document.find(proposal.category, &candidate) {
            Some(existing) if existing.body() == &proposal.body => {
                return Ok((
                    document.clone(),
                    Resolved {
                        name: candidate,
                        outcome: Outcome::Unchanged,
                    },
                ));
            }
            Some(_) => {}
            None => {
                let next = document.append_section(Section::new(
                    proposal.category,
                    candidate.clone(),
                    proposal.body.clone(),
                ))?;
                return Ok((
                    next,
                    Resolved {
                        name: candidate,
                        outcome: Outcome::Renamed {
                            from: proposal.name.clone(),
                        },
                    },
                ));
            }
        }
    }
    Err(ProfileError::Conflict {
        category: proposal.category,
        name: stem,
    })
}
