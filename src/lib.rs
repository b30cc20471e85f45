//! Profile configuration engine and credential lifecycle manager.
//!
//! Keeps a store of named cloud-access profiles (federated-session,
//! assumed-role and static-key) in an INI-style config document, merges
//! discovered or imported profiles into it without breaking name
//! uniqueness, and keeps the short-lived credentials derived from those
//! profiles fresh in a companion credentials document.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: the format-preserving document model, atomic store, and tool settings
//! - **[`profiles`]**: typed registry, conflict resolution, generation, import/export
//! - **[`credentials`]**: credential sets, freshness, and the refresh manager
//! - **[`providers`]**: `aws` CLI backend, browser launcher, console prompts
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod exec;
pub mod logging;
pub mod profiles;
pub mod providers;
