//! Mod deployment engine: purge, external-change reconciliation and rule
//! conflict resolution.
//!
//! Mods are staged per game and deployed into one destination directory per
//! mod type by a pluggable [`backend`]. What was deployed is recorded in a
//! per-destination [`manifest`], which drives every later purge.
//!
//! - **[`config`]**: games, profiles, installed mods and settings from `conf/`
//! - **[`deploy`]**: the purge orchestrator, run under the staging lock
//! - **[`reconcile`]**: detecting and resolving changes made outside a deployment
//! - **[`conflicts`]** / **[`rules`]**: file conflicts, load-order rules and cycle repair
//! - **[`commands`]**: top-level subcommands (`purge`, `check`, `repair`, …)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod conflicts;
pub mod deploy;
pub mod error;
pub mod events;
pub mod logging;
pub mod manifest;
pub mod operations;
pub mod reconcile;
pub mod rules;
