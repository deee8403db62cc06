//! Command-line interface definitions.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "moddeploy",
    about = "Purge deployed mods, reconcile external changes and check rule conflicts",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Root directory holding `conf/` (default: $MODDEPLOY_ROOT, then the
    /// current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Accept default actions instead of prompting
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove every deployed file of a game
    Purge(PurgeOpts),
    /// Remove deployed files of one mod type's destination
    PurgePath(PurgePathOpts),
    /// List file conflicts between enabled mods
    Conflicts(ConflictsOpts),
    /// Run the pre-start check: unresolved conflicts and rule cycles
    Check(CheckOpts),
    /// Edit rules to break ordering cycles
    Repair(RepairOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name; also names the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Purge(_) => "purge",
            Self::PurgePath(_) => "purge-path",
            Self::Conflicts(_) => "conflicts",
            Self::Check(_) => "check",
            Self::Repair(_) => "repair",
            Self::Version => "version",
        }
    }
}

/// Options for the `purge` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct PurgeOpts {
    /// Game to purge (default: game of the active profile)
    #[arg(short, long)]
    pub game: Option<String>,

    /// Accept any profile of the game, not just the active one
    #[arg(long)]
    pub unmanage: bool,

    /// Purge every game that has a manifest
    #[arg(long, conflicts_with = "game")]
    pub all: bool,

    /// Mods being removed; their content-changed notifications are skipped
    #[arg(long, value_delimiter = ',')]
    pub removing: Vec<String>,
}

/// Options for the `purge-path` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PurgePathOpts {
    /// Game the destination belongs to
    #[arg(short, long)]
    pub game: String,

    /// Mod type whose manifest is used
    #[arg(short, long, default_value = crate::config::DEFAULT_MOD_TYPE)]
    pub mod_type: String,

    /// Destination directory (default: the mod type's configured path)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

/// Options for the `conflicts` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ConflictsOpts {
    /// Game to inspect (default: game of the active profile)
    #[arg(short, long)]
    pub game: Option<String>,

    /// Report every unresolved pair instead of the first
    #[arg(long)]
    pub all: bool,
}

/// Options for the `check` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct CheckOpts {
    /// Game to check (default: game of the active profile)
    #[arg(short, long)]
    pub game: Option<String>,
}

/// Options for the `repair` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct RepairOpts {
    /// Game whose rules are edited (default: game of the active profile)
    #[arg(short, long, global = true)]
    pub game: Option<String>,

    /// Repair to apply.
    #[command(subcommand)]
    pub action: RepairAction,
}

/// Rule repairs.
#[derive(Subcommand, Debug, Clone)]
pub enum RepairAction {
    /// Show the shortest cycle through a mod
    Cycle {
        /// Mod to start from
        mod_id: String,
    },
    /// Reverse the rule that makes FROM load after TO
    Flip {
        /// Mod that currently loads later
        from: String,
        /// Mod that currently loads earlier
        to: String,
    },
    /// Delete the rule that makes FROM load after TO
    Remove {
        /// Mod that currently loads later
        from: String,
        /// Mod that currently loads earlier
        to: String,
    },
    /// Make a mod load after everything else in its cycle
    LoadLast {
        /// Mod to move
        mod_id: String,
    },
}
