//! Domain-specific error types for the deployment engine.
//!
//! Library modules return typed errors built with [`thiserror`]; command
//! handlers at the CLI boundary convert them to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! DeployError
//! ├── UserCanceled          - a confirmation request was declined
//! ├── ProcessCanceled       - a backend could not proceed right now
//! ├── NoBackend             - no deployment backend for the game
//! ├── NoActiveProfile       - transient, retryable
//! ├── LockBusy              - non-waiting lock attempt failed
//! ├── Io                    - filesystem failure with its path
//! ├── Serialize             - manifest encoding failure
//! ├── Backend               - opaque backend failure
//! └── Config(ConfigError)   - game/profile/mod lookup failures
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the library modules.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

/// Top-level error type for purge, reconciliation and manifest handling.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The user declined a confirmation request.
    #[error("Operation canceled by user")]
    UserCanceled,

    /// The backend reported that it cannot currently proceed.
    #[error("Process canceled: {0}")]
    ProcessCanceled(String),

    /// No deployment backend is available for the game.
    #[error("No deployment backend available for game '{0}'")]
    NoBackend(String),

    /// No profile is active for the game. The caller may retry later.
    #[error("No active profile for game '{0}'")]
    NoActiveProfile(String),

    /// A non-waiting lock attempt found the lock held by another thread.
    #[error("Deployment lock for {} is busy", .0.display())]
    LockBusy(PathBuf),

    /// An I/O error occurred while touching `path`.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path of the file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The manifest could not be encoded.
    #[error("Failed to encode manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Game, profile or mod lookup failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl DeployError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// `true` for errors the caller may retry once state settles.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NoActiveProfile(_) | Self::LockBusy(_))
    }

    /// `true` for user or process cancellation.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserCanceled | Self::ProcessCanceled(_))
    }

    /// `true` if this is an I/O error of kind [`io::ErrorKind::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Errors that arise from looking up games, profiles and mods in the
/// loaded configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The game id is not defined in `games.toml`.
    #[error("Unknown game '{0}'")]
    UnknownGame(String),

    /// The profile id is not defined in `profiles.toml`.
    #[error("Unknown profile '{0}'")]
    UnknownProfile(String),

    /// The mod type is not defined for the game.
    #[error("Unknown mod type '{mod_type}' for game '{game}'")]
    UnknownModType {
        /// Game the lookup was made for.
        game: String,
        /// Mod type that was not found.
        mod_type: String,
    },

    /// The mod id is not installed for the game.
    #[error("Unknown mod '{mod_id}' for game '{game}'")]
    UnknownMod {
        /// Game the lookup was made for.
        game: String,
        /// Mod id that was not found.
        mod_id: String,
    },

    /// A configuration value is malformed.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Dotted key of the offending value.
        key: String,
        /// Human-readable description of the problem.
        message: String,
    },
}
