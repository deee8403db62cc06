//! Configuration loaded from the `conf/` directory below the root.
//!
//! | File | Contents |
//! |---|---|
//! | `settings.toml` | instance id, active profile, merge directory |
//! | `games.toml` | staging path, backend and mod-type destinations per game |
//! | `profiles.toml` | enabled mods per profile |
//! | `mods.toml` | installed mods, attributes and authored rules |
pub mod games;
pub mod mods;
pub mod profiles;
pub mod settings;
pub mod toml_loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::ConfigError;

pub use games::Game;
pub use mods::{Mod, ModAttributes, ModTable};
pub use profiles::Profile;
pub use settings::Settings;

/// Id of the mod type used when a mod does not name one.
pub const DEFAULT_MOD_TYPE: &str = "default";

/// All loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory; `conf/` lives below it.
    pub root: PathBuf,
    /// Application-wide settings.
    pub settings: Settings,
    /// Managed games by id.
    pub games: BTreeMap<String, Game>,
    /// Profiles by id.
    pub profiles: BTreeMap<String, Profile>,
    /// Installed mods per game.
    pub mods: ModTable,
}

impl Config {
    /// Load every config file below `root/conf`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let conf = root.join("conf");

        let settings: Settings = toml_loader::load_config(&conf.join("settings.toml"))
            .context("loading settings.toml")?;

        let mut games: BTreeMap<String, Game> =
            toml_loader::load_config(&conf.join("games.toml")).context("loading games.toml")?;
        for game in games.values_mut() {
            game.resolve_paths(root);
        }

        let mut profiles: BTreeMap<String, Profile> =
            toml_loader::load_config(&conf.join("profiles.toml"))
                .context("loading profiles.toml")?;
        for (id, profile) in &mut profiles {
            profile.id.clone_from(id);
        }

        let mods = mods::load(&conf.join("mods.toml")).context("loading mods.toml")?;

        Ok(Self {
            root: root.to_path_buf(),
            settings,
            games,
            profiles,
            mods,
        })
    }

    /// Path of `mods.toml`.
    #[must_use]
    pub fn mods_path(&self) -> PathBuf {
        self.root.join("conf").join("mods.toml")
    }

    /// Write the mod table back to `mods.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_mods(&self) -> Result<()> {
        mods::save(&self.mods_path(), &self.mods)
    }

    /// Look up a game.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownGame`] if the game is not configured.
    pub fn game(&self, game_id: &str) -> Result<&Game, ConfigError> {
        self.games
            .get(game_id)
            .ok_or_else(|| ConfigError::UnknownGame(game_id.to_string()))
    }

    /// All installed mods of a game.
    pub fn mods_for(&self, game_id: &str) -> impl Iterator<Item = &Mod> {
        self.mods.get(game_id).into_iter().flat_map(BTreeMap::values)
    }

    /// Installed mods of the profile's game that the profile enables.
    #[must_use]
    pub fn enabled_mods(&self, profile: &Profile) -> Vec<&Mod> {
        self.mods_for(&profile.game)
            .filter(|m| profile.is_enabled(&m.id))
            .collect()
    }

    /// Resolve the profile for `game_id`; see [`profiles::resolve`].
    #[must_use]
    pub fn profile_for(&self, game_id: &str, unmanaging: bool) -> Option<&Profile> {
        profiles::resolve(
            &self.profiles,
            self.settings.active_profile.as_deref(),
            game_id,
            unmanaging,
        )
    }

    /// The game of the active profile.
    #[must_use]
    pub fn active_game(&self) -> Option<&str> {
        self.settings
            .active_profile
            .as_deref()
            .and_then(|id| self.profiles.get(id))
            .map(|p| p.game.as_str())
    }
}
