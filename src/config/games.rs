//! Managed games from `games.toml`.
//!
//! ```toml
//! [skyrim]
//! staging_path = "staging/skyrim"
//! backend = "symlink"
//!
//! [skyrim.mod_types]
//! default = "game/Data"
//! enb = "game"
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Backend used when a game does not name one.
pub const DEFAULT_BACKEND: &str = "symlink";

/// A managed game.
#[derive(Debug, Clone, Deserialize)]
pub struct Game {
    /// Directory holding every installed mod's files.
    pub staging_path: PathBuf,
    /// Id of the deployment backend.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Whether the destination filesystem distinguishes file name case.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Mod type id to destination directory. An empty path means the type
    /// is not deployable.
    #[serde(default)]
    pub mod_types: BTreeMap<String, PathBuf>,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

impl Game {
    /// Resolve relative paths against `root`.
    pub(super) fn resolve_paths(&mut self, root: &Path) {
        if self.staging_path.is_relative() {
            self.staging_path = root.join(&self.staging_path);
        }
        for path in self.mod_types.values_mut() {
            if !path.as_os_str().is_empty() && path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    /// Mod types that have a destination directory.
    pub fn deployable_mod_types(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.mod_types
            .iter()
            .filter(|(_, path)| !path.as_os_str().is_empty())
            .map(|(id, path)| (id.as_str(), path.as_path()))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parse_game_with_defaults() {
        let games: BTreeMap<String, Game> = toml::from_str(
            r#"
[skyrim]
staging_path = "staging"
[skyrim.mod_types]
default = "game/Data"
dinput = ""
"#,
        )
        .unwrap();
        let game = &games["skyrim"];
        assert_eq!(game.backend, DEFAULT_BACKEND);
        assert!(!game.case_sensitive);
        let deployable: Vec<&str> = game.deployable_mod_types().map(|(id, _)| id).collect();
        assert_eq!(deployable, vec!["default"]);
    }

    #[test]
    fn resolve_paths_joins_root() {
        let mut game: Game = toml::from_str(
            "staging_path = \"staging\"\n[mod_types]\ndefault = \"data\"\nabs = \"/abs\"\n",
        )
        .unwrap();
        game.resolve_paths(Path::new("/root"));
        assert_eq!(game.staging_path, PathBuf::from("/root/staging"));
        assert_eq!(game.mod_types["default"], PathBuf::from("/root/data"));
        assert_eq!(game.mod_types["abs"], PathBuf::from("/abs"));
    }
}
