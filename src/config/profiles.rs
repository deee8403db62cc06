//! Profiles from `profiles.toml`: which mods are enabled for a game.
//!
//! ```toml
//! [main]
//! game = "skyrim"
//! mods = { skyui = true, ussep = true, old = false }
//! ```
use std::collections::BTreeMap;

use serde::Deserialize;

/// A profile: one enabled-mod set for one game.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Profile id; the key in `profiles.toml`.
    #[serde(skip)]
    pub id: String,
    /// Game this profile belongs to.
    pub game: String,
    /// Mod id to enabled flag.
    #[serde(default)]
    pub mods: BTreeMap<String, bool>,
}

impl Profile {
    /// `true` if `mod_id` is enabled in this profile.
    #[must_use]
    pub fn is_enabled(&self, mod_id: &str) -> bool {
        self.mods.get(mod_id).copied().unwrap_or(false)
    }

    /// Ids of all enabled mods, sorted.
    pub fn enabled_mods(&self) -> impl Iterator<Item = &str> {
        self.mods
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(id, _)| id.as_str())
    }
}

/// Pick the profile purge and conflict checks operate on.
///
/// The active profile wins when it belongs to `game_id`. Otherwise, when
/// `unmanaging` is set, any profile of the game is accepted since the caller
/// only needs a profile to locate deployed files.
#[must_use]
pub fn resolve<'a>(
    profiles: &'a BTreeMap<String, Profile>,
    active: Option<&str>,
    game_id: &str,
    unmanaging: bool,
) -> Option<&'a Profile> {
    if let Some(profile) = active.and_then(|id| profiles.get(id))
        && profile.game == game_id
    {
        return Some(profile);
    }
    if unmanaging {
        return profiles.values().find(|p| p.game == game_id);
    }
    None
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn profiles() -> BTreeMap<String, Profile> {
        let mut map: BTreeMap<String, Profile> = toml::from_str(
            r#"
[main]
game = "skyrim"
mods = { a = true, b = false, c = true }

[alt]
game = "fallout"
"#,
        )
        .unwrap();
        for (id, p) in &mut map {
            p.id.clone_from(id);
        }
        map
    }

    #[test]
    fn enabled_mods_filters_disabled() {
        let map = profiles();
        let enabled: Vec<&str> = map["main"].enabled_mods().collect();
        assert_eq!(enabled, vec!["a", "c"]);
        assert!(!map["main"].is_enabled("b"));
        assert!(!map["main"].is_enabled("missing"));
    }

    #[test]
    fn resolve_active_profile_for_game() {
        let map = profiles();
        let p = resolve(&map, Some("main"), "skyrim", false).unwrap();
        assert_eq!(p.id, "main");
    }

    #[test]
    fn resolve_rejects_profile_of_other_game() {
        let map = profiles();
        assert!(resolve(&map, Some("main"), "fallout", false).is_none());
    }

    #[test]
    fn unmanaging_accepts_any_profile_of_game() {
        let map = profiles();
        let p = resolve(&map, Some("main"), "fallout", true).unwrap();
        assert_eq!(p.id, "alt");
        assert!(resolve(&map, None, "oblivion", true).is_none());
    }
}
