//! Installed mods and their authored rules, loaded from `mods.toml`.
//!
//! ```toml
//! [skyrim.skyui]
//! installation_path = "skyui"
//! mod_type = "default"
//! attributes = { logical_file_name = "SkyUI", version = "5.2.0" }
//! rules = [{ type = "after", reference = { id = "ussep" } }]
//! ```
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use super::DEFAULT_MOD_TYPE;
use crate::rules::{ModReference, Rule, RuleType};

/// Identifying attributes a [`ModReference`] is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModAttributes {
    /// Content hash of the source archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    /// Version-independent file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_file_name: Option<String>,
    /// Archive file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Installed version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// An installed mod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mod {
    /// Stable id; the key in `mods.toml`.
    #[serde(skip)]
    pub id: String,
    /// Directory below the game's staging path holding the mod's files.
    #[serde(default)]
    pub installation_path: String,
    /// Mod type id; selects the destination directory.
    #[serde(default = "default_mod_type")]
    pub mod_type: String,
    /// Identifying attributes.
    #[serde(default)]
    pub attributes: ModAttributes,
    /// Rules authored on this mod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

fn default_mod_type() -> String {
    DEFAULT_MOD_TYPE.to_string()
}

impl Mod {
    /// Create a mod of the default type installed under a directory named
    /// after its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            installation_path: id.clone(),
            id,
            mod_type: default_mod_type(),
            attributes: ModAttributes::default(),
            rules: Vec::new(),
        }
    }

    /// Add a rule referencing `other` by id.
    #[must_use]
    pub fn with_rule(mut self, rule_type: RuleType, other: &str) -> Self {
        self.rules
            .push(Rule::new(rule_type, ModReference::by_id(other)));
        self
    }

    /// Set the mod type.
    #[must_use]
    pub fn with_type(mut self, mod_type: &str) -> Self {
        self.mod_type = mod_type.to_string();
        self
    }
}

/// Mods per game: `game id -> mod id -> mod`.
pub type ModTable = BTreeMap<String, BTreeMap<String, Mod>>;

/// Load `mods.toml`, filling in each mod's id and default installation path.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load(path: &Path) -> Result<ModTable> {
    let mut table: ModTable = super::toml_loader::load_config(path)?;
    for mods in table.values_mut() {
        for (id, m) in mods.iter_mut() {
            m.id.clone_from(id);
            if m.installation_path.is_empty() {
                m.installation_path.clone_from(id);
            }
        }
    }
    Ok(table)
}

/// Write `table` back to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save(path: &Path, table: &ModTable) -> Result<()> {
    let content = toml::to_string_pretty(table).context("serializing mods.toml")?;
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// Shorthand used by unit tests.
#[cfg(test)]
pub fn test_mod(id: &str) -> Mod {
    Mod::new(id)
}
