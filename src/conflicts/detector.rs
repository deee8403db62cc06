//! Walking staged mods and building the symmetric conflict map.
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use super::blacklist::Blacklist;
use crate::config::Mod;
use crate::rules::RuleType;

/// Files one mod shares with another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The other mod.
    pub other: String,
    /// Overlapping paths relative to the destination, sorted.
    pub files: Vec<String>,
    /// Suggested rule for the owning mod based on file ages: `after` if all
    /// of its files are newer, `before` if all are older.
    pub suggestion: Option<RuleType>,
}

/// `mod -> conflicts`, symmetric: `b` appears under `a` with paths `P`
/// exactly when `a` appears under `b` with the same `P`.
pub type ConflictMap = BTreeMap<String, Vec<Conflict>>;

/// One staged file of one mod.
#[derive(Debug, Clone)]
struct StagedFile {
    rel_path: String,
    modified: Option<SystemTime>,
}

/// Build the conflict map for `mods`, whose files live below `staging_path`.
///
/// Mods are walked in parallel. Paths are compared case-insensitively
/// unless `case_sensitive`, and only between mods of the same mod type.
#[must_use]
pub fn detect(
    staging_path: &Path,
    mods: &[&Mod],
    case_sensitive: bool,
    blacklist: &Blacklist,
) -> ConflictMap {
    let walked: Vec<(&Mod, BTreeMap<String, StagedFile>)> = mods
        .par_iter()
        .map(|m| (*m, walk_mod(staging_path, m, case_sensitive, blacklist)))
        .collect();

    // (mod type, normalized path) -> providers
    let mut providers: BTreeMap<(&str, &str), Vec<(&str, &StagedFile)>> = BTreeMap::new();
    for (m, files) in &walked {
        for (key, file) in files {
            providers
                .entry((m.mod_type.as_str(), key.as_str()))
                .or_default()
                .push((m.id.as_str(), file));
        }
    }

    let mut pairs: BTreeMap<(&str, &str), Vec<(String, Age)>> = BTreeMap::new();
    let mut conflicting = 0usize;
    for list in providers.values().filter(|l| l.len() > 1) {
        conflicting += 1;
        let display = list
            .iter()
            .map(|(_, f)| f.rel_path.as_str())
            .min()
            .unwrap_or_default();
        for (a, file_a) in list {
            for (b, file_b) in list {
                if a != b {
                    pairs
                        .entry((*a, *b))
                        .or_default()
                        .push((display.to_string(), compare(file_a.modified, file_b.modified)));
                }
            }
        }
    }

    let mut map = ConflictMap::new();
    for ((a, b), mut files) in pairs {
        files.sort_by(|x, y| x.0.cmp(&y.0));
        files.dedup_by(|x, y| x.0 == y.0);
        let suggestion = suggest(files.iter().map(|(_, o)| *o));
        map.entry(a.to_string()).or_default().push(Conflict {
            other: b.to_string(),
            files: files.into_iter().map(|(path, _)| path).collect(),
            suggestion,
        });
    }
    debug!(
        mods = mods.len(),
        conflicting,
        "conflict detection finished"
    );
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Age {
    Newer,
    Older,
    Unknown,
}

fn compare(a: Option<SystemTime>, b: Option<SystemTime>) -> Age {
    match (a, b) {
        (Some(a), Some(b)) if a > b => Age::Newer,
        (Some(a), Some(b)) if a < b => Age::Older,
        _ => Age::Unknown,
    }
}

fn suggest(mut orderings: impl Iterator<Item = Age>) -> Option<RuleType> {
    let first = orderings.next()?;
    if orderings.any(|o| o != first) {
        return None;
    }
    match first {
        Age::Newer => Some(RuleType::After),
        Age::Older => Some(RuleType::Before),
        Age::Unknown => None,
    }
}

/// Files of `m` keyed by normalized relative path.
fn walk_mod(
    staging_path: &Path,
    m: &Mod,
    case_sensitive: bool,
    blacklist: &Blacklist,
) -> BTreeMap<String, StagedFile> {
    let root = staging_path.join(&m.installation_path);
    let mut files = BTreeMap::new();
    if !root.is_dir() {
        debug!("mod '{}' has no staged files at {}", m.id, root.display());
        return files;
    }
    for entry in WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir())
    {
        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if blacklist.is_ignored(&rel_path) {
            continue;
        }
        let key = if case_sensitive {
            rel_path.clone()
        } else {
            rel_path.to_lowercase()
        };
        let modified = entry.metadata().ok().and_then(|md| md.modified().ok());
        files.insert(key, StagedFile { rel_path, modified });
    }
    files
}
