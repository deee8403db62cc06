//! Memoized conflict detection.
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::blacklist::Blacklist;
use super::detector::{ConflictMap, detect};
use crate::config::Mod;

/// Caches the last conflict map.
///
/// The cached map is reused while the fingerprint of the inputs (staging
/// path, case sensitivity, and each mod's id, type, installation path and
/// rules) and the version counter are unchanged. Call
/// [`invalidate`](Self::invalidate) after deploying or purging, since staged
/// content can change without touching the fingerprinted inputs.
#[derive(Debug, Default)]
pub struct ConflictCache {
    version: u64,
    computations: usize,
    last: Option<Entry>,
}

#[derive(Debug)]
struct Entry {
    fingerprint: [u8; 32],
    version: u64,
    map: Arc<ConflictMap>,
}

impl ConflictCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next [`get`](Self::get) to recompute.
    pub const fn invalidate(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Current version counter.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// How many times the map was actually computed.
    #[must_use]
    pub const fn computations(&self) -> usize {
        self.computations
    }

    /// The conflict map for `mods`, recomputed only when an input changed.
    pub fn get(
        &mut self,
        staging_path: &Path,
        mods: &[&Mod],
        case_sensitive: bool,
        blacklist: &Blacklist,
    ) -> Arc<ConflictMap> {
        let fingerprint = fingerprint(staging_path, mods, case_sensitive);
        if let Some(entry) = &self.last
            && entry.fingerprint == fingerprint
            && entry.version == self.version
        {
            debug!("conflict map cache hit");
            return Arc::clone(&entry.map);
        }

        let map = Arc::new(detect(staging_path, mods, case_sensitive, blacklist));
        self.computations += 1;
        self.last = Some(Entry {
            fingerprint,
            version: self.version,
            map: Arc::clone(&map),
        });
        map
    }
}

/// SHA-256 over everything conflict detection depends on, independent of
/// the order of `mods`.
#[must_use]
pub fn fingerprint(staging_path: &Path, mods: &[&Mod], case_sensitive: bool) -> [u8; 32] {
    let mut sorted: Vec<&Mod> = mods.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = Sha256::new();
    hasher.update(staging_path.to_string_lossy().as_bytes());
    hasher.update([u8::from(case_sensitive)]);
    for m in sorted {
        for field in [&m.id, &m.mod_type, &m.installation_path] {
            hasher.update(field.as_bytes());
            hasher.update([0]);
        }
        // Rules serialize deterministically; a failure only weakens the key.
        if let Ok(rules) = serde_json::to_vec(&m.rules) {
            hasher.update(&rules);
        }
        hasher.update([0xff]);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
