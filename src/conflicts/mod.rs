//! File conflicts between enabled mods.
//!
//! Two mods conflict when both stage a file at the same relative path (after
//! case folding on case-insensitive destinations). The resulting
//! [`ConflictMap`] feeds the unresolved-conflict scan and cycle repair in
//! [`rules`](crate::rules).
mod blacklist;
mod cache;
mod detector;

pub use blacklist::{Blacklist, DEFAULT_PATTERNS};
pub use cache::{ConflictCache, fingerprint};
pub use detector::{Conflict, ConflictMap, detect};
