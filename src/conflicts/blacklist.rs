//! File name patterns that never count as conflicts.
use glob::{MatchOptions, Pattern, PatternError};

/// Installer metadata, documentation and manifests.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "fomod/*",
    "*.fomod",
    "readme*",
    "*readme.txt",
    "license*",
    "changelog*",
    "meta.ini",
    "*.md",
    "__folder_managed_by_*",
    "moddeploy.deployment*",
];

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled glob blacklist.
///
/// A path is ignored if a pattern matches the whole relative path or its
/// file name.
#[derive(Debug, Clone)]
pub struct Blacklist {
    patterns: Vec<Pattern>,
}

impl Blacklist {
    /// Compile `patterns`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid pattern's error.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// `true` if `rel_path` (with `/` separators) is blacklisted.
    #[must_use]
    pub fn is_ignored(&self, rel_path: &str) -> bool {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        self.patterns
            .iter()
            .any(|p| p.matches_with(rel_path, OPTIONS) || p.matches_with(name, OPTIONS))
    }
}

impl Default for Blacklist {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }
}
