//! Application-wide settings from `settings.toml`.
use serde::Deserialize;

/// Directory name (below the staging path) holding generated merge output.
pub const DEFAULT_MERGE_DIR: &str = "__merged";

/// Application-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Id of this application instance, stamped into every manifest.
    pub instance_id: String,
    /// Profile currently active, if any.
    pub active_profile: Option<String>,
    /// Name of the merge-output directory below the staging path.
    pub merge_dir: String,
    /// Set while a multi-mod batch installation is running.
    pub batch_install_active: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instance_id: "local".to_string(),
            active_profile: None,
            merge_dir: DEFAULT_MERGE_DIR.to_string(),
            batch_install_active: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let s: Settings = toml::from_str("").unwrap();
        assert_eq!(s.instance_id, "local");
        assert_eq!(s.merge_dir, DEFAULT_MERGE_DIR);
        assert!(s.active_profile.is_none());
        assert!(!s.batch_install_active);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let s: Settings = toml::from_str("active_profile = \"main\"").unwrap();
        assert_eq!(s.active_profile.as_deref(), Some("main"));
        assert_eq!(s.merge_dir, DEFAULT_MERGE_DIR);
    }
}
