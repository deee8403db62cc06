//! Fuzzy mod references and matching against installed mods.
use serde::{Deserialize, Serialize};

use crate::config::mods::Mod;

/// A fuzzy mod identifier.
///
/// Any subset of the fields may be set; unset fields act as wildcards.
/// A reference with none of the identifying fields (`id`, `file_md5`,
/// `logical_file_name`, `file_expression`) matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModReference {
    /// Exact mod id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Content hash of the mod archive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_md5: Option<String>,
    /// Logical (version-independent) file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_file_name: Option<String>,
    /// Exact name or glob over the sanitized archive file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_expression: Option<String>,
    /// Semver range; `*` matches any version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_match: Option<String>,
}

impl ModReference {
    /// Reference a mod by its id only.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Test whether this reference matches `candidate`.
    #[must_use]
    pub fn matches(&self, candidate: &Mod) -> bool {
        let attrs = &candidate.attributes;

        if let Some(id) = &self.id
            && id != &candidate.id
        {
            return false;
        }

        let fuzzy = self.version_match.as_deref().is_some_and(is_fuzzy_version);

        let identified = self.id.is_some()
            || (!fuzzy && self.file_md5.is_some() && attrs.file_md5.is_some())
            || (self.file_expression.is_some() && attrs.file_name.is_some())
            || (self.logical_file_name.is_some() && attrs.logical_file_name.is_some());
        if !identified {
            return false;
        }

        if let Some(md5) = &self.file_md5
            && !fuzzy
            && attrs.file_md5.as_ref() != Some(md5)
        {
            return false;
        }

        if let Some(lfn) = &self.logical_file_name
            && self.file_expression.is_none()
            && attrs.logical_file_name.as_ref() != Some(lfn)
        {
            return false;
        }

        if let Some(expr) = &self.file_expression {
            let Some(file_name) = &attrs.file_name else {
                return false;
            };
            let base = sanitize_expression(file_name);
            let glob_match = glob::Pattern::new(expr).is_ok_and(|p| p.matches(&base));
            if &base != expr && !glob_match {
                return false;
            }
        }

        if let Some(range) = &self.version_match
            && range != "*"
            && let Some(version) = &attrs.version
            && !version_satisfies(version, range)
        {
            return false;
        }

        true
    }

    /// Short human-readable rendering used in logs and CLI output.
    #[must_use]
    pub fn describe(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        let mut parts = Vec::new();
        if let Some(lfn) = &self.logical_file_name {
            parts.push(lfn.clone());
        }
        if let Some(expr) = &self.file_expression {
            parts.push(expr.clone());
        }
        if let Some(md5) = &self.file_md5 {
            parts.push(format!("md5:{md5}"));
        }
        if let Some(range) = &self.version_match {
            parts.push(format!("@{range}"));
        }
        if parts.is_empty() {
            "<unidentified>".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Strip the extension, a trailing `.N` counter and a trailing ` (N)`
/// duplicate marker from an archive file name.
#[must_use]
pub fn sanitize_expression(file_name: &str) -> String {
    let base = std::path::Path::new(file_name)
        .file_stem()
        .map_or_else(|| file_name.to_string(), |s| s.to_string_lossy().into_owned());
    let base = strip_numeric_suffix(&base, '.', "");
    strip_numeric_suffix(&base, '(', ")")
        .trim_end()
        .to_string()
}

fn strip_numeric_suffix(input: &str, open: char, close: &str) -> String {
    let Some(body) = input.strip_suffix(close) else {
        return input.to_string();
    };
    match body.rfind(open) {
        Some(pos) => {
            let digits = body.get(pos + open.len_utf8()..).unwrap_or_default();
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                body.get(..pos).unwrap_or(body).to_string()
            } else {
                input.to_string()
            }
        }
        None => input.to_string(),
    }
}

/// Coerce loose versions such as `1.2` or `v1` into full semver.
fn coerce_version(input: &str) -> Option<semver::Version> {
    let trimmed = input.trim().trim_start_matches('v');
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }
    let mut parts = trimmed.split('.').map(|p| p.parse::<u64>().ok());
    let major = parts.next()??;
    let minor = parts.next().unwrap_or(Some(0))?;
    let patch = parts.next().unwrap_or(Some(0))?;
    Some(semver::Version::new(major, minor, patch))
}

/// `true` if `range` describes more than one version.
fn is_fuzzy_version(range: &str) -> bool {
    if range == "*" || range.ends_with("+prefer") {
        return true;
    }
    coerce_version(range).is_none() && semver::VersionReq::parse(range).is_ok()
}

fn version_satisfies(version: &str, range: &str) -> bool {
    let range = range.split('+').next().unwrap_or(range);
    if version == range {
        return true;
    }
    let Some(parsed) = coerce_version(version) else {
        return false;
    };
    if coerce_version(range).is_some_and(|r| r == parsed) {
        return true;
    }
    semver::VersionReq::parse(range).is_ok_and(|req| req.matches(&parsed))
}
