use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const INSTANCE_FILE: &str = "instance.json";
pub const PACK_MANIFEST_FILE: &str = "modrinth.index.json";
pub const LAUNCH_LOG_FILE: &str = "launcher-output.log";

/// Instance record persisted to disk as `instance.json`.
///
/// Each instance owns `instances/<slug>/`, which is also the game working
/// directory:
/// - `mods/`, `config/`, ...: pack files and overrides
/// - `modrinth.index.json`  : copy of the installed pack manifest
/// - `logs/launcher-output.log`
/// - `instance.json`        : this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    pub slug: String,
    /// Catalog version id the pack was installed from.
    pub version_id: String,
    pub created_at: DateTime<Utc>,
    /// Upstream project id, kept for future update checks.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Upstream version number, kept for future update checks.
    #[serde(default)]
    pub version_number: Option<String>,
}

impl InstanceRecord {
    pub fn new(name: impl Into<String>, version_id: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            slug: slugify(&name),
            name,
            version_id: version_id.into(),
            created_at: Utc::now(),
            project_id: None,
            version_number: None,
        }
    }

    pub fn with_upstream(
        mut self,
        project_id: Option<String>,
        version_number: Option<String>,
    ) -> Self {
        self.project_id = project_id;
        self.version_number = version_number;
        self
    }
}

/// A jar found under an instance's `mods/` folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModFile {
    pub file_name: String,
    pub enabled: bool,
    pub size: u64,
}

/// Directory layout helpers for one instance root.
#[derive(Debug, Clone)]
pub struct InstancePaths {
    root: PathBuf,
}

impl InstancePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self) -> PathBuf {
        self.root.join(INSTANCE_FILE)
    }

    pub fn pack_manifest_path(&self) -> PathBuf {
        self.root.join(PACK_MANIFEST_FILE)
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn natives_dir(&self) -> PathBuf {
        self.root.join("natives")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir().join(LAUNCH_LOG_FILE)
    }
}

/// Derive a filesystem-safe slug from a display name.
///
/// Lowercases, drops everything except ASCII letters, digits, whitespace,
/// `_` and `-`, then collapses separator runs into one hyphen. An empty
/// result becomes `instance-<8 hex>`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        let suffix = Uuid::new_v4().simple().to_string();
        return format!("instance-{}", &suffix[..8]);
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_slug_shaped(slug: &str) -> bool {
        !slug.is_empty()
            && slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    }

    #[test]
    fn slug_basic_names() {
        assert_eq!(slugify("Fabulously Optimized"), "fabulously-optimized");
        assert_eq!(slugify("  My__Pack -- v2 "), "my-pack-v2");
        assert_eq!(slugify("Create: Above & Beyond!"), "create-above-beyond");
    }

    #[test]
    fn slug_strips_symbols_without_inserting_separators() {
        assert_eq!(slugify("a.b/c"), "abc");
    }

    #[test]
    fn empty_slug_gets_random_placeholder() {
        let slug = slugify("!!! ***");
        assert!(slug.starts_with("instance-"));
        assert_eq!(slug.len(), "instance-".len() + 8);
        assert_ne!(slugify(""), slugify(""));
    }

    #[test]
    fn slug_is_idempotent_and_well_formed() {
        for input in ["Über Pack", "ÆØÅ", "x", "--lead-and-trail--", "日本語 pack", "\t\n"] {
            let once = slugify(input);
            assert!(is_slug_shaped(&once), "bad slug {once:?} for {input:?}");
            assert!(!once.starts_with('-') && !once.ends_with('-'));
            if !once.starts_with("instance-") {
                assert_eq!(slugify(&once), once);
            }
        }
    }

    #[test]
    fn record_serializes_iso_timestamp() {
        let record = InstanceRecord::new("Test Pack", "abc123")
            .with_upstream(Some("proj".into()), Some("1.0.0".into()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["slug"], "test-pack");
        assert!(json["created_at"].as_str().unwrap().contains('T'));
        let back: InstanceRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
