use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionJson;

/// One installed version found in the shared `versions/` store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledVersion {
    pub id: String,
    pub modified: SystemTime,
}

/// Snapshot of the local version store. A version counts as installed iff
/// `versions/<id>/<id>.json` exists.
#[derive(Debug, Clone, Default)]
pub struct LocalVersionIndex {
    versions: Vec<InstalledVersion>,
}

impl LocalVersionIndex {
    pub fn scan(versions_dir: &Path) -> LauncherResult<Self> {
        if !versions_dir.exists() {
            return Ok(Self::default());
        }

        let entries =
            std::fs::read_dir(versions_dir).map_err(|e| LauncherError::io(versions_dir, e))?;
        let mut versions = Vec::new();
        for entry in entries.flatten() {
            let id = entry.file_name().to_string_lossy().into_owned();
            let json = VersionJson::json_path(versions_dir, &id);
            let Ok(meta) = std::fs::metadata(&json) else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            versions.push(InstalledVersion { id, modified });
        }
        versions.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Version store holds {} installed versions", versions.len());
        Ok(Self { versions })
    }

    /// Build an index from known entries without touching the disk.
    #[cfg(test)]
    pub(crate) fn from_entries(versions: Vec<InstalledVersion>) -> Self {
        Self { versions }
    }

    pub fn is_installed(&self, id: &str) -> bool {
        self.versions.iter().any(|v| v.id == id)
    }

    pub fn versions(&self) -> &[InstalledVersion] {
        &self.versions
    }

    /// Most recently modified installed id that starts with one of
    /// `prefixes` and ends with `suffix`.
    pub fn newest_matching(&self, prefixes: &[&str], suffix: &str) -> Option<String> {
        self.versions
            .iter()
            .filter(|v| v.id.ends_with(suffix) && prefixes.iter().any(|p| v.id.starts_with(p)))
            .max_by_key(|v| v.modified)
            .map(|v| v.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn scan_counts_only_directories_with_version_json() {
        let temp = tempfile::tempdir().unwrap();
        let versions = temp.path();
        std::fs::create_dir_all(versions.join("1.20.1")).unwrap();
        std::fs::write(VersionJson::json_path(versions, "1.20.1"), "{}").unwrap();
        std::fs::create_dir_all(versions.join("half-installed")).unwrap();
        std::fs::write(versions.join("half-installed").join("half-installed.jar"), "x").unwrap();

        let index = LocalVersionIndex::scan(versions).unwrap();
        assert!(index.is_installed("1.20.1"));
        assert!(!index.is_installed("half-installed"));
        assert_eq!(index.versions().len(), 1);
    }

    #[test]
    fn missing_store_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let index = LocalVersionIndex::scan(&temp.path().join("nope")).unwrap();
        assert!(index.versions().is_empty());
    }

    #[test]
    fn newest_matching_uses_prefix_suffix_and_mtime() {
        let index = LocalVersionIndex::from_entries(vec![
            InstalledVersion { id: "fabric-loader-0.14.0-1.20.1".into(), modified: at(10) },
            InstalledVersion { id: "fabric-loader-0.15.0-1.20.1".into(), modified: at(20) },
            InstalledVersion { id: "fabric-loader-0.16.0-1.20.4".into(), modified: at(30) },
            InstalledVersion { id: "custom-1.20.1".into(), modified: at(40) },
        ]);
        assert_eq!(
            index.newest_matching(&["fabric-loader-"], "1.20.1").as_deref(),
            Some("fabric-loader-0.15.0-1.20.1")
        );
        assert_eq!(index.newest_matching(&["quilt-loader-"], "1.20.1"), None);
    }
}
