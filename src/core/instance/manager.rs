use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::model::{InstancePaths, InstanceRecord, ModFile, INSTANCE_FILE};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::modpack::PackManifest;

/// Reads and writes instance directories on disk.
#[derive(Debug, Clone)]
pub struct InstanceManager {
    /// Root directory where all instances live.
    instances_dir: PathBuf,
}

impl InstanceManager {
    pub fn new(instances_dir: impl Into<PathBuf>) -> Self {
        Self {
            instances_dir: instances_dir.into(),
        }
    }

    pub fn instances_dir(&self) -> &Path {
        &self.instances_dir
    }

    pub fn paths(&self, slug: &str) -> InstancePaths {
        InstancePaths::new(self.instances_dir.join(slug))
    }

    /// Save instance metadata to disk.
    pub async fn save(&self, record: &InstanceRecord) -> LauncherResult<()> {
        let json = serde_json::to_string_pretty(record)?;
        let paths = self.paths(&record.slug);

        tokio::fs::create_dir_all(paths.root())
            .await
            .map_err(|e| LauncherError::io(paths.root(), e))?;

        let record_path = paths.record_path();
        tokio::fs::write(&record_path, json)
            .await
            .map_err(|e| LauncherError::io(&record_path, e))?;

        info!("Saved instance '{}' ({})", record.name, record.slug);
        Ok(())
    }

    /// Load a single instance by slug.
    pub async fn load(&self, slug: &str) -> LauncherResult<InstanceRecord> {
        let record_path = self.paths(slug).record_path();
        if !record_path.exists() {
            return Err(LauncherError::InstanceNotFound(slug.to_string()));
        }

        let json = tokio::fs::read_to_string(&record_path)
            .await
            .map_err(|e| LauncherError::io(&record_path, e))?;

        Ok(serde_json::from_str(&json)?)
    }

    /// List all instances, oldest first. Corrupt records are logged and skipped.
    pub async fn list(&self) -> LauncherResult<Vec<InstanceRecord>> {
        let mut instances = Vec::new();

        if !self.instances_dir.exists() {
            return Ok(instances);
        }

        let mut entries = tokio::fs::read_dir(&self.instances_dir)
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&self.instances_dir, e))?
        {
            let record_path = entry.path().join(INSTANCE_FILE);
            if !record_path.is_file() {
                continue;
            }
            match tokio::fs::read_to_string(&record_path).await {
                Ok(json) => match serde_json::from_str::<InstanceRecord>(&json) {
                    Ok(record) => instances.push(record),
                    Err(e) => warn!("Corrupt instance.json at {:?}: {}", record_path, e),
                },
                Err(e) => warn!("Cannot read {:?}: {}", record_path, e),
            }
        }

        instances.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(instances)
    }

    /// Jar files under `mods/`. A `.jar.disabled` suffix is reported as disabled.
    pub async fn list_mods(&self, slug: &str) -> LauncherResult<Vec<ModFile>> {
        if !self.exists(slug) {
            return Err(LauncherError::InstanceNotFound(slug.to_string()));
        }

        let mods_dir = self.paths(slug).mods_dir();
        let mut mods = Vec::new();
        if !mods_dir.is_dir() {
            return Ok(mods);
        }

        let mut entries = tokio::fs::read_dir(&mods_dir)
            .await
            .map_err(|e| LauncherError::io(&mods_dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LauncherError::io(&mods_dir, e))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let enabled = if file_name.ends_with(".jar") {
                true
            } else if file_name.ends_with(".jar.disabled") {
                false
            } else {
                continue;
            };
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| LauncherError::io(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            mods.push(ModFile {
                file_name,
                enabled,
                size: metadata.len(),
            });
        }

        mods.sort_by(|a, b| a.file_name.to_lowercase().cmp(&b.file_name.to_lowercase()));
        Ok(mods)
    }

    /// Parse the pack manifest copy persisted at install time.
    pub async fn pack_manifest(&self, slug: &str) -> LauncherResult<PackManifest> {
        let path = self.paths(slug).pack_manifest_path();
        if !path.exists() {
            return Err(LauncherError::Manifest(format!(
                "instance '{}' has no pack manifest",
                slug
            )));
        }
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        PackManifest::from_slice(&raw)
    }

    pub fn log_path(&self, slug: &str) -> PathBuf {
        self.paths(slug).log_path()
    }
}
