// ─── Launcher Configuration ───
// Explicit directory layout and endpoint settings, built once at startup and
// handed to every component.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "CottageLauncher";
const SETTINGS_FILE: &str = "launcher_settings.json";

pub const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 10;

/// Remote endpoints. Overridable so tests can point them at a mock server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub modrinth_api: String,
    pub adoptium_api: String,
    pub version_manifest_url: String,
    pub resources_url: String,
    pub mojang_libraries: String,
    pub fabric_meta: String,
    pub fabric_maven: String,
    pub quilt_meta: String,
    pub quilt_maven: String,
    pub forge_maven: String,
    pub neoforge_maven: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            modrinth_api: "https://api.modrinth.com/v2".into(),
            adoptium_api: "https://api.adoptium.net/v3".into(),
            version_manifest_url:
                "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json".into(),
            resources_url: "https://resources.download.minecraft.net".into(),
            mojang_libraries: "https://libraries.minecraft.net".into(),
            fabric_meta: "https://meta.fabricmc.net/v2".into(),
            fabric_maven: "https://maven.fabricmc.net".into(),
            quilt_meta: "https://meta.quiltmc.org/v3".into(),
            quilt_maven: "https://maven.quiltmc.org/repository/release".into(),
            forge_maven: "https://maven.minecraftforge.net".into(),
            neoforge_maven: "https://maven.neoforged.net/releases".into(),
        }
    }
}

/// Settings persisted as `launcher_settings.json` inside the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub data_dir: PathBuf,
    /// One sub-directory per instance slug.
    pub instances_dir: PathBuf,
    /// Shared `versions/`, `libraries/` and `assets/` store.
    pub game_dir: PathBuf,
    /// Provisioned Java runtimes, one directory per feature version.
    pub runtimes_dir: PathBuf,
    /// Scratch space for archives and extraction.
    pub temp_dir: PathBuf,
    pub download_concurrency: usize,
    pub max_memory_mb: u32,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub endpoints: Endpoints,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}

impl LauncherConfig {
    /// Build a config whose directories all live under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            instances_dir: data_dir.join("instances"),
            game_dir: data_dir.join("minecraft"),
            runtimes_dir: data_dir.join("runtimes"),
            temp_dir: data_dir.join("tmp"),
            data_dir,
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            max_memory_mb: 4096,
            user_agent: format!("CottageLauncher/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 20,
            read_timeout_secs: 60,
            endpoints: Endpoints::default(),
        }
    }

    /// Platform data directory, e.g. `~/.local/share/CottageLauncher`.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    /// Load `launcher_settings.json` from `data_dir`, or fall back to defaults
    /// rooted there when the file does not exist. Keys missing from the file
    /// keep their `data_dir`-relative defaults.
    pub fn load(data_dir: &Path) -> LauncherResult<Self> {
        let path = data_dir.join(SETTINGS_FILE);
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::new(data_dir));
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
        let overrides: serde_json::Value = serde_json::from_str(&raw)?;
        let mut merged = serde_json::to_value(Self::new(data_dir))?;
        merge_json(&mut merged, overrides);
        let mut config: LauncherConfig = serde_json::from_value(merged)?;
        if config.download_concurrency == 0 {
            config.download_concurrency = DEFAULT_DOWNLOAD_CONCURRENCY;
        }
        info!("Loaded launcher settings from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> LauncherResult<()> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| LauncherError::io(&self.data_dir, e))?;
        let path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
    }

    /// Create every configured root directory.
    pub fn ensure_dirs(&self) -> LauncherResult<()> {
        for dir in [
            &self.data_dir,
            &self.instances_dir,
            &self.game_dir,
            &self.runtimes_dir,
            &self.temp_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| LauncherError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.game_dir.join("versions")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.game_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.game_dir.join("assets")
    }
}

fn merge_json(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_all_roots_from_data_dir() {
        let config = LauncherConfig::new("/srv/cottage");
        assert_eq!(config.instances_dir, PathBuf::from("/srv/cottage/instances"));
        assert_eq!(
            config.libraries_dir(),
            PathBuf::from("/srv/cottage/minecraft/libraries")
        );
        assert_eq!(config.download_concurrency, 10);
    }

    #[test]
    fn load_falls_back_to_defaults_and_roundtrips_save() {
        let temp = tempfile::tempdir().unwrap();
        let loaded = LauncherConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.data_dir, temp.path());

        let mut changed = loaded.clone();
        changed.download_concurrency = 3;
        changed.endpoints.modrinth_api = "http://127.0.0.1:9/v2".into();
        changed.save().unwrap();

        let reloaded = LauncherConfig::load(temp.path()).unwrap();
        assert_eq!(reloaded.download_concurrency, 3);
        assert_eq!(reloaded.endpoints.modrinth_api, "http://127.0.0.1:9/v2");
    }

    #[test]
    fn partial_settings_file_keeps_defaults_for_missing_keys() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(
            temp.path().join(SETTINGS_FILE),
            r#"{"max_memory_mb": 2048, "download_concurrency": 0}"#,
        )
        .unwrap();

        let config = LauncherConfig::load(temp.path()).unwrap();
        assert_eq!(config.max_memory_mb, 2048);
        assert_eq!(config.download_concurrency, DEFAULT_DOWNLOAD_CONCURRENCY);
        assert_eq!(config.instances_dir, temp.path().join("instances"));
        assert!(config.endpoints.adoptium_api.starts_with("https://"));
    }
}
