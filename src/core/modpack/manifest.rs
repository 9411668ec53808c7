use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};

pub const MANIFEST_FILE_NAME: &str = "modrinth.index.json";
pub const MINECRAFT_KEY: &str = "minecraft";

/// Overlay directories inside a pack archive, applied in this order.
pub const OVERLAY_DIRS: [&str; 2] = ["overrides", "client-overrides"];

/// `modrinth.index.json` as shipped inside a `.mrpack`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackManifest {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default = "default_game")]
    pub game: String,
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub files: Vec<PackFile>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

fn default_format_version() -> u32 {
    1
}

fn default_game() -> String {
    MINECRAFT_KEY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackFile {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub downloads: Vec<String>,
    #[serde(default)]
    pub hashes: FileHashes,
    #[serde(default)]
    pub env: Option<FileEnv>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileHashes {
    pub sha1: Option<String>,
    pub sha512: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEnv {
    #[serde(default)]
    pub client: EnvSupport,
    #[serde(default)]
    pub server: EnvSupport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvSupport {
    #[default]
    Required,
    Optional,
    Unsupported,
}

impl PackFile {
    /// Server-only entries are not downloaded for a client instance.
    pub fn is_client_file(&self) -> bool {
        self.env
            .as_ref()
            .map(|env| env.client != EnvSupport::Unsupported)
            .unwrap_or(true)
    }

    /// Relative destination, or `None` when the entry must be skipped.
    pub fn destination(&self) -> Option<PathBuf> {
        if self.downloads.iter().all(|u| u.trim().is_empty()) {
            return None;
        }
        safe_relative_path(&self.path)
    }
}

impl PackManifest {
    pub fn from_slice(raw: &[u8]) -> LauncherResult<Self> {
        serde_json::from_slice(raw)
            .map_err(|e| LauncherError::Manifest(format!("invalid {}: {}", MANIFEST_FILE_NAME, e)))
    }

    pub fn pins(&self) -> LauncherResult<DependencyPins> {
        DependencyPins::from_dependencies(&self.dependencies)
    }

    /// Find the manifest at the root of an extracted pack, falling back to
    /// the first match one directory down.
    pub fn locate(extracted_root: &Path) -> LauncherResult<PathBuf> {
        let direct = extracted_root.join(MANIFEST_FILE_NAME);
        if direct.is_file() {
            return Ok(direct);
        }

        let entries =
            std::fs::read_dir(extracted_root).map_err(|e| LauncherError::io(extracted_root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| LauncherError::io(extracted_root, e))?;
            let nested = entry.path().join(MANIFEST_FILE_NAME);
            if nested.is_file() {
                return Ok(nested);
            }
        }

        Err(LauncherError::Manifest(format!(
            "{} not found in pack archive",
            MANIFEST_FILE_NAME
        )))
    }
}

/// The four mutually exclusive loader ecosystems a pack may pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Fabric,
    Quilt,
    Forge,
    NeoForge,
}

impl LoaderKind {
    pub const ALL: [LoaderKind; 4] = [
        LoaderKind::Fabric,
        LoaderKind::Quilt,
        LoaderKind::Forge,
        LoaderKind::NeoForge,
    ];

    /// Key used in the manifest's `dependencies` map.
    pub fn dependency_key(self) -> &'static str {
        match self {
            LoaderKind::Fabric => "fabric-loader",
            LoaderKind::Quilt => "quilt-loader",
            LoaderKind::Forge => "forge",
            LoaderKind::NeoForge => "neoforge",
        }
    }

    /// Prefix of installed version ids produced by this ecosystem.
    pub fn id_prefix(self) -> &'static str {
        match self {
            LoaderKind::Fabric => "fabric-loader-",
            LoaderKind::Quilt => "quilt-loader-",
            LoaderKind::Forge => "forge-",
            LoaderKind::NeoForge => "neoforge-",
        }
    }

    pub fn from_dependency_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.dependency_key() == key)
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderKind::Fabric => write!(f, "fabric"),
            LoaderKind::Quilt => write!(f, "quilt"),
            LoaderKind::Forge => write!(f, "forge"),
            LoaderKind::NeoForge => write!(f, "neoforge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderPin {
    pub kind: LoaderKind,
    pub version: String,
}

/// Base game version plus at most one loader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPins {
    pub minecraft: Option<String>,
    pub loader: Option<LoaderPin>,
}

impl DependencyPins {
    pub fn new(minecraft: impl Into<String>) -> Self {
        Self {
            minecraft: Some(minecraft.into()),
            loader: None,
        }
    }

    pub fn with_loader(mut self, kind: LoaderKind, version: impl Into<String>) -> Self {
        self.loader = Some(LoaderPin {
            kind,
            version: version.into(),
        });
        self
    }

    /// Build pins from a dependency map, rejecting more than one loader.
    /// Unknown keys are ignored.
    pub fn from_dependencies(deps: &BTreeMap<String, String>) -> LauncherResult<Self> {
        let minecraft = deps
            .get(MINECRAFT_KEY)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let mut loaders = deps.iter().filter_map(|(key, version)| {
            LoaderKind::from_dependency_key(key).map(|kind| LoaderPin {
                kind,
                version: version.trim().to_string(),
            })
        });

        let loader = loaders.next();
        if let Some(extra) = loaders.next() {
            return Err(LauncherError::Manifest(format!(
                "pack declares more than one loader ({} and {})",
                loader.map(|l| l.kind.to_string()).unwrap_or_default(),
                extra.kind
            )));
        }

        Ok(Self { minecraft, loader })
    }
}

/// Normalize a pack-relative path, rejecting anything that could escape the
/// instance root: absolute paths, drive prefixes and `..` segments.
pub fn safe_relative_path(raw: &str) -> Option<PathBuf> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return None;
    }

    let mut out = PathBuf::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => return None,
            p if p.contains(':') => return None,
            p => out.push(p),
        }
    }

    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "formatVersion": 1,
        "game": "minecraft",
        "versionId": "5.2.0",
        "name": "Sample Pack",
        "files": [
            {
                "path": "mods/sodium.jar",
                "hashes": {"sha1": "abc", "sha512": "def"},
                "env": {"client": "required", "server": "unsupported"},
                "downloads": ["https://cdn.modrinth.com/sodium.jar"],
                "fileSize": 100
            },
            {
                "path": "mods/server-only.jar",
                "env": {"client": "unsupported", "server": "required"},
                "downloads": ["https://cdn.modrinth.com/server.jar"]
            },
            {"path": "mods/no-url.jar", "downloads": []}
        ],
        "dependencies": {"minecraft": "1.20.1", "fabric-loader": "0.15.0"}
    }"#;

    #[test]
    fn parses_mrpack_index() {
        let manifest = PackManifest::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(manifest.name, "Sample Pack");
        assert_eq!(manifest.files.len(), 3);
        assert_eq!(manifest.files[0].hashes.sha1.as_deref(), Some("abc"));
        assert!(manifest.files[0].is_client_file());
        assert!(!manifest.files[1].is_client_file());
        assert!(manifest.files[2].destination().is_none());

        let pins = manifest.pins().unwrap();
        assert_eq!(pins.minecraft.as_deref(), Some("1.20.1"));
        assert_eq!(
            pins.loader,
            Some(LoaderPin {
                kind: LoaderKind::Fabric,
                version: "0.15.0".into()
            })
        );
    }

    #[test]
    fn invalid_json_is_manifest_error() {
        let err = PackManifest::from_slice(b"{\"files\": 3}").unwrap_err();
        assert!(matches!(err, LauncherError::Manifest(_)));
    }

    #[test]
    fn two_loaders_are_rejected() {
        let mut deps = BTreeMap::new();
        deps.insert("minecraft".to_string(), "1.20.1".to_string());
        deps.insert("forge".to_string(), "47.2.0".to_string());
        deps.insert("fabric-loader".to_string(), "0.15.0".to_string());
        let err = DependencyPins::from_dependencies(&deps).unwrap_err();
        assert!(matches!(err, LauncherError::Manifest(_)));
    }

    #[test]
    fn vanilla_pins_have_no_loader() {
        let mut deps = BTreeMap::new();
        deps.insert("minecraft".to_string(), "1.20.6".to_string());
        let pins = DependencyPins::from_dependencies(&deps).unwrap();
        assert_eq!(pins, DependencyPins::new("1.20.6"));
    }

    #[test]
    fn relative_path_safety() {
        assert_eq!(
            safe_relative_path("mods/a.jar"),
            Some(PathBuf::from("mods").join("a.jar"))
        );
        assert_eq!(
            safe_relative_path("./config//x.toml"),
            Some(PathBuf::from("config").join("x.toml"))
        );
        assert_eq!(safe_relative_path("../escape.jar"), None);
        assert_eq!(safe_relative_path("mods/../../escape.jar"), None);
        assert_eq!(safe_relative_path("/etc/passwd"), None);
        assert_eq!(safe_relative_path("C:\\Windows\\x.dll"), None);
        assert_eq!(safe_relative_path(""), None);
    }

    #[test]
    fn locate_finds_root_or_nested_manifest() {
        let temp = tempfile::tempdir().unwrap();
        assert!(PackManifest::locate(temp.path()).is_err());

        let nested = temp.path().join("pack-root");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(MANIFEST_FILE_NAME), "{}").unwrap();
        assert_eq!(
            PackManifest::locate(temp.path()).unwrap(),
            nested.join(MANIFEST_FILE_NAME)
        );
    }
}
