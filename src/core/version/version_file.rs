// ─── Version File ───
// Parses a Mojang-format version JSON, evaluates OS rules and resolves the
// `inheritsFrom` chain that loader versions use.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;

/// Guard against runaway or cyclic `inheritsFrom` chains.
const MAX_INHERITANCE_DEPTH: usize = 8;

/// A parsed version JSON, vanilla or loader profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub inherits_from: Option<String>,
    /// Version whose client jar this version runs on.
    #[serde(default)]
    pub jar: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default)]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub assets: Option<String>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<serde_json::Value>,
    #[serde(default)]
    pub jvm: Vec<serde_json::Value>,
}

// ─── Library Entry with Rules ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
    #[serde(default)]
    pub natives: Option<HashMap<String, String>>,
    /// Maven repository base used by Fabric/Quilt style entries.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default)]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub url: String,
}

/// A library file to fetch into the shared libraries directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDownload {
    pub url: String,
    pub path: PathBuf,
    pub sha1: Option<String>,
}

// ─── OS Rule Evaluation ───

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

impl OsRule {
    fn matches_current(&self) -> bool {
        let name_ok = self
            .name
            .as_deref()
            .map(|n| n == current_os_name())
            .unwrap_or(true);
        let arch_ok = self
            .arch
            .as_deref()
            .map(|a| (a == "x86" && cfg!(target_pointer_width = "32")) || a == std::env::consts::ARCH)
            .unwrap_or(true);
        name_ok && arch_ok
    }
}

impl LibraryEntry {
    /// Evaluate whether this library applies to the current OS.
    ///
    /// No rules means allowed. Otherwise start disallowed and let every
    /// matching rule (top to bottom) set the state.
    pub fn is_allowed(&self) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let mut allowed = false;
        for rule in rules {
            let os_matches = rule.os.as_ref().map(OsRule::matches_current).unwrap_or(true);
            if os_matches {
                allowed = rule.action == RuleAction::Allow;
            }
        }
        allowed
    }

    pub fn maven(&self) -> Option<MavenArtifact> {
        MavenArtifact::parse(&self.name).ok()
    }

    /// Classpath path relative to the libraries directory. `None` for
    /// entries that only carry native classifiers.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        match &self.downloads {
            Some(downloads) => {
                let artifact = downloads.artifact.as_ref()?;
                match &artifact.path {
                    Some(path) => Some(PathBuf::from(path)),
                    None => self.maven().map(|m| m.local_path()),
                }
            }
            None => self.maven().map(|m| m.local_path()),
        }
    }

    /// Where to fetch the main artifact from, if it is downloadable at all.
    /// Entries with an empty URL are produced locally by an installer.
    pub fn artifact_download(&self, default_repo: &str) -> Option<LibraryDownload> {
        let path = self.artifact_path()?;
        match self.downloads.as_ref().and_then(|d| d.artifact.as_ref()) {
            Some(artifact) if !artifact.url.trim().is_empty() => Some(LibraryDownload {
                url: artifact.url.clone(),
                path,
                sha1: artifact.sha1.clone(),
            }),
            Some(_) => None,
            None => {
                let repo = self.url.as_deref().unwrap_or(default_repo);
                Some(LibraryDownload {
                    url: self.maven()?.url(repo),
                    path,
                    sha1: None,
                })
            }
        }
    }

    /// Native classifier for the current OS (legacy LWJGL 2 style).
    pub fn native_classifier(&self) -> Option<String> {
        let natives = self.natives.as_ref()?;
        let arch = if cfg!(target_pointer_width = "64") {
            "64"
        } else {
            "32"
        };
        natives
            .get(current_os_name())
            .map(|s| s.replace("${arch}", arch))
    }

    pub fn native_download(&self) -> Option<LibraryDownload> {
        let classifier = self.native_classifier()?;
        let artifact = self
            .downloads
            .as_ref()?
            .classifiers
            .as_ref()?
            .get(&classifier)?;
        let path = artifact.path.clone().map(PathBuf::from).or_else(|| {
            let mut maven = self.maven()?;
            maven.classifier = Some(classifier.clone());
            Some(maven.local_path())
        })?;
        Some(LibraryDownload {
            url: artifact.url.clone(),
            path,
            sha1: artifact.sha1.clone(),
        })
    }
}

/// Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

impl VersionJson {
    pub fn json_path(versions_dir: &Path, id: &str) -> PathBuf {
        versions_dir.join(id).join(format!("{}.json", id))
    }

    pub fn jar_path(versions_dir: &Path, id: &str) -> PathBuf {
        versions_dir.join(id).join(format!("{}.jar", id))
    }

    pub fn parse(raw: &str) -> LauncherResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| LauncherError::Manifest(format!("invalid version JSON: {}", e)))
    }

    /// Read `versions/<id>/<id>.json`.
    pub fn read(versions_dir: &Path, id: &str) -> LauncherResult<Self> {
        let path = Self::json_path(versions_dir, id);
        let raw = std::fs::read_to_string(&path).map_err(|e| LauncherError::io(&path, e))?;
        let mut version = Self::parse(&raw)?;
        if version.id.is_empty() {
            version.id = id.to_string();
        }
        Ok(version)
    }

    /// Write the raw JSON as `versions/<id>/<id>.json`.
    pub async fn save_raw(versions_dir: &Path, id: &str, raw_json: &str) -> LauncherResult<PathBuf> {
        let path = Self::json_path(versions_dir, id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(&path, raw_json)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        Ok(path)
    }
}

/// A version with its whole `inheritsFrom` chain folded in.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    pub id: String,
    /// Version id whose `<id>.jar` is the client jar.
    pub jar_id: String,
    pub main_class: String,
    /// Child libraries first; a child entry replaces a parent entry with
    /// the same `group:artifact[:classifier]`.
    pub libraries: Vec<LibraryEntry>,
    pub game_arguments: Vec<serde_json::Value>,
    pub jvm_arguments: Vec<serde_json::Value>,
    pub legacy_arguments: Option<String>,
    pub asset_index: Option<AssetIndexInfo>,
    pub assets: Option<String>,
    pub java_major: Option<u32>,
}

impl ResolvedVersion {
    pub fn load(versions_dir: &Path, id: &str) -> LauncherResult<Self> {
        let mut chain: Vec<VersionJson> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(id.to_string());

        while let Some(current) = next {
            if !seen.insert(current.clone()) || chain.len() >= MAX_INHERITANCE_DEPTH {
                return Err(LauncherError::Manifest(format!(
                    "inheritance chain of {} loops or is too deep",
                    id
                )));
            }
            let version = VersionJson::read(versions_dir, &current)?;
            next = version.inherits_from.clone();
            chain.push(version);
        }
        debug!(
            "Resolved {} through {:?}",
            id,
            chain.iter().map(|v| v.id.as_str()).collect::<Vec<_>>()
        );
        Self::from_chain(chain)
    }

    /// Fold a child-first chain into one version.
    pub fn from_chain(chain: Vec<VersionJson>) -> LauncherResult<Self> {
        let (Some(child), Some(root)) = (chain.first(), chain.last()) else {
            return Err(LauncherError::Manifest("empty version chain".into()));
        };

        let main_class = chain
            .iter()
            .find_map(|v| v.main_class.clone())
            .ok_or_else(|| LauncherError::Manifest(format!("{} has no mainClass", child.id)))?;
        let jar_id = chain
            .iter()
            .find_map(|v| v.jar.clone())
            .unwrap_or_else(|| root.id.clone());

        let mut seen_keys = HashSet::new();
        let mut libraries = Vec::new();
        for version in &chain {
            for lib in &version.libraries {
                let key = lib
                    .maven()
                    .map(|m| m.key())
                    .unwrap_or_else(|| lib.name.clone());
                if lib.natives.is_some() || seen_keys.insert(key) {
                    libraries.push(lib.clone());
                }
            }
        }

        let mut game_arguments = Vec::new();
        let mut jvm_arguments = Vec::new();
        for version in chain.iter().rev() {
            if let Some(args) = &version.arguments {
                game_arguments.extend(args.game.iter().cloned());
                jvm_arguments.extend(args.jvm.iter().cloned());
            }
        }

        Ok(Self {
            id: child.id.clone(),
            jar_id,
            main_class,
            libraries,
            game_arguments,
            jvm_arguments,
            legacy_arguments: chain.iter().find_map(|v| v.minecraft_arguments.clone()),
            asset_index: chain.iter().find_map(|v| v.asset_index.clone()),
            assets: chain.iter().find_map(|v| v.assets.clone()),
            java_major: chain
                .iter()
                .find_map(|v| v.java_version.as_ref().map(|j| j.major_version)),
        })
    }

    pub fn asset_index_id(&self) -> String {
        self.asset_index
            .as_ref()
            .map(|a| a.id.clone())
            .or_else(|| self.assets.clone())
            .unwrap_or_else(|| "legacy".to_string())
    }

    /// Game arguments after rule evaluation; legacy versions split
    /// `minecraftArguments`.
    pub fn game_args(&self) -> Vec<String> {
        if self.game_arguments.is_empty() {
            return self
                .legacy_arguments
                .as_deref()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
        }
        self.game_arguments
            .iter()
            .flat_map(extract_argument_values)
            .collect()
    }

    pub fn jvm_args(&self) -> Vec<String> {
        self.jvm_arguments
            .iter()
            .flat_map(extract_argument_values)
            .collect()
    }
}

fn extract_argument_values(value: &serde_json::Value) -> Vec<String> {
    if let Some(arg) = value.as_str() {
        return vec![arg.to_string()];
    }

    let Some(obj) = value.as_object() else {
        return vec![];
    };

    if let Some(rules) = obj.get("rules").and_then(|r| r.as_array()) {
        if !argument_rules_allow(rules) {
            return vec![];
        }
    }

    match obj.get("value") {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

/// Like library rules, but a rule gated on launcher `features` (demo mode,
/// quick play, custom resolution) never matches.
fn argument_rules_allow(rules: &[serde_json::Value]) -> bool {
    let mut allowed = false;

    for rule in rules {
        if rule.get("features").is_some() {
            continue;
        }
        let action = rule
            .get("action")
            .and_then(|v| v.as_str())
            .unwrap_or("disallow");

        let os_matches = match rule.get("os") {
            None => true,
            Some(os) => serde_json::from_value::<OsRule>(os.clone())
                .map(|os| os.matches_current())
                .unwrap_or(false),
        };

        if os_matches {
            allowed = action == "allow";
        }
    }

    allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lib(value: serde_json::Value) -> LibraryEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_rules_means_allowed() {
        assert!(lib(json!({"name": "test:lib:1.0"})).is_allowed());
    }

    #[test]
    fn allow_only_current_os() {
        let entry = lib(json!({
            "name": "test:lib:1.0",
            "rules": [{"action": "allow", "os": {"name": current_os_name()}}]
        }));
        assert!(entry.is_allowed());
    }

    #[test]
    fn disallow_current_os() {
        let entry = lib(json!({
            "name": "test:lib:1.0",
            "rules": [
                {"action": "allow"},
                {"action": "disallow", "os": {"name": current_os_name()}}
            ]
        }));
        assert!(!entry.is_allowed());
    }

    #[test]
    fn library_download_sources() {
        let mojang = lib(json!({
            "name": "org.ow2.asm:asm:9.5",
            "downloads": {"artifact": {
                "path": "org/ow2/asm/asm/9.5/asm-9.5.jar",
                "sha1": "dc6ea1875f4d64fbc85e1691c95b96a3d8569c90",
                "url": "https://libraries.minecraft.net/org/ow2/asm/asm/9.5/asm-9.5.jar"
            }}
        }));
        let dl = mojang.artifact_download("https://unused").unwrap();
        assert_eq!(dl.path, PathBuf::from("org/ow2/asm/asm/9.5/asm-9.5.jar"));
        assert!(dl.sha1.is_some());

        let fabric = lib(json!({
            "name": "net.fabricmc:intermediary:1.20.1",
            "url": "https://maven.fabricmc.net/"
        }));
        assert_eq!(
            fabric.artifact_download("https://libraries.minecraft.net").unwrap().url,
            "https://maven.fabricmc.net/net/fabricmc/intermediary/1.20.1/intermediary-1.20.1.jar"
        );

        let generated = lib(json!({
            "name": "net.minecraftforge:forge:1.20.1-47.2.0:client",
            "downloads": {"artifact": {"path": "net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-client.jar", "url": ""}}
        }));
        assert!(generated.artifact_download("https://x").is_none());
        assert!(generated.artifact_path().is_some());

        let natives_only = lib(json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4",
            "downloads": {"classifiers": {}},
            "natives": {"linux": "natives-linux"}
        }));
        assert!(natives_only.artifact_path().is_none());
    }

    #[test]
    fn argument_rules_skip_features_and_other_os() {
        let args = vec![
            json!("--username"),
            json!("${auth_player_name}"),
            json!({"rules": [{"action": "allow", "features": {"is_demo_user": true}}], "value": "--demo"}),
            json!({"rules": [{"action": "allow", "os": {"name": current_os_name()}}], "value": ["--os-flag"]}),
            json!({"rules": [{"action": "allow", "os": {"name": "not-an-os"}}], "value": "--nope"}),
        ];
        let values: Vec<String> = args.iter().flat_map(extract_argument_values).collect();
        assert_eq!(values, vec!["--username", "${auth_player_name}", "--os-flag"]);
    }

    fn write_version(dir: &Path, id: &str, value: serde_json::Value) {
        let path = VersionJson::json_path(dir, id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, value.to_string()).unwrap();
    }

    #[test]
    fn resolves_inheritance_chain() {
        let temp = tempfile::tempdir().unwrap();
        write_version(temp.path(), "1.20.1", json!({
            "id": "1.20.1",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "5", "url": "https://x/5.json"},
            "javaVersion": {"majorVersion": 17},
            "libraries": [
                {"name": "org.ow2.asm:asm:9.3"},
                {"name": "com.mojang:brigadier:1.1.8"}
            ],
            "arguments": {"game": ["--version", "${version_name}"], "jvm": ["-cp", "${classpath}"]}
        }));
        write_version(temp.path(), "fabric-loader-0.15.0-1.20.1", json!({
            "id": "fabric-loader-0.15.0-1.20.1",
            "inheritsFrom": "1.20.1",
            "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
            "libraries": [{"name": "org.ow2.asm:asm:9.6", "url": "https://maven.fabricmc.net/"}],
            "arguments": {"game": [], "jvm": ["-DFabricMcEmu=net.minecraft.client.main.Main"]}
        }));

        let resolved = ResolvedVersion::load(temp.path(), "fabric-loader-0.15.0-1.20.1").unwrap();
        assert_eq!(resolved.jar_id, "1.20.1");
        assert_eq!(resolved.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
        assert_eq!(resolved.java_major, Some(17));
        assert_eq!(resolved.asset_index_id(), "5");
        let names: Vec<_> = resolved.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["org.ow2.asm:asm:9.6", "com.mojang:brigadier:1.1.8"]);
        assert_eq!(
            resolved.jvm_args(),
            vec!["-cp", "${classpath}", "-DFabricMcEmu=net.minecraft.client.main.Main"]
        );
    }

    #[test]
    fn inheritance_cycle_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        write_version(temp.path(), "a", json!({"id": "a", "inheritsFrom": "b", "mainClass": "M"}));
        write_version(temp.path(), "b", json!({"id": "b", "inheritsFrom": "a"}));
        let err = ResolvedVersion::load(temp.path(), "a").unwrap_err();
        assert!(matches!(err, LauncherError::Manifest(_)));
    }

    #[test]
    fn legacy_arguments_are_split() {
        let version = VersionJson::parse(
            r#"{"id": "1.12.2", "mainClass": "net.minecraft.launchwrapper.Launch",
                "minecraftArguments": "--username ${auth_player_name} --tweakClass x"}"#,
        )
        .unwrap();
        let resolved = ResolvedVersion::from_chain(vec![version]).unwrap();
        assert_eq!(resolved.game_args().len(), 4);
        assert!(resolved.jvm_args().is_empty());
    }
}
