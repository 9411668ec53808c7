// ─── Launch Command ───
// Turns an installed version into the argument vector of a game process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::classpath::{build_classpath, classpath_separator, extract_natives, safe_path_str};
use crate::core::auth::LaunchAccountProfile;
use crate::core::config::LauncherConfig;
use crate::core::error::LauncherResult;
use crate::core::version::ResolvedVersion;

const LAUNCHER_NAME: &str = "cottage";

/// Everything a builder gets for one launch.
#[derive(Debug, Clone)]
pub struct CommandRequest<'a> {
    pub profile: &'a LaunchAccountProfile,
    /// Java executable, first element of the built command.
    pub java: &'a Path,
    /// Instance root; the game runs with this as its working directory.
    pub game_dir: &'a Path,
    pub version_id: &'a str,
}

#[async_trait]
pub trait CommandBuilder: Send + Sync {
    async fn build(&self, request: &CommandRequest<'_>) -> LauncherResult<Vec<String>>;
}

/// Builds commands from the version JSON chain in the shared game store.
#[derive(Debug, Clone)]
pub struct VersionCommandBuilder {
    versions_dir: PathBuf,
    libraries_dir: PathBuf,
    assets_dir: PathBuf,
    max_memory_mb: u32,
}

impl VersionCommandBuilder {
    pub fn new(config: &LauncherConfig) -> Self {
        Self {
            versions_dir: config.versions_dir(),
            libraries_dir: config.libraries_dir(),
            assets_dir: config.assets_dir(),
            max_memory_mb: config.max_memory_mb,
        }
    }
}

#[async_trait]
impl CommandBuilder for VersionCommandBuilder {
    async fn build(&self, request: &CommandRequest<'_>) -> LauncherResult<Vec<String>> {
        let version = ResolvedVersion::load(&self.versions_dir, request.version_id)?;
        let classpath = build_classpath(&version, &self.libraries_dir, &self.versions_dir)?;
        let natives_dir = extract_natives(
            &version,
            &self.libraries_dir,
            &request.game_dir.join("natives"),
        )
        .await?;

        let placeholders = Placeholders::for_launch(
            request,
            &version,
            &classpath,
            &natives_dir,
            &self.libraries_dir,
            &self.assets_dir,
        );

        let mut command = vec![request.java.to_string_lossy().into_owned()];
        command.push(format!("-Xmx{}M", self.max_memory_mb));
        command.push("-Xms512M".into());

        let raw_jvm = {
            let args = version.jvm_args();
            if args.is_empty() {
                legacy_jvm_args()
            } else {
                args
            }
        };
        let mut jvm = placeholders.apply_all(&raw_jvm);
        if !jvm.iter().any(|a| a == "-cp" || a == "-classpath") {
            jvm.push("-cp".into());
            jvm.push(classpath.clone());
        }
        command.extend(jvm);

        command.push(version.main_class.clone());
        command.extend(placeholders.apply_all(&version.game_args()));

        debug!("Built launch command with {} arguments", command.len());
        Ok(command)
    }
}

fn legacy_jvm_args() -> Vec<String> {
    vec![
        "-Djava.library.path=${natives_directory}".into(),
        "-cp".into(),
        "${classpath}".into(),
    ]
}

/// `${name}` substitutions for launch arguments.
#[derive(Debug, Default)]
pub struct Placeholders {
    values: HashMap<&'static str, String>,
}

impl Placeholders {
    pub fn for_launch(
        request: &CommandRequest<'_>,
        version: &ResolvedVersion,
        classpath: &str,
        natives_dir: &Path,
        libraries_dir: &Path,
        assets_dir: &Path,
    ) -> Self {
        let profile = request.profile;
        let mut values = HashMap::new();
        values.insert("auth_player_name", profile.username.clone());
        values.insert("auth_uuid", profile.uuid.clone());
        values.insert("auth_access_token", profile.access_token.clone());
        values.insert("auth_session", profile.access_token.clone());
        values.insert("auth_xuid", profile.xuid.clone());
        values.insert("user_type", profile.user_type.clone());
        values.insert("user_properties", "{}".into());
        values.insert("version_name", version.id.clone());
        values.insert("version_type", "release".into());
        values.insert("game_directory", safe_path_str(request.game_dir));
        values.insert("assets_root", safe_path_str(assets_dir));
        values.insert("game_assets", safe_path_str(assets_dir));
        values.insert("assets_index_name", version.asset_index_id());
        values.insert("natives_directory", safe_path_str(natives_dir));
        values.insert("library_directory", safe_path_str(libraries_dir));
        values.insert("classpath", classpath.to_string());
        values.insert("classpath_separator", classpath_separator().to_string());
        values.insert("launcher_name", LAUNCHER_NAME.into());
        values.insert("launcher_version", env!("CARGO_PKG_VERSION").into());
        Self { values }
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        self.values.insert(key, value.into());
    }

    pub fn apply(&self, arg: &str) -> String {
        let mut resolved = arg.to_string();
        for (key, value) in &self.values {
            let token = format!("${{{}}}", key);
            if resolved.contains(&token) {
                resolved = resolved.replace(&token, value);
            }
        }
        resolved
    }

    /// Substitute every argument, dropping any that still holds an unknown
    /// placeholder together with the option it was the value of.
    pub fn apply_all(&self, args: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let resolved = self.apply(arg);
            if resolved.contains("${") {
                debug!("Dropping unresolved argument {}", arg);
                drop_dangling_option(&mut out);
                continue;
            }
            out.push(resolved);
        }
        out
    }
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::VersionJson;

    fn placeholders() -> Placeholders {
        let mut p = Placeholders::default();
        p.insert("auth_player_name", "Alex");
        p.insert("game_directory", "/inst/demo");
        p
    }

    #[test]
    fn unresolved_values_drop_their_option() {
        let args: Vec<String> = [
            "--username",
            "${auth_player_name}",
            "--quickPlayPath",
            "${quickPlayPath}",
            "--gameDir",
            "${game_directory}",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(
            placeholders().apply_all(&args),
            vec!["--username", "Alex", "--gameDir", "/inst/demo"]
        );
    }

    #[test]
    fn embedded_placeholders_are_substituted() {
        assert_eq!(
            placeholders().apply("-Dgame.dir=${game_directory}/x"),
            "-Dgame.dir=/inst/demo/x"
        );
    }

    #[tokio::test]
    async fn builds_command_for_legacy_version() {
        let temp = tempfile::tempdir().unwrap();
        let config = LauncherConfig::new(temp.path());
        let versions = config.versions_dir();
        let json = VersionJson::json_path(&versions, "1.12.2");
        std::fs::create_dir_all(json.parent().unwrap()).unwrap();
        std::fs::write(
            &json,
            r#"{
                "id": "1.12.2",
                "mainClass": "net.minecraft.client.main.Main",
                "minecraftArguments": "--username ${auth_player_name} --uuid ${auth_uuid} --accessToken ${auth_access_token} --gameDir ${game_directory} --assetIndex ${assets_index_name}",
                "assets": "1.12",
                "libraries": []
            }"#,
        )
        .unwrap();
        std::fs::write(VersionJson::jar_path(&versions, "1.12.2"), b"jar").unwrap();

        let instance = temp.path().join("instances").join("demo");
        std::fs::create_dir_all(&instance).unwrap();
        let profile = LaunchAccountProfile::offline("Alex");
        let request = CommandRequest {
            profile: &profile,
            java: Path::new("/opt/java/bin/java"),
            game_dir: &instance,
            version_id: "1.12.2",
        };

        let command = VersionCommandBuilder::new(&config).build(&request).await.unwrap();

        assert_eq!(command[0], "/opt/java/bin/java");
        assert_eq!(command[1], format!("-Xmx{}M", config.max_memory_mb));
        let cp_index = command.iter().position(|a| a == "-cp").unwrap();
        assert!(command[cp_index + 1].ends_with("1.12.2.jar"));
        assert_eq!(command[cp_index + 2], "net.minecraft.client.main.Main");
        let user = command.iter().position(|a| a == "--username").unwrap();
        assert_eq!(command[user + 1], "Alex");
        let token = command.iter().position(|a| a == "--accessToken").unwrap();
        assert_eq!(command[token + 1], "offline_access_token");
        assert!(command.ends_with(&["--assetIndex".to_string(), "1.12".to_string()]));
        assert!(instance.join("natives").is_dir());
    }
}
