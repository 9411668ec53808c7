use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionJson;

const LAUNCHER_PROFILES: &str = "launcher_profiles.json";

/// Installs Forge by downloading and executing the official installer JAR.
#[derive(Debug, Default)]
pub struct ForgeInstaller;

impl ForgeInstaller {
    pub async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<String> {
        info!(
            "Installing Forge {} for MC {}",
            loader_version, minecraft_version
        );
        let forge_id = format!("{}-{}", minecraft_version, loader_version);
        let url = format!(
            "{}/net/minecraftforge/forge/{}/forge-{}-installer.jar",
            ctx.endpoints.forge_maven.trim_end_matches('/'),
            forge_id,
            forge_id
        );
        run_installer_jar("Forge", &[url], ctx).await
    }
}

/// `version.json` embedded in modern installers.
#[derive(Debug, Deserialize)]
struct EmbeddedVersion {
    id: String,
}

/// Legacy installers keep the version under `install_profile.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyInstallProfile {
    #[serde(default)]
    version_info: Option<EmbeddedVersion>,
    #[serde(default)]
    version: Option<String>,
}

/// Read the version id the installer will write, from the jar itself.
pub(crate) fn embedded_version_id(installer: &Path) -> LauncherResult<String> {
    let file = std::fs::File::open(installer).map_err(|e| LauncherError::io(installer, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    if let Ok(mut entry) = archive.by_name("version.json") {
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        let version: EmbeddedVersion = serde_json::from_str(&raw)?;
        return Ok(version.id);
    }

    let entry = archive
        .by_name("install_profile.json")
        .map_err(|e| LauncherError::Loader(format!("Installer has no version metadata: {}", e)))?;
    let profile: LegacyInstallProfile = serde_json::from_reader(entry)?;
    profile
        .version_info
        .map(|v| v.id)
        .or(profile.version)
        .ok_or_else(|| LauncherError::Loader("Installer profile names no version".into()))
}

/// Download the first reachable installer among `urls`, run it headless with
/// `--installClient` against the shared game directory, and return the id of
/// the version it installed.
pub(crate) async fn run_installer_jar(
    ecosystem: &str,
    urls: &[String],
    ctx: &InstallContext<'_>,
) -> LauncherResult<String> {
    let java = ctx.java.ok_or_else(|| {
        LauncherError::Loader(format!("{} installer needs a Java runtime", ecosystem))
    })?;

    tokio::fs::create_dir_all(ctx.temp_dir)
        .await
        .map_err(|e| LauncherError::io(ctx.temp_dir, e))?;
    let scratch = tempfile::Builder::new()
        .prefix("installer-")
        .tempdir_in(ctx.temp_dir)
        .map_err(|e| LauncherError::io(ctx.temp_dir, e))?;
    let installer_path = scratch.path().join("installer.jar");

    let mut last_error = None;
    for url in urls {
        match ctx.downloader.download_file(url, &installer_path, None).await {
            Ok(_) => {
                last_error = None;
                break;
            }
            Err(e) => {
                warn!("{} installer not available at {}: {}", ecosystem, url, e);
                last_error = Some(e);
            }
        }
    }
    if let Some(err) = last_error {
        return Err(LauncherError::LoaderApi(format!(
            "{} installer download failed: {}",
            ecosystem, err
        )));
    }

    let version_id = {
        let path = installer_path.clone();
        tokio::task::spawn_blocking(move || embedded_version_id(&path))
            .await
            .map_err(|e| LauncherError::Other(format!("installer inspection panicked: {}", e)))??
    };
    debug!("{} installer reports version {}", ecosystem, version_id);

    tokio::fs::create_dir_all(ctx.game_dir)
        .await
        .map_err(|e| LauncherError::io(ctx.game_dir, e))?;
    let profiles = ctx.game_dir.join(LAUNCHER_PROFILES);
    if !profiles.exists() {
        tokio::fs::write(&profiles, br#"{"profiles":{},"selectedProfile":null}"#)
            .await
            .map_err(|e| LauncherError::io(&profiles, e))?;
    }

    let output = tokio::process::Command::new(java)
        .arg("-jar")
        .arg(&installer_path)
        .arg("--installClient")
        .arg(ctx.game_dir)
        .current_dir(ctx.game_dir)
        .output()
        .await
        .map_err(|e| LauncherError::Loader(format!("Could not start {} installer: {}", ecosystem, e)))?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LauncherError::Loader(format!(
            "{} installer failed (code {:?})\nSTDOUT:\n{}\nSTDERR:\n{}",
            ecosystem,
            output.status.code(),
            tail(&stdout, 40),
            tail(&stderr, 40)
        )));
    }

    if !VersionJson::json_path(ctx.versions_dir, &version_id).is_file() {
        return Err(LauncherError::Loader(format!(
            "{} installer exited cleanly but {} is not installed",
            ecosystem, version_id
        )));
    }

    info!("{} installed as {}", ecosystem, version_id);
    Ok(version_id)
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
