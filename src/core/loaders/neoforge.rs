use tracing::info;

use super::context::InstallContext;
use super::forge::run_installer_jar;
use crate::core::error::LauncherResult;

/// NeoForge installer. Versions for 1.20.2+ publish under the `neoforge`
/// artifact; the 1.20.1 line still uses the legacy `forge` coordinates on the
/// NeoForged maven.
#[derive(Debug, Default)]
pub struct NeoForgeInstaller;

impl NeoForgeInstaller {
    pub async fn install(
        &self,
        minecraft_version: Option<&str>,
        loader_version: &str,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<String> {
        info!(
            "Installing NeoForge {} for MC {}",
            loader_version,
            minecraft_version.unwrap_or("(from loader version)")
        );
        let urls = installer_urls(&ctx.endpoints.neoforge_maven, minecraft_version, loader_version);
        run_installer_jar("NeoForge", &urls, ctx).await
    }
}

/// Game version a NeoForge release targets: `20.4.237` is for 1.20.4 and
/// `21.0.167` for 1.21. The legacy 1.20.1 line (`47.x`) does not follow it.
pub fn minecraft_version_for(loader_version: &str) -> Option<String> {
    let mut parts = loader_version.split(['.', '-']);
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    if !(20..47).contains(&major) {
        return None;
    }
    Some(if minor == 0 {
        format!("1.{}", major)
    } else {
        format!("1.{}.{}", major, minor)
    })
}

fn installer_urls(maven: &str, minecraft_version: Option<&str>, loader_version: &str) -> Vec<String> {
    let maven = maven.trim_end_matches('/');
    let mut urls = vec![format!(
        "{}/net/neoforged/neoforge/{}/neoforge-{}-installer.jar",
        maven, loader_version, loader_version
    )];
    if let Some(minecraft_version) = minecraft_version {
        let legacy_id = format!("{}-{}", minecraft_version, loader_version);
        urls.push(format!(
            "{}/net/neoforged/forge/{}/forge-{}-installer.jar",
            maven, legacy_id, legacy_id
        ));
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tries_modern_then_legacy_coordinates() {
        let urls = installer_urls("https://maven.neoforged.net/releases/", Some("1.20.1"), "47.1.79");
        assert_eq!(
            urls[0],
            "https://maven.neoforged.net/releases/net/neoforged/neoforge/47.1.79/neoforge-47.1.79-installer.jar"
        );
        assert_eq!(
            urls[1],
            "https://maven.neoforged.net/releases/net/neoforged/forge/1.20.1-47.1.79/forge-1.20.1-47.1.79-installer.jar"
        );
    }

    #[test]
    fn without_base_only_modern_coordinates_are_tried() {
        let urls = installer_urls("https://maven.neoforged.net/releases", None, "20.4.237");
        assert_eq!(urls.len(), 1);
        assert!(urls[0].ends_with("/neoforge/20.4.237/neoforge-20.4.237-installer.jar"));
    }

    #[test]
    fn game_version_follows_loader_numbering() {
        assert_eq!(minecraft_version_for("20.4.237").as_deref(), Some("1.20.4"));
        assert_eq!(minecraft_version_for("21.0.167").as_deref(), Some("1.21"));
        assert_eq!(minecraft_version_for("21.1.77-beta").as_deref(), Some("1.21.1"));
        assert_eq!(minecraft_version_for("47.1.79"), None);
        assert_eq!(minecraft_version_for("latest"), None);
    }
}
