use async_trait::async_trait;

use super::context::InstallContext;
use super::fabric::FabricInstaller;
use super::forge::ForgeInstaller;
use super::neoforge::NeoForgeInstaller;
use super::quilt::QuiltInstaller;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::modpack::{LoaderKind, LoaderPin};

/// Generic installer: installs any version id listed in the Mojang manifest.
#[async_trait]
pub trait GameInstaller: Send + Sync {
    async fn install_version(&self, version_id: &str, ctx: &InstallContext<'_>)
        -> LauncherResult<()>;
}

/// Installs one loader on top of a base game version and reports the
/// version id it left installed, when it knows it. Ecosystems that encode
/// the game version in their own version may run without a base.
#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(
        &self,
        pin: &LoaderPin,
        minecraft_version: Option<&str>,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<Option<String>>;
}

/// Dispatches to the installer of the pinned ecosystem.
#[derive(Default)]
pub struct LoaderInstallers {
    fabric: FabricInstaller,
    quilt: QuiltInstaller,
    forge: ForgeInstaller,
    neoforge: NeoForgeInstaller,
}

impl LoaderInstallers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoaderInstaller for LoaderInstallers {
    async fn install(
        &self,
        pin: &LoaderPin,
        minecraft_version: Option<&str>,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<Option<String>> {
        let loader_version = pin.version.as_str();
        let base = || {
            minecraft_version.ok_or_else(|| {
                LauncherError::Loader(format!(
                    "{} {} needs a game version to install",
                    pin.kind, pin.version
                ))
            })
        };
        let id = match pin.kind {
            LoaderKind::Fabric => self.fabric.install(base()?, loader_version, ctx).await?,
            LoaderKind::Quilt => self.quilt.install(base()?, loader_version, ctx).await?,
            LoaderKind::Forge => self.forge.install(base()?, loader_version, ctx).await?,
            LoaderKind::NeoForge => {
                self.neoforge
                    .install(minecraft_version, loader_version, ctx)
                    .await?
            }
        };
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Endpoints;
    use crate::core::downloader::Downloader;

    #[tokio::test]
    async fn fabric_without_base_is_a_loader_error() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = Endpoints::default();
        let ctx = InstallContext {
            game_dir: root,
            versions_dir: root,
            libraries_dir: root,
            assets_dir: root,
            temp_dir: root,
            downloader: &downloader,
            endpoints: &endpoints,
            java: None,
        };
        let pin = LoaderPin {
            kind: LoaderKind::Fabric,
            version: "0.15.0".into(),
        };

        let err = LoaderInstallers::new().install(&pin, None, &ctx).await.unwrap_err();
        assert!(matches!(err, LauncherError::Loader(_)));
    }
}
