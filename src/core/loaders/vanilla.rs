use async_trait::async_trait;
use tracing::{info, instrument};

use super::context::InstallContext;
use super::installer::GameInstaller;
use crate::core::assets::AssetManager;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{VersionJson, VersionManifest};

/// Generic installer backed by the official Mojang manifest: version JSON,
/// client jar, libraries (OS rules honored) and assets.
#[derive(Debug, Default)]
pub struct VanillaInstaller;

impl VanillaInstaller {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GameInstaller for VanillaInstaller {
    #[instrument(skip(self, ctx))]
    async fn install_version(&self, version_id: &str, ctx: &InstallContext<'_>) -> LauncherResult<()> {
        info!("Installing Minecraft {}", version_id);

        // 1. Manifest entry
        let manifest =
            VersionManifest::fetch(ctx.downloader, &ctx.endpoints.version_manifest_url).await?;
        let entry = manifest.find_version(version_id).ok_or_else(|| {
            LauncherError::Loader(format!(
                "Minecraft version {} not found in manifest",
                version_id
            ))
        })?;

        // 2. Version JSON
        let raw_json = ctx.downloader.get_text(&entry.url).await?;
        let version = VersionJson::parse(&raw_json)?;

        // 3. Client jar
        if let Some(client) = version.downloads.as_ref().and_then(|d| d.client.as_ref()) {
            let jar_path = VersionJson::jar_path(ctx.versions_dir, version_id);
            if !jar_path.exists() {
                ctx.downloader
                    .download_file(&client.url, &jar_path, Some(&client.sha1))
                    .await?;
                info!("Downloaded client jar ({} bytes)", client.size);
            }
        }

        // 4. Libraries
        ctx.fetch_libraries(&version.libraries, &ctx.endpoints.mojang_libraries)
            .await?;

        // 5. Assets
        if let Some(asset_index) = &version.asset_index {
            AssetManager::download_assets(
                asset_index,
                ctx.assets_dir,
                &ctx.endpoints.resources_url,
                ctx.downloader,
            )
            .await?;
        }

        // Written last: the JSON's presence marks the version as installed.
        VersionJson::save_raw(ctx.versions_dir, version_id, &raw_json).await?;
        info!("Minecraft {} installed", version_id);
        Ok(())
    }
}
