use super::context::InstallContext;
use super::fabric::install_meta_profile;
use crate::core::error::LauncherResult;

/// Quilt serves Fabric-compatible profiles from its own meta server.
#[derive(Debug, Default)]
pub struct QuiltInstaller;

impl QuiltInstaller {
    pub async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<String> {
        install_meta_profile(
            "quilt",
            &ctx.endpoints.quilt_meta,
            &ctx.endpoints.quilt_maven,
            minecraft_version,
            loader_version,
            ctx,
        )
        .await
    }
}
