use tracing::info;

use super::context::InstallContext;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionJson;

/// Installs a loader from a Fabric-style meta server, whose
/// `/versions/loader/<mc>/<loader>/profile/json` endpoint returns a ready
/// version JSON inheriting from the base game.
pub(crate) async fn install_meta_profile(
    ecosystem: &str,
    meta_base: &str,
    maven_base: &str,
    minecraft_version: &str,
    loader_version: &str,
    ctx: &InstallContext<'_>,
) -> LauncherResult<String> {
    info!(
        "Installing {} {} for Minecraft {}",
        ecosystem, loader_version, minecraft_version
    );

    let url = format!(
        "{}/versions/loader/{}/{}/profile/json",
        meta_base.trim_end_matches('/'),
        minecraft_version,
        loader_version
    );
    let raw_profile = ctx
        .downloader
        .get_text(&url)
        .await
        .map_err(|e| LauncherError::LoaderApi(format!("{} meta: {}", ecosystem, e)))?;
    let profile = VersionJson::parse(&raw_profile)?;

    if profile.main_class.as_deref().unwrap_or_default().is_empty() {
        return Err(LauncherError::LoaderApi(format!(
            "{} profile missing mainClass",
            ecosystem
        )));
    }
    let id = if profile.id.is_empty() {
        format!("{}-loader-{}-{}", ecosystem, loader_version, minecraft_version)
    } else {
        profile.id.clone()
    };

    ctx.fetch_libraries(&profile.libraries, maven_base).await?;
    VersionJson::save_raw(ctx.versions_dir, &id, &raw_profile).await?;

    info!("{} installed as {}", ecosystem, id);
    Ok(id)
}

#[derive(Debug, Default)]
pub struct FabricInstaller;

impl FabricInstaller {
    pub async fn install(
        &self,
        minecraft_version: &str,
        loader_version: &str,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<String> {
        install_meta_profile(
            "fabric",
            &ctx.endpoints.fabric_meta,
            &ctx.endpoints.fabric_maven,
            minecraft_version,
            loader_version,
            ctx,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Endpoints;
    use crate::core::downloader::Downloader;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn installs_profile_and_libraries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/meta/versions/loader/1.20.1/0.15.0/profile/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "fabric-loader-0.15.0-1.20.1",
                "inheritsFrom": "1.20.1",
                "mainClass": "net.fabricmc.loader.impl.launch.knot.KnotClient",
                "libraries": [{"name": "net.fabricmc:fabric-loader:0.15.0", "url": format!("{}/maven/", server.uri())}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/maven/net/fabricmc/fabric-loader/0.15.0/fabric-loader-0.15.0.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let game_dir = temp.path().join("minecraft");
        let versions_dir = game_dir.join("versions");
        let libraries_dir = game_dir.join("libraries");
        let assets_dir = game_dir.join("assets");
        let endpoints = Endpoints {
            fabric_meta: format!("{}/meta", server.uri()),
            ..Endpoints::default()
        };
        let downloader = Downloader::new(reqwest::Client::new());
        let ctx = InstallContext {
            game_dir: &game_dir,
            versions_dir: &versions_dir,
            libraries_dir: &libraries_dir,
            assets_dir: &assets_dir,
            temp_dir: temp.path(),
            downloader: &downloader,
            endpoints: &endpoints,
            java: None,
        };

        let id = FabricInstaller.install("1.20.1", "0.15.0", &ctx).await.unwrap();

        assert_eq!(id, "fabric-loader-0.15.0-1.20.1");
        assert!(VersionJson::json_path(&versions_dir, &id).is_file());
        assert!(libraries_dir
            .join("net/fabricmc/fabric-loader/0.15.0/fabric-loader-0.15.0.jar")
            .is_file());
    }
}
