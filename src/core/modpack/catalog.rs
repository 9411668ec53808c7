use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const PACK_EXTENSION: &str = ".mrpack";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionFile {
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub size: u64,
}

/// A published version of a catalog project.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionRecord {
    pub id: String,
    pub project_id: String,
    pub version_number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub game_versions: Vec<String>,
    #[serde(default)]
    pub loaders: Vec<String>,
    #[serde(default)]
    pub files: Vec<VersionFile>,
}

impl VersionRecord {
    /// Pick the pack archive: a `.mrpack` file first, then the primary
    /// file, then whatever comes first.
    pub fn pack_file(&self) -> LauncherResult<&VersionFile> {
        self.files
            .iter()
            .find(|f| f.filename.to_ascii_lowercase().ends_with(PACK_EXTENSION))
            .or_else(|| self.files.iter().find(|f| f.primary))
            .or_else(|| self.files.first())
            .ok_or_else(|| {
                LauncherError::Manifest(format!("version {} lists no files", self.id))
            })
    }
}

/// Thin client over the Modrinth v2 API.
#[derive(Debug, Clone)]
pub struct ModrinthClient {
    client: Client,
    base_url: String,
}

impl ModrinthClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_project_versions(&self, id_or_slug: &str) -> LauncherResult<Vec<VersionRecord>> {
        self.get(&format!("/project/{}/version", id_or_slug)).await
    }

    pub async fn get_version(&self, version_id: &str) -> LauncherResult<VersionRecord> {
        self.get(&format!("/version/{}", version_id)).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> LauncherResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Catalog GET {}", url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
