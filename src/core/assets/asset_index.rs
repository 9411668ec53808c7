use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::version_file::AssetIndexInfo;

/// Asset index JSON (`assets/indexes/<id>.json`).
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

impl AssetIndex {
    /// Download entries for objects not yet present under `objects/`.
    pub fn missing_objects(&self, objects_dir: &Path, resources_url: &str) -> Vec<DownloadEntry> {
        let base = resources_url.trim_end_matches('/');
        self.objects
            .values()
            .filter(|obj| obj.hash.len() > 2)
            .filter_map(|obj| {
                let prefix = &obj.hash[..2];
                let dest = objects_dir.join(prefix).join(&obj.hash);
                if dest.exists() {
                    return None;
                }
                Some(
                    DownloadEntry::new(format!("{}/{}/{}", base, prefix, obj.hash), dest)
                        .with_sha1(Some(obj.hash.clone())),
                )
            })
            .collect()
    }
}

/// Downloads the sounds and textures referenced by a version's asset index.
pub struct AssetManager;

impl AssetManager {
    /// Save the asset index and fetch every missing object. Any failed
    /// object fails the call.
    pub async fn download_assets(
        info: &AssetIndexInfo,
        assets_dir: &Path,
        resources_url: &str,
        downloader: &Downloader,
    ) -> LauncherResult<()> {
        let index_path = assets_dir.join("indexes").join(format!("{}.json", info.id));
        if !index_path.exists() {
            downloader
                .download_file(&info.url, &index_path, info.sha1.as_deref())
                .await?;
        }

        let raw = tokio::fs::read_to_string(&index_path)
            .await
            .map_err(|e| LauncherError::io(&index_path, e))?;
        let index: AssetIndex = serde_json::from_str(&raw)
            .map_err(|e| LauncherError::Manifest(format!("invalid asset index {}: {}", info.id, e)))?;

        let entries = index.missing_objects(&assets_dir.join("objects"), resources_url);
        info!(
            "Downloading {} asset objects ({} already cached)",
            entries.len(),
            index.objects.len().saturating_sub(entries.len())
        );

        let failures = downloader.download_batch(entries).await;
        if !failures.is_empty() {
            for (entry, err) in failures.iter().take(5) {
                warn!("Asset {:?} failed: {}", entry.dest, err);
            }
            return Err(LauncherError::Fetch(format!(
                "{} asset downloads failed for index {}",
                failures.len(),
                info.id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_objects_skip_cached_files() {
        let temp = tempfile::tempdir().unwrap();
        let index: AssetIndex = serde_json::from_str(
            r#"{"objects": {
                "minecraft/sounds/a.ogg": {"hash": "aabbccdd", "size": 3},
                "minecraft/lang/b.json": {"hash": "11223344", "size": 4}
            }}"#,
        )
        .unwrap();

        let objects = temp.path().join("objects");
        std::fs::create_dir_all(objects.join("aa")).unwrap();
        std::fs::write(objects.join("aa").join("aabbccdd"), "abc").unwrap();

        let missing = index.missing_objects(&objects, "https://resources.example/");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].urls[0], "https://resources.example/11/11223344");
        assert_eq!(missing[0].sha1.as_deref(), Some("11223344"));
    }
}
