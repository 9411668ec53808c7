use std::path::Path;

use tracing::{info, warn};

use crate::core::config::Endpoints;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::LibraryEntry;

/// Everything an installer needs to write into the shared game store.
pub struct InstallContext<'a> {
    /// Shared `.minecraft`-style root holding `versions/`, `libraries/`, `assets/`.
    pub game_dir: &'a Path,
    pub versions_dir: &'a Path,
    pub libraries_dir: &'a Path,
    pub assets_dir: &'a Path,
    pub temp_dir: &'a Path,
    pub downloader: &'a Downloader,
    pub endpoints: &'a Endpoints,
    /// Runtime used to execute official installer jars.
    pub java: Option<&'a Path>,
}

impl InstallContext<'_> {
    /// Fetch every allowed library (and its legacy natives) not already in
    /// the libraries directory. Any failure fails the call.
    pub async fn fetch_libraries(
        &self,
        libraries: &[LibraryEntry],
        default_repo: &str,
    ) -> LauncherResult<()> {
        let mut entries = Vec::new();
        for lib in libraries.iter().filter(|l| l.is_allowed()) {
            let downloads = lib
                .artifact_download(default_repo)
                .into_iter()
                .chain(lib.native_download());
            for download in downloads {
                let dest = self.libraries_dir.join(&download.path);
                if dest.exists() {
                    continue;
                }
                entries.push(DownloadEntry::new(download.url, dest).with_sha1(download.sha1));
            }
        }

        info!("Fetching {} missing libraries", entries.len());
        let failures = self.downloader.download_batch(entries).await;
        if failures.is_empty() {
            return Ok(());
        }
        for (entry, err) in &failures {
            warn!("Library {:?} failed: {}", entry.dest, err);
        }
        Err(LauncherError::Fetch(format!(
            "{} library downloads failed",
            failures.len()
        )))
    }
}
