// ─── Modpack Install Pipeline ───
// fetching-metadata → downloading-archive → extracting → downloading-files
// → applying-overlay → writing-manifest → completed. Any error before the
// last step fails the job; nothing already written is rolled back.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::catalog::{ModrinthClient, VersionRecord};
use super::manifest::{PackFile, PackManifest};
use super::overlay::apply_overlays;
use crate::core::archive;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::{InstanceManager, InstanceRecord};
use crate::core::jobs::JobHandle;

/// Progress range reserved for per-file downloads.
const FILES_PROGRESS_START: u8 = 15;
const FILES_PROGRESS_END: u8 = 95;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Catalog version id of the pack to install. When empty, the newest
    /// published version of `project` is installed.
    #[serde(default)]
    pub version_id: String,
    #[serde(default)]
    pub project: Option<String>,
    /// Display name; defaults to the pack's own name.
    #[serde(default)]
    pub name: Option<String>,
}

impl InstallRequest {
    pub fn version(version_id: impl Into<String>) -> Self {
        Self {
            version_id: version_id.into(),
            ..Self::default()
        }
    }

    pub fn latest(project: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// What the request points at, for logs.
    pub fn target(&self) -> &str {
        if self.version_id.trim().is_empty() {
            self.project.as_deref().unwrap_or("")
        } else {
            &self.version_id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    FetchingMetadata,
    DownloadingArchive,
    Extracting,
    DownloadingFiles,
    ApplyingOverlay,
    WritingManifest,
}

impl InstallStage {
    fn progress(self) -> u8 {
        match self {
            InstallStage::FetchingMetadata => 0,
            InstallStage::DownloadingArchive => 5,
            InstallStage::Extracting => 10,
            InstallStage::DownloadingFiles => FILES_PROGRESS_START,
            InstallStage::ApplyingOverlay => FILES_PROGRESS_END,
            InstallStage::WritingManifest => 98,
        }
    }

    fn label(self) -> &'static str {
        match self {
            InstallStage::FetchingMetadata => "Fetching pack metadata",
            InstallStage::DownloadingArchive => "Downloading pack archive",
            InstallStage::Extracting => "Extracting pack",
            InstallStage::DownloadingFiles => "Downloading files",
            InstallStage::ApplyingOverlay => "Applying overrides",
            InstallStage::WritingManifest => "Writing instance manifest",
        }
    }
}

/// Outcome of the per-file download phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub downloaded: usize,
    pub failed: usize,
    /// Entries never attempted: server-only, unsafe path or no URL.
    pub skipped: usize,
}

/// Map `done` of `total` onto the reserved file-download range.
pub fn file_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return FILES_PROGRESS_END;
    }
    let span = (FILES_PROGRESS_END - FILES_PROGRESS_START) as usize;
    let done = done.min(total);
    FILES_PROGRESS_START + (span * done / total) as u8
}

pub struct ModpackInstaller {
    catalog: ModrinthClient,
    downloader: Downloader,
    instances: InstanceManager,
    temp_dir: PathBuf,
}

impl ModpackInstaller {
    pub fn new(
        catalog: ModrinthClient,
        downloader: Downloader,
        instances: InstanceManager,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            downloader,
            instances,
            temp_dir: temp_dir.into(),
        }
    }

    /// Job entry point: runs the pipeline and converts the outcome into the
    /// job's terminal state. Never returns an error to the caller.
    pub async fn run(&self, request: InstallRequest, job: JobHandle) {
        match self.install(&request, &job).await {
            Ok((record, summary)) => {
                job.complete(format!(
                    "Install complete: '{}' ({} files, {} failed, {} skipped)",
                    record.name, summary.downloaded, summary.failed, summary.skipped
                ))
                .await;
            }
            Err(e) => {
                warn!("Install of {} failed: {}", request.target(), e);
                job.fail(e.to_string()).await;
            }
        }
    }

    #[instrument(skip(self, job), fields(target = %request.target()))]
    pub async fn install(
        &self,
        request: &InstallRequest,
        job: &JobHandle,
    ) -> LauncherResult<(InstanceRecord, FileSummary)> {
        // 1. Metadata
        self.stage(job, InstallStage::FetchingMetadata).await;
        let version = self.resolve_version(request).await?;
        let pack_file = version.pack_file()?.clone();

        // Dropped at the end of this scope, success or failure.
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| LauncherError::io(&self.temp_dir, e))?;
        let scratch = tempfile::Builder::new()
            .prefix("mrpack-")
            .tempdir_in(&self.temp_dir)
            .map_err(|e| LauncherError::io(&self.temp_dir, e))?;

        // 2. Archive
        self.stage(job, InstallStage::DownloadingArchive).await;
        let archive_path = scratch.path().join("pack.mrpack");
        let size = self
            .downloader
            .fetch(std::slice::from_ref(&pack_file.url), &archive_path)
            .await?;
        info!("Downloaded pack archive {} ({} bytes)", pack_file.filename, size);

        // 3. Extract + manifest
        self.stage(job, InstallStage::Extracting).await;
        let extract_dir = scratch.path().join("extracted");
        extract_blocking(archive_path, extract_dir.clone()).await?;

        let manifest_path = PackManifest::locate(&extract_dir)?;
        let raw_manifest = tokio::fs::read(&manifest_path)
            .await
            .map_err(|e| LauncherError::io(&manifest_path, e))?;
        let manifest = PackManifest::from_slice(&raw_manifest)?;
        manifest.pins()?;

        let name = request
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                if manifest.name.trim().is_empty() {
                    version.name.clone()
                } else {
                    manifest.name.clone()
                }
            });
        let record = InstanceRecord::new(name, version.id.clone()).with_upstream(
            Some(version.project_id.clone()),
            Some(version.version_number.clone()),
        );
        let paths = self.instances.paths(&record.slug);
        tokio::fs::create_dir_all(paths.root())
            .await
            .map_err(|e| LauncherError::io(paths.root(), e))?;
        let manifest_copy = paths.pack_manifest_path();
        tokio::fs::write(&manifest_copy, &raw_manifest)
            .await
            .map_err(|e| LauncherError::io(&manifest_copy, e))?;

        // 4. Files
        self.stage(job, InstallStage::DownloadingFiles).await;
        let summary = self
            .download_files(&manifest.files, paths.root(), job)
            .await?;
        info!(
            "Pack files: {} downloaded, {} failed, {} skipped",
            summary.downloaded, summary.failed, summary.skipped
        );

        // 5. Overlay
        self.stage(job, InstallStage::ApplyingOverlay).await;
        let pack_root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| extract_dir.clone());
        let instance_root = paths.root().to_path_buf();
        tokio::task::spawn_blocking(move || apply_overlays(&pack_root, &instance_root))
            .await
            .map_err(|e| LauncherError::Other(format!("Task join error: {e}")))??;

        // 6. Record
        self.stage(job, InstallStage::WritingManifest).await;
        self.instances.save(&record).await?;

        Ok((record, summary))
    }

    async fn resolve_version(&self, request: &InstallRequest) -> LauncherResult<VersionRecord> {
        if !request.version_id.trim().is_empty() {
            return self.catalog.get_version(&request.version_id).await;
        }
        let project = request
            .project
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                LauncherError::Manifest("install request names neither a version nor a project".into())
            })?;

        // The catalog lists versions newest first.
        let newest = self
            .catalog
            .get_project_versions(project)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                LauncherError::Manifest(format!("project {} has no published versions", project))
            })?;
        info!("Newest version of {} is {}", project, newest.id);
        Ok(newest)
    }

    /// Download every client file with bounded concurrency. Fetch failures
    /// are logged, counted and skipped; a local I/O failure aborts the phase.
    pub async fn download_files(
        &self,
        files: &[PackFile],
        instance_root: &Path,
        job: &JobHandle,
    ) -> LauncherResult<FileSummary> {
        let mut summary = FileSummary::default();
        let mut entries = Vec::with_capacity(files.len());

        for file in files {
            if !file.is_client_file() {
                summary.skipped += 1;
                continue;
            }
            let Some(relative) = file.destination() else {
                warn!("Skipping pack entry {:?}: no URL or unsafe path", file.path);
                summary.skipped += 1;
                continue;
            };
            entries.push(DownloadEntry {
                urls: file.downloads.clone(),
                dest: instance_root.join(relative),
                sha1: file.hashes.sha1.clone(),
            });
        }

        let total = entries.len();
        let mut done = 0;
        let mut results = stream::iter(entries)
            .map(|entry| async move {
                let result = self.downloader.fetch_entry(&entry).await;
                (entry, result)
            })
            .buffer_unordered(self.downloader.concurrency());

        // Results are consumed one at a time, so the counter needs no lock.
        while let Some((entry, result)) = results.next().await {
            done += 1;
            match result {
                Ok(_) => summary.downloaded += 1,
                Err(e) if e.is_fetch_failure() => {
                    warn!("Failed to download {:?}: {}", entry.dest, e);
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
            job.running(
                file_progress(done, total),
                format!("Downloading files ({}/{})", done, total),
            )
            .await;
        }

        Ok(summary)
    }

    async fn stage(&self, job: &JobHandle, stage: InstallStage) {
        info!("{}", stage.label());
        job.running(stage.progress(), stage.label()).await;
    }
}

async fn extract_blocking(archive_path: PathBuf, dest: PathBuf) -> LauncherResult<()> {
    tokio::task::spawn_blocking(move || archive::extract_zip(&archive_path, &dest))
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {e}")))?
}
