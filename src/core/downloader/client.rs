use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::config::DEFAULT_DOWNLOAD_CONCURRENCY;
use crate::core::error::{LauncherError, LauncherResult};

/// A single file to download with optional SHA-1 for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    /// Candidate URLs; the first non-empty one is used.
    pub urls: Vec<String>,
    pub dest: PathBuf,
    pub sha1: Option<String>,
}

impl DownloadEntry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            urls: vec![url.into()],
            dest: dest.into(),
            sha1: None,
        }
    }

    pub fn with_sha1(mut self, sha1: Option<String>) -> Self {
        self.sha1 = sha1;
        self
    }
}

/// Streaming, SHA-1 validated downloader.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    /// Maximum number of parallel downloads in a batch.
    concurrency: usize,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // ── Single file download ────────────────────────────

    /// Fetch the first present URL of `urls` into `dest`.
    ///
    /// There is no retry across candidates: a failure on the chosen URL is
    /// returned to the caller, who decides whether to skip or abort.
    pub async fn fetch(&self, urls: &[String], dest: &Path) -> LauncherResult<u64> {
        let url = first_url(urls)
            .ok_or_else(|| LauncherError::Fetch(format!("no download URL for {:?}", dest)))?;
        self.download_file(url, dest, None).await
    }

    /// Fetch one entry, validating its SHA-1 when known.
    pub async fn fetch_entry(&self, entry: &DownloadEntry) -> LauncherResult<u64> {
        let url = first_url(&entry.urls).ok_or_else(|| {
            LauncherError::Fetch(format!("no download URL for {:?}", entry.dest))
        })?;
        self.download_file(url, &entry.dest, entry.sha1.as_deref())
            .await
    }

    /// Stream `url` to `dest`, optionally validating SHA-1, and return the
    /// number of bytes written.
    ///
    /// The body is never buffered whole. The destination is truncated on
    /// open and removed again if the transfer fails, so a failed fetch leaves
    /// the file missing rather than corrupt.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let result = self.stream_to_file(url, dest, sha1_expected).await;
        if result.is_err() && dest.exists() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!("Could not remove partial download {:?}: {}", dest, e);
            }
        }
        result
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<u64> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut hasher = sha1_expected.map(|_| Sha1::new());
        let mut written: u64 = 0;

        // Scoped so the handle is closed before any cleanup runs.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;
            let mut body = response.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&chunk);
                }
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(dest, e))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        if let (Some(expected), Some(hasher)) = (sha1_expected, hasher) {
            let actual = hex::encode(hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", url, dest, written);
        Ok(written)
    }

    /// GET `url` and decode the JSON body, mapping non-2xx to a fetch error.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> LauncherResult<T> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// GET `url` and return the raw body text.
    pub async fn get_text(&self, url: &str) -> LauncherResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Returns the list of files that failed (if any).
    pub async fn download_batch(
        &self,
        entries: Vec<DownloadEntry>,
    ) -> Vec<(DownloadEntry, LauncherError)> {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| async move {
                let result = self.fetch_entry(&entry).await.map(|_| ());
                (entry, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(entry, result)| match result {
                Ok(()) => None,
                Err(e) => Some((entry, e)),
            })
            .collect()
    }
}

fn first_url(urls: &[String]) -> Option<&str> {
    urls.iter()
        .map(|u| u.trim())
        .find(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn downloader() -> Downloader {
        Downloader::new(Client::new())
    }

    #[test]
    fn first_url_skips_blank_candidates() {
        let urls = vec!["  ".to_string(), "https://cdn.example/a.jar".to_string()];
        assert_eq!(first_url(&urls), Some("https://cdn.example/a.jar"));
        assert_eq!(first_url(&[]), None);
    }

    #[tokio::test]
    async fn fetch_streams_body_and_creates_parents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mods/a.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("mods").join("nested").join("a.jar");
        let written = downloader()
            .fetch(&[format!("{}/mods/a.jar", server.uri())], &dest)
            .await
            .unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"jar-bytes");
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error_and_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("missing.jar");
        let err = downloader()
            .fetch(&[format!("{}/missing.jar", server.uri())], &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn sha1_mismatch_removes_the_written_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("file.bin");
        let err = downloader()
            .download_file(
                &format!("{}/file.bin", server.uri()),
                &dest,
                Some("0000000000000000000000000000000000000000"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::Sha1Mismatch { .. }));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn empty_url_list_fails_without_network() {
        let temp = tempfile::tempdir().unwrap();
        let err = downloader()
            .fetch(&[], &temp.path().join("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Fetch(_)));
    }

    #[tokio::test]
    async fn batch_reports_only_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let entries = vec![
            DownloadEntry::new(format!("{}/ok", server.uri()), temp.path().join("ok")),
            DownloadEntry::new(format!("{}/gone", server.uri()), temp.path().join("gone")),
        ];
        let failures = downloader().with_concurrency(2).download_batch(entries).await;

        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.dest.ends_with("gone"));
        assert!(temp.path().join("ok").exists());
    }
}
