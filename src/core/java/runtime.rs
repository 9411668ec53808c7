use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::core::archive::{self, ArchiveFormat};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

/// Image types tried in order when querying the distribution index.
const IMAGE_TYPES: [&str; 2] = ["jre", "jdk"];
/// How deep to look for `bin/java` inside an extracted archive.
const MAX_SEARCH_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeOs {
    Linux,
    Mac,
    Windows,
}

impl RuntimeOs {
    /// Normalize an OS name; unknown names fall back to Linux.
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "windows" | "win" | "win32" | "win64" => Self::Windows,
            "macos" | "mac" | "darwin" | "osx" => Self::Mac,
            _ => Self::Linux,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Mac => "mac",
            Self::Windows => "windows",
        }
    }

    pub fn archive_format(self) -> ArchiveFormat {
        match self {
            Self::Windows => ArchiveFormat::Zip,
            _ => ArchiveFormat::TarGz,
        }
    }

    fn java_exe(self) -> &'static str {
        match self {
            Self::Windows => "java.exe",
            _ => "java",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeArch {
    X64,
    Aarch64,
    Arm,
}

impl RuntimeArch {
    /// Normalize a CPU architecture name; unknown names fall back to x64.
    pub fn normalize(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "aarch64" | "arm64" => Self::Aarch64,
            "arm" | "armv7" | "armv7l" | "aarch32" => Self::Arm,
            _ => Self::X64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Aarch64 => "aarch64",
            Self::Arm => "arm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: RuntimeOs,
    pub arch: RuntimeArch,
}

impl Platform {
    pub fn host() -> Self {
        Self {
            os: RuntimeOs::normalize(std::env::consts::OS),
            arch: RuntimeArch::normalize(std::env::consts::ARCH),
        }
    }

    /// Executable path relative to a runtime root.
    pub fn java_relative_path(&self) -> PathBuf {
        Path::new("bin").join(self.os.java_exe())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AdoptiumRelease {
    binary: AdoptiumBinary,
    #[serde(default)]
    release_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AdoptiumBinary {
    package: AdoptiumPackage,
}

#[derive(Debug, Clone, Deserialize)]
struct AdoptiumPackage {
    #[serde(default)]
    checksum: Option<String>,
    link: String,
    #[serde(default)]
    name: String,
}

/// A downloadable runtime archive picked from the distribution index.
#[derive(Debug, Clone)]
struct RuntimePackage {
    release_name: String,
    url: String,
    sha256: Option<String>,
}

/// Map a base game version to the Java feature version it needs.
///
/// `>= 1.20.5` → 21, `1.18 ..< 1.20.5` → 17, `1.17.x` → 16, older → 8.
/// Weekly snapshots (`24w14a`) are mapped by their year.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.trim().to_ascii_lowercase();
    if let Some(week_pos) = lower.find('w') {
        let year_hint = &lower[..week_pos];
        if year_hint.len() == 2 {
            if let Ok(snapshot_year) = year_hint.parse::<u32>() {
                return if snapshot_year >= 24 {
                    21
                } else if snapshot_year >= 21 {
                    17
                } else {
                    8
                };
            }
        }
    }

    let version = parse_game_version(&lower);
    if version >= (1, 20, 5) {
        21
    } else if version >= (1, 18, 0) {
        17
    } else if version >= (1, 17, 0) {
        16
    } else {
        8
    }
}

/// Parse `major.minor[.patch]`, ignoring suffixes like `-pre1`.
fn parse_game_version(version: &str) -> (u32, u32, u32) {
    let core = version.split(['-', ' ', '+']).next().unwrap_or(version);
    let mut parts = core.split('.').map(|part| {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<u32>().unwrap_or(0)
    });
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Downloads and caches Temurin runtimes, one directory per feature version.
#[derive(Debug, Clone)]
pub struct RuntimeProvisioner {
    downloader: Downloader,
    api_base: String,
    temp_dir: PathBuf,
    platform: Platform,
}

impl RuntimeProvisioner {
    pub fn new(downloader: Downloader, api_base: impl Into<String>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloader,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            temp_dir: temp_dir.into(),
            platform: Platform::host(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn runtime_dir(cache_root: &Path, feature: u32) -> PathBuf {
        cache_root.join(format!("java-{}", feature))
    }

    /// The cached executable for `feature`, if present. Presence of the
    /// executable is the only check.
    pub fn cached_executable(&self, cache_root: &Path, feature: u32) -> Option<PathBuf> {
        let java = Self::runtime_dir(cache_root, feature).join(self.platform.java_relative_path());
        java.is_file().then_some(java)
    }

    /// Return the Java executable for `feature`, downloading it on a cache miss.
    #[instrument(skip(self, cache_root), fields(os = self.platform.os.as_str(), arch = self.platform.arch.as_str()))]
    pub async fn ensure(&self, feature: u32, cache_root: &Path) -> LauncherResult<PathBuf> {
        if let Some(java) = self.cached_executable(cache_root, feature) {
            debug!("Java {} cache hit at {:?}", feature, java);
            return Ok(java);
        }

        info!("Java {} not cached, provisioning", feature);
        let package = self.fetch_package(feature).await?;

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(|e| LauncherError::io(&self.temp_dir, e))?;
        let scratch = tempfile::Builder::new()
            .prefix("runtime-")
            .tempdir_in(&self.temp_dir)
            .map_err(|e| LauncherError::io(&self.temp_dir, e))?;

        let format = self.platform.os.archive_format();
        let archive_path = scratch.path().join(format!("runtime.{}", format.extension()));
        info!("Downloading {} from {}", package.release_name, package.url);
        self.downloader
            .fetch(std::slice::from_ref(&package.url), &archive_path)
            .await?;

        let extract_dir = scratch.path().join("extracted");
        let target = Self::runtime_dir(cache_root, feature);
        let relative = self.platform.java_relative_path();
        let install_target = target.clone();
        let expected_sha256 = package.sha256.clone();
        tokio::task::spawn_blocking(move || -> LauncherResult<()> {
            if let Some(expected) = expected_sha256.as_deref() {
                verify_sha256(&archive_path, expected)?;
            }
            archive::extract(format, &archive_path, &extract_dir)?;
            let home = find_runtime_home(&extract_dir, &relative).ok_or_else(|| {
                LauncherError::Provisioning(format!(
                    "archive did not contain {}",
                    relative.display()
                ))
            })?;
            move_contents(&home, &install_target)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Task join error: {e}")))??;

        let java = target.join(self.platform.java_relative_path());
        if !java.is_file() {
            return Err(LauncherError::Provisioning(format!(
                "Java {} executable missing after install: {:?}",
                feature, java
            )));
        }
        ensure_executable(&java)?;

        info!("Java {} ready at {:?}", feature, java);
        Ok(java)
    }

    async fn fetch_package(&self, feature: u32) -> LauncherResult<RuntimePackage> {
        let extension = format!(".{}", self.platform.os.archive_format().extension());

        for image_type in IMAGE_TYPES {
            let url = format!(
                "{}/assets/latest/{}/hotspot?architecture={}&image_type={}&os={}",
                self.api_base,
                feature,
                self.platform.arch.as_str(),
                image_type,
                self.platform.os.as_str()
            );
            let releases: Vec<AdoptiumRelease> = self.downloader.get_json(&url).await?;
            if releases.is_empty() {
                debug!("No {} build listed for Java {}", image_type, feature);
                continue;
            }

            let chosen = releases.iter().find(|r| {
                let name = if r.binary.package.name.is_empty() {
                    &r.binary.package.link
                } else {
                    &r.binary.package.name
                };
                name.to_ascii_lowercase().ends_with(&extension)
            });

            return match chosen {
                Some(release) if !release.binary.package.link.trim().is_empty() => {
                    Ok(RuntimePackage {
                        release_name: release.release_name.clone(),
                        url: release.binary.package.link.clone(),
                        sha256: release
                            .binary
                            .package
                            .checksum
                            .clone()
                            .filter(|c| !c.trim().is_empty()),
                    })
                }
                _ => Err(LauncherError::Provisioning(format!(
                    "no {} archive for Java {} ({} {})",
                    extension,
                    feature,
                    self.platform.os.as_str(),
                    self.platform.arch.as_str()
                ))),
            };
        }

        Err(LauncherError::Provisioning(format!(
            "no runtime build found for Java {} ({} {})",
            feature,
            self.platform.os.as_str(),
            self.platform.arch.as_str()
        )))
    }
}

fn verify_sha256(path: &Path, expected: &str) -> LauncherResult<()> {
    let mut file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| LauncherError::io(path, e))?;
    let actual = hex::encode(hasher.finalize());
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(LauncherError::Provisioning(format!(
            "SHA-256 mismatch for runtime archive: expected {}, got {}",
            expected, actual
        )))
    }
}

/// Breadth-first search for the shallowest directory holding `relative`
/// (`bin/java`). Archive root folder names vary between builds, and macOS
/// builds nest the home under `Contents/Home`.
fn find_runtime_home(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);
    while let Some((dir, depth)) = queue.pop_front() {
        if dir.join(relative).is_file() {
            return Some(dir);
        }
        if depth >= MAX_SEARCH_DEPTH {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut children: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        queue.extend(children.into_iter().map(|p| (p, depth + 1)));
    }
    None
}

/// Move every entry of `source` into `target`, replacing what is there.
fn move_contents(source: &Path, target: &Path) -> LauncherResult<()> {
    std::fs::create_dir_all(target).map_err(|e| LauncherError::io(target, e))?;

    for entry in std::fs::read_dir(source).map_err(|e| LauncherError::io(source, e))? {
        let entry = entry.map_err(|e| LauncherError::io(source, e))?;
        let from = entry.path();
        let to = target.join(entry.file_name());

        if to.is_dir() {
            std::fs::remove_dir_all(&to).map_err(|e| LauncherError::io(&to, e))?;
        } else if to.exists() {
            std::fs::remove_file(&to).map_err(|e| LauncherError::io(&to, e))?;
        }

        if let Err(e) = std::fs::rename(&from, &to) {
            // Cross-device moves cannot rename.
            warn!("rename {:?} -> {:?} failed ({}), copying instead", from, to, e);
            if from.is_dir() {
                archive::copy_dir_recursive(&from, &to)?;
            } else {
                std::fs::copy(&from, &to).map_err(|e| LauncherError::io(&to, e))?;
            }
        }
    }
    Ok(())
}

fn ensure_executable(java: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(java)
            .map_err(|e| LauncherError::io(java, e))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(java, perms).map_err(|e| LauncherError::io(java, e))?;
    }
    #[cfg(not(unix))]
    let _ = java;
    Ok(())
}
