// ─── Archive Extraction ───
// Zip (modpacks, Windows runtimes) and gzip-tar (Unix runtimes) unpacking.
// Blocking; async callers wrap these in `spawn_blocking`.

use std::fs::File;
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}

pub fn extract(format: ArchiveFormat, archive: &Path, dest: &Path) -> LauncherResult<()> {
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest),
    }
}

/// Extract every entry of a zip archive below `dest`.
///
/// Entries whose names escape the destination are rejected by
/// `enclosed_name` and skipped.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> LauncherResult<()> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            debug!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                .map_err(|e| LauncherError::io(&out_path, e))?;
        }
    }

    debug!("Extracted {} zip entries into {:?}", archive.len(), dest);
    Ok(())
}

/// Extract a gzip-compressed tarball below `dest`, keeping file modes.
pub fn extract_tar_gz(archive_path: &Path, dest: &Path) -> LauncherResult<()> {
    let file = File::open(archive_path).map_err(|e| LauncherError::io(archive_path, e))?;
    std::fs::create_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive
        .unpack(dest)
        .map_err(|e| LauncherError::io(archive_path, e))?;

    debug!("Extracted tarball {:?} into {:?}", archive_path, dest);
    Ok(())
}

/// Copy `source` into `destination` recursively, overwriting existing files.
/// Returns the number of files copied.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> LauncherResult<usize> {
    std::fs::create_dir_all(destination).map_err(|e| LauncherError::io(destination, e))?;

    let mut copied = 0;
    for entry in std::fs::read_dir(source).map_err(|e| LauncherError::io(source, e))? {
        let entry = entry.map_err(|e| LauncherError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| LauncherError::io(&src_path, e))?;

        if file_type.is_dir() {
            copied += copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            std::fs::copy(&src_path, &dst_path).map_err(|e| LauncherError::io(&dst_path, e))?;
            copied += 1;
        }
    }

    Ok(copied)
}
