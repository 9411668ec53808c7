// ─── Classpath Builder ───
// Constructs the classpath string and natives directory for a resolved version.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{ResolvedVersion, VersionJson};

/// Uses `;` on Windows, `:` on Linux/macOS.
pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Builds the classpath for `version`:
/// - every allowed library present in the shared store, child-first
/// - the client jar last
///
/// Libraries missing on disk are skipped; a missing client jar is an error.
pub fn build_classpath(
    version: &ResolvedVersion,
    libraries_dir: &Path,
    versions_dir: &Path,
) -> LauncherResult<String> {
    let mut entries = Vec::new();

    for lib in version.libraries.iter().filter(|l| l.is_allowed()) {
        let Some(relative) = lib.artifact_path() else {
            continue;
        };
        let path = libraries_dir.join(relative);
        if path.is_file() {
            entries.push(safe_path_str(&path));
        } else {
            debug!("Library not found on disk (skipping): {}", lib.name);
        }
    }

    let client_jar = VersionJson::jar_path(versions_dir, &version.jar_id);
    if !client_jar.is_file() {
        return Err(LauncherError::Launch(format!(
            "client jar missing for {} at {:?}",
            version.jar_id, client_jar
        )));
    }
    entries.push(safe_path_str(&client_jar));

    dedup_preserving_order(&mut entries);
    Ok(entries.join(classpath_separator()))
}

fn dedup_preserving_order(entries: &mut Vec<String>) {
    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_lowercase()
        } else {
            entry.clone()
        };
        seen.insert(key)
    });
}

/// Extract `.dll`/`.so`/`.dylib` files from legacy natives jars into
/// `natives_dir`, replacing whatever the previous session left there.
pub async fn extract_natives(
    version: &ResolvedVersion,
    libraries_dir: &Path,
    natives_dir: &Path,
) -> LauncherResult<PathBuf> {
    if natives_dir.exists() {
        tokio::fs::remove_dir_all(natives_dir)
            .await
            .map_err(|e| LauncherError::io(natives_dir, e))?;
    }
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LauncherError::io(natives_dir, e))?;

    let jars: Vec<PathBuf> = version
        .libraries
        .iter()
        .filter(|l| l.is_allowed())
        .filter_map(|l| l.native_download())
        .map(|d| libraries_dir.join(d.path))
        .filter(|p| p.is_file())
        .collect();

    if jars.is_empty() {
        return Ok(natives_dir.to_path_buf());
    }

    let dest_dir = natives_dir.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || {
        let mut count = 0usize;
        for jar in &jars {
            match extract_native_jar(jar, &dest_dir) {
                Ok(n) => count += n,
                Err(e) => warn!("Cannot extract natives from {:?}: {}", jar, e),
            }
        }
        count
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))?;

    debug!("Extracted {} native libraries", extracted);
    Ok(natives_dir.to_path_buf())
}

fn extract_native_jar(jar: &Path, dest_dir: &Path) -> LauncherResult<usize> {
    let file = std::fs::File::open(jar).map_err(|e| LauncherError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if name.contains("META-INF") || name.contains('/') || name.contains('\\') {
            continue;
        }
        let is_native = name.ends_with(".dll")
            || name.ends_with(".so")
            || name.ends_with(".dylib")
            || name.ends_with(".jnilib");
        if !is_native {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        let dest = dest_dir.join(&name);
        std::fs::write(&dest, bytes).map_err(|e| LauncherError::io(&dest, e))?;
        count += 1;
    }
    Ok(count)
}

/// Convert path to string, stripping the `\\?\` prefix canonicalization adds
/// on Windows.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::LibraryEntry;
    use std::io::Write;

    fn library(name: &str) -> LibraryEntry {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }

    fn resolved(libraries: Vec<LibraryEntry>) -> ResolvedVersion {
        ResolvedVersion {
            id: "fabric-loader-0.15.0-1.20.1".into(),
            jar_id: "1.20.1".into(),
            main_class: "net.fabricmc.loader.impl.launch.knot.KnotClient".into(),
            libraries,
            game_arguments: vec![],
            jvm_arguments: vec![],
            legacy_arguments: None,
            asset_index: None,
            assets: None,
            java_major: None,
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"jar").unwrap();
    }

    #[test]
    fn classpath_lists_present_libraries_then_client_jar() {
        let temp = tempfile::tempdir().unwrap();
        let libs = temp.path().join("libraries");
        let versions = temp.path().join("versions");
        touch(&libs.join("org/ow2/asm/asm/9.6/asm-9.6.jar"));
        touch(&libs.join("net/fabricmc/fabric-loader/0.15.0/fabric-loader-0.15.0.jar"));
        touch(&VersionJson::jar_path(&versions, "1.20.1"));

        let version = resolved(vec![
            library("net.fabricmc:fabric-loader:0.15.0"),
            library("com.example:missing:1.0"),
            library("org.ow2.asm:asm:9.6"),
        ]);
        let cp = build_classpath(&version, &libs, &versions).unwrap();
        let entries: Vec<&str> = cp.split(classpath_separator()).collect();

        assert_eq!(entries.len(), 3);
        assert!(entries[0].ends_with("fabric-loader-0.15.0.jar"));
        assert!(entries[1].ends_with("asm-9.6.jar"));
        assert!(entries[2].ends_with("1.20.1.jar"));
    }

    #[test]
    fn missing_client_jar_is_a_launch_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = build_classpath(&resolved(vec![]), temp.path(), temp.path()).unwrap_err();
        assert!(matches!(err, LauncherError::Launch(_)));
    }

    #[test]
    fn native_jar_yields_only_top_level_libraries() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("natives.jar");
        {
            let file = std::fs::File::create(&jar).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            for name in ["liblwjgl.so", "META-INF/MANIFEST.MF", "org/lwjgl/Foo.class"] {
                zip.start_file(name, options).unwrap();
                zip.write_all(b"x").unwrap();
            }
            zip.finish().unwrap();
        }
        let out = temp.path().join("natives");
        std::fs::create_dir_all(&out).unwrap();

        assert_eq!(extract_native_jar(&jar, &out).unwrap(), 1);
        assert!(out.join("liblwjgl.so").is_file());
    }
}
