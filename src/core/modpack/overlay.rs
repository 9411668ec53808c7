use std::path::Path;

use tracing::info;

use super::manifest::OVERLAY_DIRS;
use crate::core::archive::copy_dir_recursive;
use crate::core::error::LauncherResult;

/// Copy `overrides/` then `client-overrides/` from an extracted pack onto the
/// instance root, overwriting existing files. Returns the number of files
/// copied; a pack without overlay directories copies nothing.
pub fn apply_overlays(pack_root: &Path, instance_root: &Path) -> LauncherResult<usize> {
    let mut copied = 0;
    for dir_name in OVERLAY_DIRS {
        let overlay = pack_root.join(dir_name);
        if !overlay.is_dir() {
            continue;
        }
        let count = copy_dir_recursive(&overlay, instance_root)?;
        info!("Applied {} ({} files)", dir_name, count);
        copied += count;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_overrides_win_over_overrides() {
        let temp = tempfile::tempdir().unwrap();
        let pack = temp.path().join("pack");
        let instance = temp.path().join("instance");

        std::fs::create_dir_all(pack.join("overrides/config")).unwrap();
        std::fs::create_dir_all(pack.join("client-overrides/config")).unwrap();
        std::fs::write(pack.join("overrides/config/a.toml"), "base").unwrap();
        std::fs::write(pack.join("overrides/options.txt"), "opts").unwrap();
        std::fs::write(pack.join("client-overrides/config/a.toml"), "client").unwrap();

        let copied = apply_overlays(&pack, &instance).unwrap();

        assert_eq!(copied, 3);
        assert_eq!(
            std::fs::read_to_string(instance.join("config/a.toml")).unwrap(),
            "client"
        );
        assert!(instance.join("options.txt").exists());
    }

    #[test]
    fn no_overlay_is_a_noop() {
        let temp = tempfile::tempdir().unwrap();
        assert_eq!(apply_overlays(temp.path(), &temp.path().join("i")).unwrap(), 0);
        assert!(!temp.path().join("i").exists());
    }
}
