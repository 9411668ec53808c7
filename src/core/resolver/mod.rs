//! Maps a pack's dependency pins to one installed, launchable version id.
//!
//! Installation runs first (base game, then the pinned loader, then the
//! generic installer against the target id); afterwards the ordered
//! [`strategy::STRATEGIES`] pick an id from the local version store.

mod index;
mod strategy;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::loaders::{GameInstaller, InstallContext, LoaderInstaller};
use crate::core::modpack::DependencyPins;

pub use index::{InstalledVersion, LocalVersionIndex};
pub use strategy::{
    discover_loader_version, installed_target, naive_version_id, ResolutionInput, Strategy,
    STRATEGIES,
};

pub struct VersionResolver {
    game: Arc<dyn GameInstaller>,
    loaders: Arc<dyn LoaderInstaller>,
}

impl VersionResolver {
    pub fn new(game: Arc<dyn GameInstaller>, loaders: Arc<dyn LoaderInstaller>) -> Self {
        Self { game, loaders }
    }

    pub async fn resolve(
        &self,
        pins: &DependencyPins,
        ctx: &InstallContext<'_>,
    ) -> LauncherResult<String> {
        let index = LocalVersionIndex::scan(ctx.versions_dir)?;

        // 1. Base game
        if let Some(base) = pins.minecraft.as_deref() {
            if !index.is_installed(base) {
                if let Err(e) = self.game.install_version(base, ctx).await {
                    warn!("Base game {} install failed: {}", base, e);
                }
            }
        }

        // 2. Loader, whose reported id wins over the naive one
        let mut reported = None;
        if let Some(loader) = &pins.loader {
            match self.loaders.install(loader, pins.minecraft.as_deref(), ctx).await {
                Ok(id) => reported = id,
                Err(e) => warn!("{} {} install failed: {}", loader.kind, loader.version, e),
            }
        }

        // 3. Naive id
        let target = match reported.or_else(|| naive_version_id(pins)) {
            Some(id) => id,
            None => {
                return Err(LauncherError::Resolution(
                    "(pack declares no game version)".into(),
                ))
            }
        };
        debug!("Resolution target is {}", target);

        // 4. Generic install of the target itself
        let mut index = LocalVersionIndex::scan(ctx.versions_dir)?;
        if !index.is_installed(&target) {
            match self.game.install_version(&target, ctx).await {
                Ok(()) => index = LocalVersionIndex::scan(ctx.versions_dir)?,
                Err(e) => debug!("Generic install of {} failed: {}", target, e),
            }
        }

        // 5. Pick from the store
        let input = ResolutionInput {
            pins,
            target: &target,
        };
        for (name, strategy) in STRATEGIES {
            if let Some(id) = strategy(&input, &index) {
                info!("Resolved version {} via {}", id, name);
                return Ok(id);
            }
        }

        Err(LauncherError::Resolution(target))
    }
}
