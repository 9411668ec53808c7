use super::index::LocalVersionIndex;
use crate::core::modpack::{DependencyPins, LoaderKind};

/// Naive version id for a set of pins, following each ecosystem's own
/// naming convention. `None` when the pins cannot name a version.
pub fn naive_version_id(pins: &DependencyPins) -> Option<String> {
    let base = pins.minecraft.as_deref();
    match (&pins.loader, base) {
        (Some(loader), Some(base)) => Some(match loader.kind {
            LoaderKind::Fabric => format!("fabric-loader-{}-{}", loader.version, base),
            LoaderKind::Quilt => format!("quilt-loader-{}-{}", loader.version, base),
            LoaderKind::Forge => format!("forge-{}-{}", base, loader.version),
            LoaderKind::NeoForge => format!("neoforge-{}", loader.version),
        }),
        (Some(loader), None) if loader.kind == LoaderKind::NeoForge => {
            Some(format!("neoforge-{}", loader.version))
        }
        (Some(_), None) => None,
        (None, base) => base.map(str::to_string),
    }
}

/// Inputs shared by every strategy: the pins and the id the install phase
/// settled on.
#[derive(Debug, Clone)]
pub struct ResolutionInput<'a> {
    pub pins: &'a DependencyPins,
    pub target: &'a str,
}

/// One way of picking an installed version id. Pure over its inputs.
pub type Strategy = fn(&ResolutionInput<'_>, &LocalVersionIndex) -> Option<String>;

/// The target id itself, if something installed it.
pub fn installed_target(input: &ResolutionInput<'_>, index: &LocalVersionIndex) -> Option<String> {
    index
        .is_installed(input.target)
        .then(|| input.target.to_string())
}

/// Any installed loader version for the same base game, newest first. When a
/// loader is pinned only its own prefix is considered. Best-effort: with
/// several candidates the most recently modified one wins.
pub fn discover_loader_version(
    input: &ResolutionInput<'_>,
    index: &LocalVersionIndex,
) -> Option<String> {
    let base = input.pins.minecraft.as_deref()?;
    let prefixes: Vec<&str> = match &input.pins.loader {
        Some(loader) => vec![loader.kind.id_prefix()],
        None => LoaderKind::ALL.iter().map(|k| k.id_prefix()).collect(),
    };
    index.newest_matching(&prefixes, base)
}

/// Strategies in the order the resolver tries them once installation is done.
pub const STRATEGIES: [(&str, Strategy); 2] = [
    ("installed-target", installed_target),
    ("loader-discovery", discover_loader_version),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::index::InstalledVersion;
    use std::time::{Duration, SystemTime};

    fn index(ids: &[(&str, u64)]) -> LocalVersionIndex {
        LocalVersionIndex::from_entries(
            ids.iter()
                .map(|(id, secs)| InstalledVersion {
                    id: id.to_string(),
                    modified: SystemTime::UNIX_EPOCH + Duration::from_secs(*secs),
                })
                .collect(),
        )
    }

    #[test]
    fn naive_ids_follow_ecosystem_templates() {
        let fabric = DependencyPins::new("1.20.1").with_loader(LoaderKind::Fabric, "0.15.0");
        assert_eq!(naive_version_id(&fabric).as_deref(), Some("fabric-loader-0.15.0-1.20.1"));

        let vanilla = DependencyPins::new("1.20.6");
        assert_eq!(naive_version_id(&vanilla).as_deref(), Some("1.20.6"));

        let quilt = DependencyPins::new("1.20.1").with_loader(LoaderKind::Quilt, "0.23.1");
        assert_eq!(naive_version_id(&quilt).as_deref(), Some("quilt-loader-0.23.1-1.20.1"));

        let forge = DependencyPins::new("1.20.1").with_loader(LoaderKind::Forge, "47.2.0");
        assert_eq!(naive_version_id(&forge).as_deref(), Some("forge-1.20.1-47.2.0"));

        let neoforge = DependencyPins::new("1.21.1").with_loader(LoaderKind::NeoForge, "21.1.77");
        assert_eq!(naive_version_id(&neoforge).as_deref(), Some("neoforge-21.1.77"));

        assert_eq!(naive_version_id(&DependencyPins::default()), None);
    }

    #[test]
    fn installed_target_requires_exact_id() {
        let pins = DependencyPins::new("1.20.1");
        let input = ResolutionInput { pins: &pins, target: "1.20.1" };
        assert_eq!(installed_target(&input, &index(&[("1.20.1", 1)])).as_deref(), Some("1.20.1"));
        assert_eq!(installed_target(&input, &index(&[("1.20.10", 1)])), None);
    }

    #[test]
    fn discovery_is_scoped_to_pinned_loader() {
        let pins = DependencyPins::new("1.20.1").with_loader(LoaderKind::Quilt, "0.23.1");
        let input = ResolutionInput { pins: &pins, target: "quilt-loader-0.23.1-1.20.1" };
        let idx = index(&[
            ("fabric-loader-0.15.0-1.20.1", 50),
            ("quilt-loader-0.22.0-1.20.1", 10),
            ("quilt-loader-0.23.0-1.20.1", 20),
        ]);
        assert_eq!(
            discover_loader_version(&input, &idx).as_deref(),
            Some("quilt-loader-0.23.0-1.20.1")
        );
    }

    #[test]
    fn discovery_without_loader_accepts_any_prefix() {
        let pins = DependencyPins::new("1.20.1");
        let input = ResolutionInput { pins: &pins, target: "1.20.1" };
        let idx = index(&[("fabric-loader-0.15.0-1.20.1", 5), ("neoforge-1.20.1", 9)]);
        assert_eq!(discover_loader_version(&input, &idx).as_deref(), Some("neoforge-1.20.1"));
    }
}
