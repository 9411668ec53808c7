pub mod catalog;
pub mod install;
pub mod manifest;
pub mod overlay;

pub use catalog::{ModrinthClient, VersionFile, VersionRecord};
pub use install::{InstallRequest, ModpackInstaller};
pub use manifest::{DependencyPins, LoaderKind, LoaderPin, PackFile, PackManifest};
