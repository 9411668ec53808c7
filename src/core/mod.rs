// ─── Cottage Core ───
// Modpack provisioning and launch orchestration.
//
// Architecture:
//   core/
//     jobs/      : Job store polled by the front end
//     downloader/: Streaming, bounded-concurrency downloads with SHA-1 checks
//     archive    : Zip and tar.gz extraction
//     instance/  : Instance records + manager
//     modpack/   : Modrinth catalog, .mrpack manifest, install pipeline
//     java/      : Adoptium runtime provisioning
//     version/   : Mojang manifest + version JSON + OS rules
//     maven/     : Artifact coordinates
//     assets/    : Asset index + object downloads
//     loaders/   : Vanilla, Fabric, Quilt, Forge, NeoForge installers
//     resolver/  : Pins → installed version id
//     auth/      : Identity seam
//     launch/    : Command builder, classpath sanitizer, process spawner

pub mod archive;
pub mod assets;
pub mod auth;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod instance;
pub mod java;
pub mod jobs;
pub mod launch;
pub mod loaders;
pub mod maven;
pub mod modpack;
pub mod resolver;
pub mod version;
