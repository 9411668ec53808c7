// ─── Launch Task ───
// preparing-java → authenticating → resolving-version → building-command
// → sanitizing → spawning → completed. A successful spawn completes the
// job; the game process is not supervised afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tracing::{debug, info, instrument, warn};

use super::command::{CommandBuilder, CommandRequest, VersionCommandBuilder};
use super::sanitize::{prune_library_store, sanitize_command};
use crate::core::auth::IdentityProvider;
use crate::core::config::LauncherConfig;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::InstanceManager;
use crate::core::java::{required_java_for_minecraft_version, RuntimeProvisioner};
use crate::core::jobs::JobHandle;
use crate::core::loaders::neoforge::minecraft_version_for;
use crate::core::loaders::{InstallContext, LoaderInstallers, VanillaInstaller};
use crate::core::modpack::{DependencyPins, LoaderKind};
use crate::core::resolver::VersionResolver;
use crate::core::version::ResolvedVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    PreparingJava,
    Authenticating,
    ResolvingVersion,
    BuildingCommand,
    Sanitizing,
    Spawning,
}

impl LaunchStage {
    fn progress(self) -> u8 {
        match self {
            LaunchStage::PreparingJava => 5,
            LaunchStage::Authenticating => 20,
            LaunchStage::ResolvingVersion => 30,
            LaunchStage::BuildingCommand => 70,
            LaunchStage::Sanitizing => 80,
            LaunchStage::Spawning => 90,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LaunchStage::PreparingJava => "Preparing Java runtime",
            LaunchStage::Authenticating => "Authenticating",
            LaunchStage::ResolvingVersion => "Resolving game version",
            LaunchStage::BuildingCommand => "Building launch command",
            LaunchStage::Sanitizing => "Sanitizing classpath",
            LaunchStage::Spawning => "Starting game",
        }
    }
}

/// A spawned game process.
#[derive(Debug, Clone)]
pub struct LaunchedGame {
    pub pid: u32,
    pub version_id: String,
    pub log_path: PathBuf,
}

pub struct LaunchOrchestrator {
    config: LauncherConfig,
    downloader: Downloader,
    instances: InstanceManager,
    runtimes: RuntimeProvisioner,
    resolver: VersionResolver,
    identity: Arc<dyn IdentityProvider>,
    commands: Arc<dyn CommandBuilder>,
}

impl LaunchOrchestrator {
    pub fn new(
        config: LauncherConfig,
        downloader: Downloader,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let runtimes = RuntimeProvisioner::new(
            downloader.clone(),
            config.endpoints.adoptium_api.clone(),
            config.temp_dir.clone(),
        );
        Self {
            instances: InstanceManager::new(config.instances_dir.clone()),
            resolver: VersionResolver::new(
                Arc::new(VanillaInstaller::new()),
                Arc::new(LoaderInstallers::new()),
            ),
            commands: Arc::new(VersionCommandBuilder::new(&config)),
            runtimes,
            identity,
            downloader,
            config,
        }
    }

    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_command_builder(mut self, commands: Arc<dyn CommandBuilder>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_runtime_provisioner(mut self, runtimes: RuntimeProvisioner) -> Self {
        self.runtimes = runtimes;
        self
    }

    /// Job entry point: runs the pipeline and converts the outcome into the
    /// job's terminal state. Never returns an error to the caller.
    pub async fn run(&self, slug: &str, job: JobHandle) {
        match self.launch(slug, &job).await {
            Ok(game) => {
                job.complete(format!(
                    "Launched {} (pid {}), log at {}",
                    game.version_id,
                    game.pid,
                    game.log_path.display()
                ))
                .await;
            }
            Err(e) => {
                warn!("Launch of {} failed: {}", slug, e);
                job.fail(e.to_string()).await;
            }
        }
    }

    #[instrument(skip(self, job))]
    pub async fn launch(&self, slug: &str, job: &JobHandle) -> LauncherResult<LaunchedGame> {
        let record = self.instances.load(slug).await?;
        let paths = self.instances.paths(slug);
        let pins = self.instances.pack_manifest(slug).await?.pins()?;
        let base = runtime_game_version(&pins).ok_or_else(|| {
            LauncherError::Manifest(format!("instance {} declares no game version", slug))
        })?;

        // 1. Java
        self.stage(job, LaunchStage::PreparingJava).await;
        let feature = required_java_for_minecraft_version(&base);
        let mut java = self.runtimes.ensure(feature, &self.config.runtimes_dir).await?;

        // 2. Identity
        self.stage(job, LaunchStage::Authenticating).await;
        let profile = self.identity.authenticate().await?;

        // 3. Version
        self.stage(job, LaunchStage::ResolvingVersion).await;
        let versions_dir = self.config.versions_dir();
        let libraries_dir = self.config.libraries_dir();
        let assets_dir = self.config.assets_dir();
        let version_id = {
            let ctx = InstallContext {
                game_dir: &self.config.game_dir,
                versions_dir: &versions_dir,
                libraries_dir: &libraries_dir,
                assets_dir: &assets_dir,
                temp_dir: &self.config.temp_dir,
                downloader: &self.downloader,
                endpoints: &self.config.endpoints,
                java: Some(&java),
            };
            self.resolver.resolve(&pins, &ctx).await?
        };

        // The version may pin a different runtime than the game-version table.
        let declared = ResolvedVersion::load(&versions_dir, &version_id)
            .ok()
            .and_then(|v| v.java_major);
        if let Some(major) = declared.filter(|m| *m != feature) {
            info!("{} requests Java {} instead of {}", version_id, major, feature);
            java = self.runtimes.ensure(major, &self.config.runtimes_dir).await?;
        }

        // 4. Command
        self.stage(job, LaunchStage::BuildingCommand).await;
        let command = self
            .commands
            .build(&CommandRequest {
                profile: &profile,
                java: &java,
                game_dir: paths.root(),
                version_id: &version_id,
            })
            .await?;

        // 5. Sanitize
        self.stage(job, LaunchStage::Sanitizing).await;
        if let Err(e) = prune_library_store(&libraries_dir) {
            warn!("Library store pruning skipped: {}", e);
        }
        let command = sanitize_command(&command);

        // 6. Spawn
        self.stage(job, LaunchStage::Spawning).await;
        let log_path = self.instances.log_path(slug);
        let pid = spawn_detached(&command, paths.root(), &log_path)?;
        info!("Launched '{}' as {} (pid {})", record.name, version_id, pid);

        Ok(LaunchedGame {
            pid,
            version_id,
            log_path,
        })
    }

    async fn stage(&self, job: &JobHandle, stage: LaunchStage) {
        info!("{}", stage.label());
        job.running(stage.progress(), stage.label()).await;
    }
}

/// Game version used to pick the Java runtime. NeoForge packs may omit the
/// base pin since their loader version encodes it.
fn runtime_game_version(pins: &DependencyPins) -> Option<String> {
    pins.minecraft.clone().or_else(|| {
        pins.loader
            .as_ref()
            .filter(|l| l.kind == LoaderKind::NeoForge)
            .and_then(|l| minecraft_version_for(&l.version))
    })
}

/// Spawn `command` with stdout and stderr appended to a freshly truncated
/// log. A background thread reaps the child when it exits.
fn spawn_detached(command: &[String], working_dir: &Path, log_path: &Path) -> LauncherResult<u32> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| LauncherError::Launch("empty launch command".into()))?;

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let stdout = std::fs::File::create(log_path).map_err(|e| LauncherError::io(log_path, e))?;
    let stderr = stdout.try_clone().map_err(|e| LauncherError::io(log_path, e))?;

    let mut cmd = std::process::Command::new(program);
    cmd.args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    configure_platform_spawn(&mut cmd);

    debug!("Command (copy/paste): {}", format_command_for_logs(&cmd));
    let mut child = cmd
        .spawn()
        .map_err(|e| LauncherError::Launch(format!("could not start {}: {}", program, e)))?;
    let pid = child.id();

    std::thread::spawn(move || match child.wait() {
        Ok(status) => info!("Game process {} exited with {}", pid, status),
        Err(e) => warn!("Could not wait on game process {}: {}", pid, e),
    });

    Ok(pid)
}

#[cfg_attr(not(target_os = "windows"), allow(unused_variables))]
fn configure_platform_spawn(cmd: &mut std::process::Command) {
    #[cfg(target_os = "windows")]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS);
        cmd.env_remove("WT_SESSION");
        cmd.env_remove("TERM");
    }
}

fn format_command_for_logs(cmd: &std::process::Command) -> String {
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
