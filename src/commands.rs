// ─── Service Facade ───
// The operations the front end calls. Queuing operations return a job id
// immediately; their failures surface only through job state.

use std::sync::Arc;

use tracing::info;

use crate::core::auth::IdentityProvider;
use crate::core::config::LauncherConfig;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::instance::{InstanceManager, InstanceRecord, ModFile};
use crate::core::jobs::{JobId, JobKind, JobRecord, JobStore};
use crate::core::launch::LaunchOrchestrator;
use crate::core::modpack::{InstallRequest, ModpackInstaller, ModrinthClient};

pub struct Launcher {
    config: LauncherConfig,
    jobs: JobStore,
    instances: InstanceManager,
    installer: Arc<ModpackInstaller>,
    orchestrator: Arc<LaunchOrchestrator>,
}

impl Launcher {
    /// Create the data directories and wire every component from `config`.
    pub fn new(config: LauncherConfig, identity: Arc<dyn IdentityProvider>) -> LauncherResult<Self> {
        config.ensure_dirs()?;
        let client = build_http_client(&config)?;
        let downloader = Downloader::new(client.clone()).with_concurrency(config.download_concurrency);

        let installer = ModpackInstaller::new(
            ModrinthClient::new(client, config.endpoints.modrinth_api.clone()),
            downloader.clone(),
            InstanceManager::new(config.instances_dir.clone()),
            config.temp_dir.clone(),
        );
        let orchestrator = LaunchOrchestrator::new(config.clone(), downloader, identity);
        Ok(Self::from_parts(config, installer, orchestrator))
    }

    /// Assemble a launcher from prebuilt pipelines.
    pub fn from_parts(
        config: LauncherConfig,
        installer: ModpackInstaller,
        orchestrator: LaunchOrchestrator,
    ) -> Self {
        info!("Launcher ready at {:?}", config.data_dir);
        Self {
            instances: InstanceManager::new(config.instances_dir.clone()),
            jobs: JobStore::new(),
            installer: Arc::new(installer),
            orchestrator: Arc::new(orchestrator),
            config,
        }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Queue a modpack install and return its job id.
    pub async fn install_modpack(&self, request: InstallRequest) -> JobId {
        let id = self.jobs.create(JobKind::Install).await;
        let handle = self.jobs.handle(id);
        let installer = Arc::clone(&self.installer);
        info!("Queued install of {} as job {}", request.target(), id);
        tokio::spawn(async move {
            installer.run(request, handle).await;
        });
        id
    }

    /// Queue a launch of an installed instance and return its job id.
    pub async fn launch_instance(&self, slug: &str) -> JobId {
        let id = self.jobs.create(JobKind::Launch).await;
        let handle = self.jobs.handle(id);
        let orchestrator = Arc::clone(&self.orchestrator);
        let slug = slug.to_string();
        info!("Queued launch of {} as job {}", slug, id);
        tokio::spawn(async move {
            orchestrator.run(&slug, handle).await;
        });
        id
    }

    pub async fn job(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.get(id).await
    }

    /// Job lookup for callers holding the id as text.
    pub async fn job_by_str(&self, id: &str) -> LauncherResult<JobRecord> {
        let parsed: JobId = id
            .parse()
            .map_err(|_| LauncherError::Other(format!("invalid job id {}", id)))?;
        self.jobs
            .get(parsed)
            .await
            .ok_or_else(|| LauncherError::Other(format!("job {} not found", id)))
    }

    pub async fn list_instances(&self) -> LauncherResult<Vec<InstanceRecord>> {
        self.instances.list().await
    }

    pub async fn list_mods(&self, slug: &str) -> LauncherResult<Vec<ModFile>> {
        self.instances.list_mods(slug).await
    }
}
