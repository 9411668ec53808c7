use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::model::{JobId, JobKind, JobRecord, JobUpdate};

/// Process-wide registry of job progress, constructed once and cloned into
/// every background task and status query.
///
/// Each record is replaced under the write lock, so a poller always sees a
/// whole record from before or after an update.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id with a queued record at 0%.
    pub async fn create(&self, kind: JobKind) -> JobId {
        let id = JobId::new();
        self.jobs
            .write()
            .await
            .insert(id, JobRecord::queued(id, kind));
        debug!("Queued {:?} job {}", kind, id);
        id
    }

    /// Merge `update` into the job. Unknown ids and terminal jobs are ignored.
    pub async fn update(&self, id: JobId, update: JobUpdate) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(record) => {
                if !record.apply(update) {
                    debug!("Ignoring update for finished job {}", id);
                }
            }
            None => warn!("Update for unknown job {}", id),
        }
    }

    pub async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Bind `id` to this store for a background task.
    pub fn handle(&self, id: JobId) -> JobHandle {
        JobHandle {
            store: self.clone(),
            id,
        }
    }
}

/// The mutation side of one job, owned by the single task that runs it.
#[derive(Debug, Clone)]
pub struct JobHandle {
    store: JobStore,
    id: JobId,
}

impl JobHandle {
    pub async fn running(&self, progress: u8, message: impl Into<String>) {
        self.store
            .update(self.id, JobUpdate::running(progress, message))
            .await;
    }

    pub async fn complete(&self, message: impl Into<String>) {
        self.store
            .update(self.id, JobUpdate::completed(message))
            .await;
    }

    pub async fn fail(&self, message: impl Into<String>) {
        self.store.update(self.id, JobUpdate::failed(message)).await;
    }
}
