use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{StageKind, StageQueue, StageTask};
use crate::models::{JobRecord, JobStatus, JobUpdate};
use crate::store::{commit_with_retry, JobStore, StoreError};

/// Decides which stage(s) to enqueue next from the static dependency graph:
/// Data fans out to Intelligence and Prediction, their join feeds Analysis,
/// Analysis feeds Advisor. Dispatch is idempotent per (job, stage), so a
/// duplicate completion event never double-enqueues downstream work.
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn StageQueue>,
    dispatched: DashMap<Uuid, HashSet<StageKind>>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn StageQueue>) -> Self {
        Self {
            store,
            queue,
            dispatched: DashMap::new(),
        }
    }

    /// Marks the job as fetching and enqueues the data stage.
    pub async fn on_job_created(&self, record: &JobRecord) -> Result<JobRecord, StoreError> {
        let updated = commit_with_retry(&self.store, record.id, |current| {
            if current.status == JobStatus::Pending {
                Some(JobUpdate::default().with_advance(JobStatus::DataFetching))
            } else {
                None
            }
        })
        .await?;

        info!(job_id = %record.id, ticker = %record.ticker, "job accepted, dispatching data stage");
        self.dispatch(record.id, &record.ticker, StageKind::Data);
        Ok(updated)
    }

    /// Walks the dependency graph after a successful stage completion.
    /// `record` is the job state returned by that stage's commit.
    pub fn on_stage_completed(&self, record: &JobRecord, kind: StageKind) {
        match kind {
            StageKind::Data => {
                self.dispatch(record.id, &record.ticker, StageKind::Intelligence);
                self.dispatch(record.id, &record.ticker, StageKind::Prediction);
            }
            StageKind::Intelligence | StageKind::Prediction => {
                if record.join.both_reported() && record.join.all_succeeded() {
                    self.dispatch(record.id, &record.ticker, StageKind::Analysis);
                }
            }
            StageKind::Analysis => {
                self.dispatch(record.id, &record.ticker, StageKind::Advisor);
            }
            StageKind::Advisor => {}
        }

        if record.status.is_terminal() {
            self.forget(record.id);
        }
    }

    /// Drops per-job dispatch bookkeeping once the job can no longer make
    /// progress.
    pub fn forget(&self, job_id: Uuid) {
        self.dispatched.remove(&job_id);
    }

    fn dispatch(&self, job_id: Uuid, ticker: &str, kind: StageKind) -> bool {
        let mut entry = self.dispatched.entry(job_id).or_default();
        if !entry.insert(kind) {
            debug!(job_id = %job_id, stage = %kind, "stage already dispatched, skipping");
            return false;
        }
        drop(entry);

        self.queue.enqueue(StageTask::new(job_id, ticker, kind));
        true
    }
}
