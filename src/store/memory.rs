use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::models::{JobRecord, JobUpdate};

/// In-memory job store backed by a concurrent map.
///
/// Used by the test suite and by `JOB_STORE=memory` deployments where
/// durability across restarts is not needed. Each entry is mutated under its
/// shard lock, so the version check and the write are atomic per record.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, JobRecord>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, ticker: String) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(ticker);
        self.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord, StoreError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<JobRecord>, StoreError> {
        let mut records: Vec<JobRecord> = self.jobs.iter().map(|e| e.clone()).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: JobUpdate,
    ) -> Result<JobRecord, StoreError> {
        let mut entry = self.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if entry.status.is_terminal() {
            warn!(job_id = %id, status = %entry.status, "ignoring update to terminal job");
            return Ok(entry.clone());
        }

        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                found: entry.version,
            });
        }

        update.apply_to(&mut entry);
        entry.version += 1;
        Ok(entry.clone())
    }
}
