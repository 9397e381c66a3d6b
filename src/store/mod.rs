mod memory;
mod postgres;

pub use memory::InMemoryJobStore;
pub use postgres::PgJobStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{JobRecord, JobUpdate};

/// Bounded optimistic-commit loop: attempts and base backoff for retrying a
/// conditional update after a version conflict.
const CONFLICT_ATTEMPTS: u32 = 5;
const CONFLICT_BACKOFF_MS: u64 = 25;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),
    #[error("version conflict for job {id}: expected {expected}, found {found}")]
    VersionConflict { id: Uuid, expected: i64, found: i64 },
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Backend(value.to_string())
    }
}

/// Durable keyed storage for job records.
///
/// `conditional_update` is the only mutation primitive: it applies the given
/// update iff the record's version still equals `expected_version`, bumping
/// the version on success. Updates against a terminal record are ignored and
/// return the record unchanged.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, ticker: String) -> Result<JobRecord, StoreError>;

    async fn get(&self, id: Uuid) -> Result<JobRecord, StoreError>;

    async fn list_recent(&self, limit: i64) -> Result<Vec<JobRecord>, StoreError>;

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: JobUpdate,
    ) -> Result<JobRecord, StoreError>;
}

/// Read-modify-write loop over [`JobStore::conditional_update`].
///
/// `build` sees the freshly-read record and decides the update (returning
/// `None` to commit nothing). Version conflicts rerun the whole loop with
/// exponential backoff and jitter; a conflict surviving all attempts is
/// returned to the caller as fatal.
pub async fn commit_with_retry<F>(
    store: &Arc<dyn JobStore>,
    id: Uuid,
    build: F,
) -> Result<JobRecord, StoreError>
where
    F: Fn(&JobRecord) -> Option<JobUpdate>,
{
    let mut last_conflict = None;
    for attempt in 0..CONFLICT_ATTEMPTS {
        let record = store.get(id).await?;
        let update = match build(&record) {
            Some(update) => update,
            None => return Ok(record),
        };

        match store.conditional_update(id, record.version, update).await {
            Ok(updated) => return Ok(updated),
            Err(StoreError::VersionConflict { id, expected, found }) => {
                debug!(
                    job_id = %id,
                    attempt,
                    expected,
                    found,
                    "conditional update conflicted, retrying"
                );
                last_conflict = Some(StoreError::VersionConflict { id, expected, found });
                let jitter = rand::rng().random_range(0..CONFLICT_BACKOFF_MS);
                let delay = CONFLICT_BACKOFF_MS * 2u64.pow(attempt) + jitter;
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(other) => return Err(other),
        }
    }

    warn!(job_id = %id, attempts = CONFLICT_ATTEMPTS, "conditional update exhausted retries");
    Err(last_conflict.unwrap_or(StoreError::Backend("conflict retries exhausted".to_string())))
}
