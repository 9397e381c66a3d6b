use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::models::{AnalysisResult, JobRecord, JobStatus, JobUpdate, JoinState};

/// Postgres-backed job store.
///
/// The conditional update runs as a `SELECT ... FOR UPDATE` + guarded
/// `UPDATE` inside one transaction, so the version check and the write are
/// linearized per record.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn parse_status(raw: &str) -> Result<JobStatus, StoreError> {
    serde_json::from_str(&format!("\"{}\"", raw))
        .map_err(|_| StoreError::Backend(format!("unknown job status '{}'", raw)))
}

fn row_to_record(row: &PgRow) -> Result<JobRecord, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let result_raw: serde_json::Value = row.try_get("result")?;
    let join_raw: serde_json::Value = row.try_get("join_state")?;

    let result: AnalysisResult = serde_json::from_value(result_raw)
        .map_err(|e| StoreError::Backend(format!("malformed result document: {}", e)))?;
    let join: JoinState = serde_json::from_value(join_raw)
        .map_err(|e| StoreError::Backend(format!("malformed join state: {}", e)))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    Ok(JobRecord {
        id: row.try_get("id")?,
        ticker: row.try_get("ticker")?,
        status: parse_status(&status_raw)?,
        result,
        join,
        created_at,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, ticker: String) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(ticker);

        sqlx::query(
            "INSERT INTO analysis_jobs (id, ticker, status, result, join_state, created_at, version)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(&record.ticker)
        .bind(record.status.to_string())
        .bind(serde_json::to_value(&record.result).unwrap_or_default())
        .bind(serde_json::to_value(record.join).unwrap_or_default())
        .bind(record.created_at)
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<JobRecord, StoreError> {
        let row = sqlx::query(
            "SELECT id, ticker, status, result, join_state, created_at, version
             FROM analysis_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        row_to_record(&row)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<JobRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, ticker, status, result, join_state, created_at, version
             FROM analysis_jobs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected_version: i64,
        update: JobUpdate,
    ) -> Result<JobRecord, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, ticker, status, result, join_state, created_at, version
             FROM analysis_jobs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        let mut record = row_to_record(&row)?;

        if record.status.is_terminal() {
            warn!(job_id = %id, status = %record.status, "ignoring update to terminal job");
            tx.rollback().await?;
            return Ok(record);
        }

        if record.version != expected_version {
            let found = record.version;
            tx.rollback().await?;
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
                found,
            });
        }

        update.apply_to(&mut record);
        record.version += 1;

        sqlx::query(
            "UPDATE analysis_jobs
             SET status = $2, result = $3, join_state = $4, version = $5
             WHERE id = $1 AND version = $6",
        )
        .bind(record.id)
        .bind(record.status.to_string())
        .bind(serde_json::to_value(&record.result).unwrap_or_default())
        .bind(serde_json::to_value(record.join).unwrap_or_default())
        .bind(record.version)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }
}
