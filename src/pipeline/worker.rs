use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::{RetryPolicy, StageError, StageKind, StageOutcome, StageTask};
use crate::models::{BranchOutcome, JobRecord, JobStatus, JobUpdate, ResultPatch};
use crate::pipeline::Coordinator;
use crate::providers::{ProviderError, ProviderSet};
use crate::store::{commit_with_retry, JobStore, StoreError};

/// What a single stage delivery produced: the job state after the stage's
/// commit (or the pre-stage state when nothing was written) and the outcome.
pub struct StageCompletion {
    pub record: JobRecord,
    pub outcome: StageOutcome,
}

/// Generic stage worker: reads the job, invokes the stage's provider under a
/// timeout, and commits exactly one conditional update, either the success
/// sub-key (plus any status advance) or the failure record. Transient failures that
/// the retry policy still allows are returned uncommitted so the controller
/// can redeliver the task.
pub struct StageWorker {
    store: Arc<dyn JobStore>,
    coordinator: Coordinator,
    providers: ProviderSet,
    retry: RetryPolicy,
    provider_timeout: Duration,
}

impl StageWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        providers: ProviderSet,
        retry: RetryPolicy,
        provider_timeout: Duration,
    ) -> Self {
        let coordinator = Coordinator::new(Arc::clone(&store));
        Self {
            store,
            coordinator,
            providers,
            retry,
            provider_timeout,
        }
    }

    pub async fn execute(&self, task: &StageTask) -> Result<StageCompletion, StoreError> {
        let record = self.store.get(task.job_id).await?;

        if record.status.is_terminal() {
            debug!(
                job_id = %task.job_id,
                stage = %task.kind,
                status = %record.status,
                "job already terminal, skipping stage"
            );
            return Ok(StageCompletion {
                record,
                outcome: StageOutcome::Skipped,
            });
        }

        match self.run_stage(task, &record).await {
            Ok(patch) => self.commit_success(task, patch).await,
            Err(err) if self.retry.allows_retry(&err, task.attempt) => {
                warn!(
                    job_id = %task.job_id,
                    stage = %task.kind,
                    attempt = task.attempt,
                    error = %err,
                    "transient stage failure, leaving job untouched for redelivery"
                );
                Ok(StageCompletion {
                    record,
                    outcome: StageOutcome::Retrying(err),
                })
            }
            Err(err) => self.commit_failure(task, err).await,
        }
    }

    async fn run_stage(
        &self,
        task: &StageTask,
        record: &JobRecord,
    ) -> Result<ResultPatch, StageError> {
        match task.kind {
            StageKind::Data => {
                let fundamentals = self
                    .with_timeout(self.providers.data.fetch(&task.ticker))
                    .await?;
                Ok(ResultPatch::Fundamentals(fundamentals))
            }
            StageKind::Intelligence => {
                let company_name = company_name_of(record, &task.ticker);
                let briefing = self
                    .with_timeout(
                        self.providers
                            .intelligence
                            .fetch(&task.ticker, &company_name),
                    )
                    .await?;
                Ok(ResultPatch::IntelligenceBriefing(briefing))
            }
            StageKind::Prediction => {
                let forecast = self
                    .with_timeout(self.providers.forecast.fetch(&task.ticker))
                    .await?;
                Ok(ResultPatch::PredictionAnalysis(forecast))
            }
            StageKind::Analysis => {
                let briefing = record.result.intelligence_briefing.as_ref().ok_or_else(|| {
                    StageError::Internal(
                        "analysis stage ran without a committed intelligence briefing".to_string(),
                    )
                })?;
                let company_name = company_name_of(record, &task.ticker);
                let report = self
                    .with_timeout(self.providers.analyst.analyze(
                        &task.ticker,
                        &company_name,
                        briefing,
                    ))
                    .await?;
                Ok(ResultPatch::LlmAnalysis(report))
            }
            StageKind::Advisor => {
                let thesis = self
                    .with_timeout(self.providers.advisor.synthesize(&record.result))
                    .await?;
                Ok(ResultPatch::AdvisorSummary(thesis))
            }
        }
    }

    async fn commit_success(
        &self,
        task: &StageTask,
        patch: ResultPatch,
    ) -> Result<StageCompletion, StoreError> {
        let committed = match task.kind.join_branch() {
            Some(branch) => {
                self.coordinator
                    .record_branch(task.job_id, branch, BranchOutcome::Succeeded, patch)
                    .await
            }
            None => {
                let advance = success_advance(task.kind);
                commit_with_retry(&self.store, task.job_id, |current| {
                    if current.status.is_terminal() {
                        return None;
                    }
                    let mut update = JobUpdate::patch(patch.clone());
                    if let Some(next) = advance {
                        update = update.with_advance(next);
                    }
                    Some(update)
                })
                .await
            }
        };

        match committed {
            Ok(record) => Ok(StageCompletion {
                record,
                outcome: StageOutcome::Succeeded,
            }),
            Err(StoreError::VersionConflict { .. }) => {
                let err = StageError::PersistenceConflict(format!(
                    "could not commit {} stage output",
                    task.kind
                ));
                self.commit_failure(task, err).await
            }
            Err(other) => Err(other),
        }
    }

    async fn commit_failure(
        &self,
        task: &StageTask,
        err: StageError,
    ) -> Result<StageCompletion, StoreError> {
        let message = failure_message(task.kind, &task.ticker, &err);
        let patch = ResultPatch::Error(message);

        let committed = match task.kind.join_branch() {
            Some(branch) => {
                self.coordinator
                    .record_branch(task.job_id, branch, BranchOutcome::Failed, patch)
                    .await
            }
            None => {
                commit_with_retry(&self.store, task.job_id, |current| {
                    if current.status.is_terminal() {
                        return None;
                    }
                    Some(JobUpdate::patch(patch.clone()).with_advance(JobStatus::Failed))
                })
                .await
            }
        };

        match committed {
            Ok(record) => Ok(StageCompletion {
                record,
                outcome: StageOutcome::Failed(err),
            }),
            Err(store_err) => {
                error!(
                    job_id = %task.job_id,
                    stage = %task.kind,
                    error = %store_err,
                    "failed to record stage failure"
                );
                Err(store_err)
            }
        }
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.provider_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(StageError::ProviderTimeout(self.provider_timeout)),
        }
    }
}

fn company_name_of(record: &JobRecord, ticker: &str) -> String {
    record
        .result
        .fundamentals
        .as_ref()
        .map(|f| f.company_name.clone())
        .unwrap_or_else(|| ticker.to_string())
}

/// Status advance carried by a non-join stage's success commit.
fn success_advance(kind: StageKind) -> Option<JobStatus> {
    match kind {
        StageKind::Data => Some(JobStatus::IntelligenceGathering),
        StageKind::Analysis => Some(JobStatus::Summarizing),
        StageKind::Advisor => Some(JobStatus::Success),
        StageKind::Intelligence | StageKind::Prediction => None,
    }
}

/// User-facing failure message: names the ticker, explains generically, and
/// carries the technical cause without stack detail.
fn failure_message(kind: StageKind, ticker: &str, err: &StageError) -> String {
    match kind {
        StageKind::Data => format!(
            "Analysis failed for ticker '{}'. This stock may not be listed or there was \
             a problem fetching its data. Please check the ticker symbol and try again. \
             (Details: {})",
            ticker, err
        ),
        _ => format!(
            "The {} stage failed for ticker '{}' and the analysis could not be completed. \
             (Details: {})",
            kind, ticker, err
        ),
    }
}
