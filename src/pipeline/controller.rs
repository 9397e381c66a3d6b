use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    Dispatcher, InProcessQueue, RetryPolicy, StageOutcome, StageQueue, StageTask, StageWorker,
};
use crate::errors::AppError;
use crate::models::JobRecord;
use crate::providers::ProviderSet;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub provider_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            provider_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: std::env::var("PIPELINE_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.workers),
            provider_timeout: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            retry: RetryPolicy::from_env(),
        }
    }
}

/// Ties the dispatcher, stage workers and coordinator into the end-to-end
/// flow: `submit` creates the job and dispatches the first stage, the worker
/// pool drains the queue, and completions feed back into the dispatcher.
pub struct PipelineController {
    store: Arc<dyn JobStore>,
    dispatcher: Dispatcher,
    queue: Arc<InProcessQueue>,
    worker: StageWorker,
    retry: RetryPolicy,
}

impl PipelineController {
    /// Builds the pipeline and spawns its worker pool.
    pub fn spawn(
        store: Arc<dyn JobStore>,
        providers: ProviderSet,
        config: PipelineConfig,
    ) -> Arc<Self> {
        let (queue, rx) = InProcessQueue::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&queue) as Arc<dyn StageQueue>,
        );
        let worker = StageWorker::new(
            Arc::clone(&store),
            providers,
            config.retry.clone(),
            config.provider_timeout,
        );

        let controller = Arc::new(Self {
            store,
            dispatcher,
            queue,
            worker,
            retry: config.retry,
        });

        controller.start_workers(rx, config.workers);
        info!(workers = config.workers, "pipeline started");
        controller
    }

    fn start_workers(self: &Arc<Self>, rx: mpsc::UnboundedReceiver<StageTask>, count: usize) {
        let rx = Arc::new(Mutex::new(rx));
        for worker_id in 0..count {
            let controller = Arc::clone(self);
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let task = { rx.lock().await.recv().await };
                    match task {
                        Some(task) => controller.process(task).await,
                        None => break,
                    }
                }
                debug!(worker_id, "stage worker stopped");
            });
        }
    }

    async fn process(&self, task: StageTask) {
        match self.worker.execute(&task).await {
            Ok(completion) => match completion.outcome {
                StageOutcome::Succeeded => {
                    info!(
                        job_id = %task.job_id,
                        stage = %task.kind,
                        status = %completion.record.status,
                        keys = ?completion.record.result.populated_keys(),
                        "stage succeeded"
                    );
                    self.dispatcher.on_stage_completed(&completion.record, task.kind);
                }
                StageOutcome::Retrying(err) => {
                    let delay = self.retry.backoff_delay(task.attempt);
                    warn!(
                        job_id = %task.job_id,
                        stage = %task.kind,
                        attempt = task.attempt,
                        error = %err,
                        "redelivering stage in {:?}",
                        delay
                    );
                    let queue = Arc::clone(&self.queue);
                    let redelivery = task.redelivery();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.enqueue(redelivery);
                    });
                }
                StageOutcome::Failed(err) => {
                    error!(
                        job_id = %task.job_id,
                        stage = %task.kind,
                        status = %completion.record.status,
                        error = %err,
                        "stage failed permanently"
                    );
                    // A failed join branch may still be waiting on its
                    // sibling; only drop bookkeeping once the job is done.
                    if completion.record.status.is_terminal() {
                        self.dispatcher.forget(task.job_id);
                    }
                }
                StageOutcome::Skipped => {
                    self.dispatcher.forget(task.job_id);
                }
            },
            Err(err) => {
                error!(
                    job_id = %task.job_id,
                    stage = %task.kind,
                    error = %err,
                    "stage task aborted on storage error"
                );
            }
        }
    }

    /// Creates a job for the ticker and kicks off the pipeline. The returned
    /// record is already in `DATA_FETCHING`.
    pub async fn submit(&self, ticker: &str) -> Result<JobRecord, AppError> {
        let ticker = normalize_ticker(ticker)?;
        let record = self.store.create(ticker).await?;
        let record = self.dispatcher.on_job_created(&record).await?;
        Ok(record)
    }

    pub async fn status(&self, id: Uuid) -> Result<JobRecord, AppError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<JobRecord>, AppError> {
        Ok(self.store.list_recent(limit).await?)
    }
}

fn normalize_ticker(raw: &str) -> Result<String, AppError> {
    static TICKER_RE: OnceLock<Regex> = OnceLock::new();
    let re = TICKER_RE.get_or_init(|| {
        Regex::new(r"^[A-Z0-9][A-Z0-9.\-]{0,11}$").expect("ticker pattern is valid")
    });

    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AppError::Validation("ticker must not be empty".to_string()));
    }
    if !re.is_match(&ticker) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid ticker symbol",
            ticker
        )));
    }
    Ok(ticker)
}
