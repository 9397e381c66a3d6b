//! The multi-stage analysis pipeline.
//!
//! A job moves through five stages: data fetching, then intelligence
//! gathering and prediction in parallel, then LLM analysis over the joined
//! output, then the final advisor synthesis. Stage tasks are pulled from an
//! in-process work queue by a fixed worker pool; all coordination between
//! stages goes through the job store's conditional-update primitive, so the
//! pipeline is correct for any interleaving of the two parallel branches.

pub mod controller;
pub mod coordinator;
pub mod dispatcher;
pub mod queue;
pub mod retry;
pub mod worker;

pub use controller::{PipelineConfig, PipelineController};
pub use coordinator::Coordinator;
pub use dispatcher::Dispatcher;
pub use queue::{InProcessQueue, StageQueue};
pub use retry::RetryPolicy;
pub use worker::{StageCompletion, StageWorker};

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::JoinBranch;
use crate::providers::ProviderError;

/// The five stage kinds, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Data,
    Intelligence,
    Prediction,
    Analysis,
    Advisor,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            StageKind::Data => "data",
            StageKind::Intelligence => "intelligence",
            StageKind::Prediction => "prediction",
            StageKind::Analysis => "analysis",
            StageKind::Advisor => "advisor",
        }
    }

    /// The join branch this stage belongs to, if it is one of the fan-out
    /// pair.
    pub fn join_branch(self) -> Option<JoinBranch> {
        match self {
            StageKind::Intelligence => Some(JoinBranch::Intelligence),
            StageKind::Prediction => Some(JoinBranch::Prediction),
            _ => None,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One unit of work on the queue. `attempt` counts deliveries of this
/// (job, stage) pair, starting at 1.
#[derive(Debug, Clone)]
pub struct StageTask {
    pub job_id: Uuid,
    pub ticker: String,
    pub kind: StageKind,
    pub attempt: u32,
}

impl StageTask {
    pub fn new(job_id: Uuid, ticker: &str, kind: StageKind) -> Self {
        Self {
            job_id,
            ticker: ticker.to_string(),
            kind,
            attempt: 1,
        }
    }

    pub fn redelivery(&self) -> Self {
        Self {
            job_id: self.job_id,
            ticker: self.ticker.clone(),
            kind: self.kind,
            attempt: self.attempt + 1,
        }
    }
}

/// Failure taxonomy for a stage run.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider call timed out after {0:?}")]
    ProviderTimeout(Duration),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("persistent write conflict: {0}")]
    PersistenceConflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StageError {
    /// Transient failures are redelivered by the queue under the central
    /// retry policy; everything else is permanent for the stage.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StageError::ProviderUnavailable(_) | StageError::ProviderTimeout(_)
        )
    }
}

impl From<ProviderError> for StageError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::InvalidTicker(t) => StageError::InvalidTicker(t),
            ProviderError::Unavailable(msg) => StageError::ProviderUnavailable(msg),
            ProviderError::BadResponse(msg) => StageError::ProviderUnavailable(msg),
            ProviderError::RateLimited => {
                StageError::ProviderUnavailable("rate limited".to_string())
            }
            ProviderError::Inference(msg) => StageError::ModelInference(msg),
        }
    }
}

/// What a stage delivery amounted to.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    /// Sub-key committed, status possibly advanced.
    Succeeded,
    /// Transient failure, nothing written; the controller re-enqueues.
    Retrying(StageError),
    /// Permanent failure, error committed and downstream short-circuited.
    Failed(StageError),
    /// The job was already terminal; nothing to do.
    Skipped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StageError::ProviderUnavailable("down".to_string()).is_transient());
        assert!(StageError::ProviderTimeout(Duration::from_secs(30)).is_transient());
        assert!(!StageError::InvalidTicker("ZZZZ".to_string()).is_transient());
        assert!(!StageError::ModelInference("bad".to_string()).is_transient());
        assert!(!StageError::PersistenceConflict("conflict".to_string()).is_transient());
    }

    #[test]
    fn only_fanout_stages_have_a_join_branch() {
        assert_eq!(StageKind::Data.join_branch(), None);
        assert_eq!(
            StageKind::Intelligence.join_branch(),
            Some(JoinBranch::Intelligence)
        );
        assert_eq!(
            StageKind::Prediction.join_branch(),
            Some(JoinBranch::Prediction)
        );
        assert_eq!(StageKind::Analysis.join_branch(), None);
        assert_eq!(StageKind::Advisor.join_branch(), None);
    }
}
