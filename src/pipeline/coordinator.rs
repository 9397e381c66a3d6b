use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::{BranchOutcome, JobRecord, JobStatus, JobUpdate, JoinBranch, ResultPatch};
use crate::store::{commit_with_retry, JobStore, StoreError};

/// Join point for the intelligence/prediction fan-out.
///
/// Each branch reports exactly once per delivery: the report writes the
/// branch's result patch and join mark in one conditional update. The branch
/// that completes the join also advances the status in that same update, to
/// `ANALYZING` when both branches succeeded and to `FAILED` otherwise. A
/// first-reporting branch never touches the status, so a failing branch can
/// never clobber its sibling's still-outstanding output.
pub struct Coordinator {
    store: Arc<dyn JobStore>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn record_branch(
        &self,
        job_id: Uuid,
        branch: JoinBranch,
        outcome: BranchOutcome,
        patch: ResultPatch,
    ) -> Result<JobRecord, StoreError> {
        let other = match branch {
            JoinBranch::Intelligence => JoinBranch::Prediction,
            JoinBranch::Prediction => JoinBranch::Intelligence,
        };

        let record = commit_with_retry(&self.store, job_id, |record| {
            if record.status.is_terminal() {
                return None;
            }

            let mut update = JobUpdate::patch(patch.clone()).with_join_mark(branch, outcome);

            if let Some(sibling) = record.join.reported(other) {
                let all_ok = outcome == BranchOutcome::Succeeded
                    && sibling == BranchOutcome::Succeeded;
                update = update.with_advance(if all_ok {
                    JobStatus::Analyzing
                } else {
                    JobStatus::Failed
                });
            }

            Some(update)
        })
        .await?;

        if record.join.both_reported() {
            info!(
                job_id = %job_id,
                status = %record.status,
                "join complete: both branches reported"
            );
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Briefing, Forecast, TrendDirection};
    use crate::store::InMemoryJobStore;

    fn forecast_patch() -> ResultPatch {
        ResultPatch::PredictionAnalysis(Forecast {
            summary: "upward trend".to_string(),
            trend: TrendDirection::Upward,
            projected_price: 110.0,
            horizon_days: 30,
            series: Vec::new(),
        })
    }

    fn briefing_patch() -> ResultPatch {
        ResultPatch::IntelligenceBriefing(Briefing::empty())
    }

    async fn store_with_fanned_out_job() -> (Arc<dyn JobStore>, Uuid) {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let job = store.create("ACME".to_string()).await.unwrap();
        // Walk the record to the fan-out phase.
        store
            .conditional_update(
                job.id,
                0,
                JobUpdate::default().with_advance(JobStatus::DataFetching),
            )
            .await
            .unwrap();
        store
            .conditional_update(
                job.id,
                1,
                JobUpdate::default().with_advance(JobStatus::IntelligenceGathering),
            )
            .await
            .unwrap();
        (store, job.id)
    }

    #[tokio::test]
    async fn first_branch_does_not_advance_status() {
        let (store, id) = store_with_fanned_out_job().await;
        let coordinator = Coordinator::new(Arc::clone(&store));

        let record = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::IntelligenceGathering);
        assert!(record.result.prediction_analysis.is_some());
        assert!(!record.join.both_reported());
    }

    #[tokio::test]
    async fn second_branch_advances_to_analyzing() {
        let (store, id) = store_with_fanned_out_job().await;
        let coordinator = Coordinator::new(Arc::clone(&store));

        coordinator
            .record_branch(
                id,
                JoinBranch::Intelligence,
                BranchOutcome::Succeeded,
                briefing_patch(),
            )
            .await
            .unwrap();
        let record = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Analyzing);
        assert!(record.result.intelligence_briefing.is_some());
        assert!(record.result.prediction_analysis.is_some());
    }

    #[tokio::test]
    async fn join_order_does_not_change_the_final_document() {
        let (store_a, id_a) = store_with_fanned_out_job().await;
        let coordinator_a = Coordinator::new(Arc::clone(&store_a));
        coordinator_a
            .record_branch(
                id_a,
                JoinBranch::Intelligence,
                BranchOutcome::Succeeded,
                briefing_patch(),
            )
            .await
            .unwrap();
        coordinator_a
            .record_branch(
                id_a,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        let (store_b, id_b) = store_with_fanned_out_job().await;
        let coordinator_b = Coordinator::new(Arc::clone(&store_b));
        coordinator_b
            .record_branch(
                id_b,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();
        coordinator_b
            .record_branch(
                id_b,
                JoinBranch::Intelligence,
                BranchOutcome::Succeeded,
                briefing_patch(),
            )
            .await
            .unwrap();

        let final_a = store_a.get(id_a).await.unwrap();
        let final_b = store_b.get(id_b).await.unwrap();
        assert_eq!(final_a.status, final_b.status);
        assert_eq!(final_a.result, final_b.result);
    }

    #[tokio::test]
    async fn early_failure_waits_for_the_sibling() {
        let (store, id) = store_with_fanned_out_job().await;
        let coordinator = Coordinator::new(Arc::clone(&store));

        let record = coordinator
            .record_branch(
                id,
                JoinBranch::Intelligence,
                BranchOutcome::Failed,
                ResultPatch::Error("intelligence gathering failed".to_string()),
            )
            .await
            .unwrap();
        // Still waiting on prediction: not failed yet.
        assert_eq!(record.status, JobStatus::IntelligenceGathering);

        let record = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        // The late sibling's output is preserved even though the job failed.
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.prediction_analysis.is_some());
        assert!(record.result.error.is_some());
    }

    #[tokio::test]
    async fn both_branches_failing_keeps_both_messages() {
        let (store, id) = store_with_fanned_out_job().await;
        let coordinator = Coordinator::new(Arc::clone(&store));

        coordinator
            .record_branch(
                id,
                JoinBranch::Intelligence,
                BranchOutcome::Failed,
                ResultPatch::Error("intelligence failed".to_string()),
            )
            .await
            .unwrap();
        let record = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Failed,
                ResultPatch::Error("prediction failed".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Failed);
        let error = record.result.error.unwrap();
        assert!(error.contains("intelligence failed"));
        assert!(error.contains("prediction failed"));
    }

    #[tokio::test]
    async fn redelivered_branch_report_is_idempotent() {
        let (store, id) = store_with_fanned_out_job().await;
        let coordinator = Coordinator::new(Arc::clone(&store));

        coordinator
            .record_branch(
                id,
                JoinBranch::Intelligence,
                BranchOutcome::Succeeded,
                briefing_patch(),
            )
            .await
            .unwrap();
        let after_join = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        // The prediction branch is delivered a second time.
        let after_redelivery = coordinator
            .record_branch(
                id,
                JoinBranch::Prediction,
                BranchOutcome::Succeeded,
                forecast_patch(),
            )
            .await
            .unwrap();

        assert_eq!(after_redelivery.status, after_join.status);
        assert_eq!(after_redelivery.result, after_join.result);
    }
}
