//! End-to-end pipeline scenarios against the in-memory job store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use stockscope_backend::errors::AppError;
use stockscope_backend::models::JobStatus;
use stockscope_backend::pipeline::{PipelineConfig, PipelineController, RetryPolicy};
use stockscope_backend::providers::{ProviderError, ProviderSet};
use stockscope_backend::store::{InMemoryJobStore, JobStore};

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        workers: 4,
        provider_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
    }
}

fn spawn_pipeline(providers: ProviderSet) -> (Arc<dyn JobStore>, Arc<PipelineController>) {
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let pipeline = PipelineController::spawn(Arc::clone(&store), providers, fast_config());
    (store, pipeline)
}

#[tokio::test(flavor = "multi_thread")]
async fn acme_end_to_end_reaches_success_with_all_sub_keys() {
    let (_store, pipeline) = spawn_pipeline(happy_providers());

    let submitted = pipeline.submit("ACME").await.unwrap();
    assert_eq!(submitted.ticker, "ACME");
    assert_eq!(submitted.status, JobStatus::DataFetching);

    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Success);
    let result = finished.result;
    assert!(result.error.is_none());

    let fundamentals = result.fundamentals.expect("fundamentals committed");
    assert_eq!(fundamentals.company_name, "Acme Corp");
    assert_eq!(fundamentals.current_price, 100.0);

    let briefing = result.intelligence_briefing.expect("briefing committed");
    assert!(briefing.articles.is_empty());
    assert_eq!(briefing.summary.total, 0);

    let forecast = result.prediction_analysis.expect("forecast committed");
    assert_eq!(forecast.summary, "upward trend");

    assert!(!result.llm_analysis.expect("report committed").text.is_empty());
    assert!(!result.advisor_summary.expect("thesis committed").text.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_ticker_fails_after_the_data_stage_alone() {
    let data = MockData::scripted(|_| {
        Err(ProviderError::InvalidTicker("ZZZZINVALID".to_string()))
    });
    let intelligence = MockIntelligence::empty();
    let forecast = MockForecast::ok();
    let providers = provider_set(Arc::clone(&data), Arc::clone(&intelligence), Arc::clone(&forecast));
    let (_store, pipeline) = spawn_pipeline(providers);

    let submitted = pipeline.submit("ZZZZINVALID").await.unwrap();
    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    let error = finished.result.error.clone().expect("error recorded");
    assert!(error.contains("ZZZZINVALID"));
    assert!(finished.result.fundamentals.is_none());
    assert!(finished.result.intelligence_briefing.is_none());
    assert!(finished.result.prediction_analysis.is_none());
    assert!(finished.result.llm_analysis.is_none());
    assert!(finished.result.advisor_summary.is_none());

    // Only the data stage ran.
    assert_eq!(data.calls(), 1);
    assert_eq!(intelligence.calls(), 0);
    assert_eq!(forecast.calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn prediction_failure_preserves_the_partial_result() {
    let providers = provider_set(MockData::ok(), MockIntelligence::empty(), MockForecast::failing());
    let (_store, pipeline) = spawn_pipeline(providers);

    let submitted = pipeline.submit("ACME").await.unwrap();
    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert!(finished.result.fundamentals.is_some());
    assert!(finished.result.intelligence_briefing.is_some());
    assert!(finished.result.prediction_analysis.is_none());
    assert!(finished.result.llm_analysis.is_none());

    let error = finished.result.error.expect("error recorded");
    assert!(error.contains("ACME"));
    assert!(error.contains("Details:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn join_order_does_not_change_the_final_document() {
    // Intelligence finishes first...
    let providers_a = provider_set(
        MockData::ok(),
        MockIntelligence::with_delay(Duration::ZERO),
        MockForecast::with_delay(Duration::from_millis(80)),
    );
    let (_store_a, pipeline_a) = spawn_pipeline(providers_a);
    let job_a = pipeline_a.submit("ACME").await.unwrap();
    let final_a = wait_for_terminal(&pipeline_a, job_a.id).await;

    // ...and the reverse.
    let providers_b = provider_set(
        MockData::ok(),
        MockIntelligence::with_delay(Duration::from_millis(80)),
        MockForecast::with_delay(Duration::ZERO),
    );
    let (_store_b, pipeline_b) = spawn_pipeline(providers_b);
    let job_b = pipeline_b.submit("ACME").await.unwrap();
    let final_b = wait_for_terminal(&pipeline_b, job_b.id).await;

    assert_eq!(final_a.status, JobStatus::Success);
    assert_eq!(final_a.status, final_b.status);
    assert_eq!(final_a.result, final_b.result);
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_branch_completion_converges() {
    let providers = provider_set(
        MockData::ok(),
        MockIntelligence::with_delay(Duration::from_millis(20)),
        MockForecast::with_delay(Duration::from_millis(20)),
    );
    let (_store, pipeline) = spawn_pipeline(providers);

    let submitted = pipeline.submit("ACME").await.unwrap();
    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Success);
    assert!(finished.result.intelligence_briefing.is_some());
    assert!(finished.result.prediction_analysis.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_data_failures_are_redelivered_until_success() {
    let data = MockData::scripted(|call| {
        if call < 2 {
            Err(ProviderError::Unavailable("quote source down".to_string()))
        } else {
            Ok(acme_fundamentals())
        }
    });
    let providers = provider_set(Arc::clone(&data), MockIntelligence::empty(), MockForecast::ok());
    let (_store, pipeline) = spawn_pipeline(providers);

    let submitted = pipeline.submit("ACME").await.unwrap();
    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Success);
    assert_eq!(data.calls(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_transient_failures_fail_the_job() {
    let data = MockData::scripted(|_| {
        Err(ProviderError::Unavailable("quote source down".to_string()))
    });
    let providers = provider_set(Arc::clone(&data), MockIntelligence::empty(), MockForecast::ok());
    let (_store, pipeline) = spawn_pipeline(providers);

    let submitted = pipeline.submit("ACME").await.unwrap();
    let finished = wait_for_terminal(&pipeline, submitted.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert!(finished.result.error.is_some());
    // One delivery per allowed attempt, no more.
    assert_eq!(data.calls(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn observed_status_sequence_is_monotone() {
    fn rank(status: JobStatus) -> u8 {
        match status {
            JobStatus::Pending => 0,
            JobStatus::DataFetching => 1,
            JobStatus::IntelligenceGathering => 2,
            JobStatus::Predicting => 3,
            JobStatus::Analyzing => 4,
            JobStatus::Summarizing => 5,
            JobStatus::Success | JobStatus::Failed => 6,
        }
    }

    let providers = provider_set(
        MockData::ok(),
        MockIntelligence::with_delay(Duration::from_millis(30)),
        MockForecast::with_delay(Duration::from_millis(30)),
    );
    let (_store, pipeline) = spawn_pipeline(providers);
    let submitted = pipeline.submit("ACME").await.unwrap();

    let mut observed = vec![submitted.status];
    loop {
        let record = pipeline.status(submitted.id).await.unwrap();
        if observed.last() != Some(&record.status) {
            observed.push(record.status);
        }
        if record.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    for pair in observed.windows(2) {
        assert!(
            rank(pair[0]) < rank(pair[1]),
            "status went from {} to {}",
            pair[0],
            pair[1]
        );
    }
    assert_eq!(observed.last(), Some(&JobStatus::Success));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_jobs_do_not_interfere() {
    let (_store, pipeline) = spawn_pipeline(happy_providers());

    let mut ids = Vec::new();
    for ticker in ["AAA", "BBB", "CCC", "DDD", "EEE"] {
        ids.push(pipeline.submit(ticker).await.unwrap().id);
    }

    for id in ids {
        let finished = wait_for_terminal(&pipeline, id).await;
        assert_eq!(finished.status, JobStatus::Success);
        assert!(finished.result.fundamentals.is_some());
        assert!(finished.result.advisor_summary.is_some());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn recent_jobs_lists_newest_first() {
    let (_store, pipeline) = spawn_pipeline(happy_providers());

    let first = pipeline.submit("AAA").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = pipeline.submit("BBB").await.unwrap();

    let recent = pipeline.recent(20).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, second.id);
    assert_eq!(recent[1].id, first.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_tickers_are_rejected_at_submit() {
    let (_store, pipeline) = spawn_pipeline(happy_providers());

    for bad in ["", "   ", "AC ME", "toolongsymbol!", "..."] {
        match pipeline.submit(bad).await {
            Err(AppError::Validation(_)) => {}
            other => panic!("expected validation error for {:?}, got {:?}", bad, other.map(|r| r.status)),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn submitted_tickers_are_normalized() {
    let (_store, pipeline) = spawn_pipeline(happy_providers());

    let record = pipeline.submit(" acme ").await.unwrap();
    assert_eq!(record.ticker, "ACME");
}
