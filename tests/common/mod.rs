//! Scriptable mock providers shared by the pipeline integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use stockscope_backend::models::{
    AnalysisResult, Briefing, Forecast, Fundamentals, JobRecord, Report, Thesis, TrendDirection,
};
use stockscope_backend::pipeline::PipelineController;
use stockscope_backend::providers::{
    AdvisorSynthesizer, DataProvider, ForecastProvider, IntelligenceProvider, LlmAnalyst,
    ProviderError, ProviderSet,
};

pub fn acme_fundamentals() -> Fundamentals {
    Fundamentals::bare("ACME", "Acme Corp", 100.0)
}

pub fn upward_forecast() -> Forecast {
    Forecast {
        summary: "upward trend".to_string(),
        trend: TrendDirection::Upward,
        projected_price: 110.0,
        horizon_days: 30,
        series: Vec::new(),
    }
}

type DataScript = Box<dyn Fn(u32) -> Result<Fundamentals, ProviderError> + Send + Sync>;
type ForecastScript = Box<dyn Fn(u32) -> Result<Forecast, ProviderError> + Send + Sync>;

/// Data provider driven by a call-indexed script.
pub struct MockData {
    script: DataScript,
    calls: AtomicU32,
}

impl MockData {
    pub fn scripted(
        script: impl Fn(u32) -> Result<Fundamentals, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicU32::new(0),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::scripted(|_| Ok(acme_fundamentals()))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataProvider for MockData {
    async fn fetch(&self, _ticker: &str) -> Result<Fundamentals, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(call)
    }
}

/// Intelligence provider returning a fixed briefing after an optional delay.
pub struct MockIntelligence {
    pub delay: Duration,
    briefing: Briefing,
    calls: AtomicU32,
}

impl MockIntelligence {
    pub fn empty() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            briefing: Briefing::empty(),
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntelligenceProvider for MockIntelligence {
    async fn fetch(&self, _ticker: &str, _company_name: &str) -> Result<Briefing, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.briefing.clone())
    }
}

/// Forecast provider driven by a call-indexed script, after an optional
/// delay.
pub struct MockForecast {
    pub delay: Duration,
    script: ForecastScript,
    calls: AtomicU32,
}

impl MockForecast {
    pub fn scripted(
        delay: Duration,
        script: impl Fn(u32) -> Result<Forecast, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            delay,
            script: Box::new(script),
            calls: AtomicU32::new(0),
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::scripted(Duration::ZERO, |_| Ok(upward_forecast()))
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Self::scripted(delay, |_| Ok(upward_forecast()))
    }

    pub fn failing() -> Arc<Self> {
        Self::scripted(Duration::ZERO, |_| {
            Err(ProviderError::Inference(
                "forecast model rejected the series".to_string(),
            ))
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastProvider for MockForecast {
    async fn fetch(&self, _ticker: &str) -> Result<Forecast, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(call)
    }
}

pub struct MockAnalyst;

#[async_trait]
impl LlmAnalyst for MockAnalyst {
    async fn analyze(
        &self,
        ticker: &str,
        _company_name: &str,
        _briefing: &Briefing,
    ) -> Result<Report, ProviderError> {
        Ok(Report {
            text: format!("Coverage of {} is constructive.", ticker),
        })
    }
}

pub struct MockAdvisor;

#[async_trait]
impl AdvisorSynthesizer for MockAdvisor {
    async fn synthesize(&self, _result: &AnalysisResult) -> Result<Thesis, ProviderError> {
        Ok(Thesis {
            text: "Hold, pending clearer signals.".to_string(),
        })
    }
}

/// Bundle the mocks into a ProviderSet.
pub fn provider_set(
    data: Arc<MockData>,
    intelligence: Arc<MockIntelligence>,
    forecast: Arc<MockForecast>,
) -> ProviderSet {
    ProviderSet {
        data,
        intelligence,
        forecast,
        analyst: Arc::new(MockAnalyst),
        advisor: Arc::new(MockAdvisor),
    }
}

pub fn happy_providers() -> ProviderSet {
    provider_set(MockData::ok(), MockIntelligence::empty(), MockForecast::ok())
}

/// Poll the job until it reaches a terminal status, panicking after 5s.
pub async fn wait_for_terminal(pipeline: &PipelineController, id: Uuid) -> JobRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = pipeline.status(id).await.expect("job should exist");
        if record.status.is_terminal() {
            return record;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("job {} still {} after 5s", id, record.status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
