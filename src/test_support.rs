//! Stub provider adapters for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::models::{
    AnalysisResult, Briefing, Forecast, Fundamentals, Report, Thesis, TrendDirection,
};
use crate::providers::{
    AdvisorSynthesizer, DataProvider, ForecastProvider, IntelligenceProvider, LlmAnalyst,
    ProviderError, ProviderSet,
};

#[derive(Clone, Copy)]
enum DataMode {
    Happy,
    InvalidTicker,
    Unavailable,
}

/// Configurable provider bundle: the data stage behavior varies, the rest
/// answer with fixed happy-path values.
pub struct StubData {
    mode: DataMode,
    pub intelligence_queries: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubData {
    pub fn happy() -> Self {
        Self {
            mode: DataMode::Happy,
            intelligence_queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invalid_ticker() -> Self {
        Self {
            mode: DataMode::InvalidTicker,
            ..Self::happy()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: DataMode::Unavailable,
            ..Self::happy()
        }
    }
}

struct StubDataProvider {
    mode: DataMode,
}

#[async_trait]
impl DataProvider for StubDataProvider {
    async fn fetch(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        match self.mode {
            DataMode::Happy => Ok(Fundamentals::bare(ticker, "Acme Corp", 100.0)),
            DataMode::InvalidTicker => Err(ProviderError::InvalidTicker(ticker.to_string())),
            DataMode::Unavailable => {
                Err(ProviderError::Unavailable("quote source down".to_string()))
            }
        }
    }
}

struct StubIntelligenceProvider {
    queries: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl IntelligenceProvider for StubIntelligenceProvider {
    async fn fetch(&self, ticker: &str, company_name: &str) -> Result<Briefing, ProviderError> {
        self.queries
            .lock()
            .push((ticker.to_string(), company_name.to_string()));
        Ok(Briefing::empty())
    }
}

struct StubForecastProvider;

#[async_trait]
impl ForecastProvider for StubForecastProvider {
    async fn fetch(&self, _ticker: &str) -> Result<Forecast, ProviderError> {
        Ok(Forecast {
            summary: "upward trend".to_string(),
            trend: TrendDirection::Upward,
            projected_price: 110.0,
            horizon_days: 30,
            series: Vec::new(),
        })
    }
}

struct StubAnalyst;

#[async_trait]
impl LlmAnalyst for StubAnalyst {
    async fn analyze(
        &self,
        ticker: &str,
        _company_name: &str,
        _briefing: &Briefing,
    ) -> Result<Report, ProviderError> {
        Ok(Report {
            text: format!("Narrative analysis for {}.", ticker),
        })
    }
}

struct StubAdvisor;

#[async_trait]
impl AdvisorSynthesizer for StubAdvisor {
    async fn synthesize(&self, _result: &AnalysisResult) -> Result<Thesis, ProviderError> {
        Ok(Thesis {
            text: "Hold, pending clearer signals.".to_string(),
        })
    }
}

pub fn providers_with(stub: StubData) -> ProviderSet {
    ProviderSet {
        data: Arc::new(StubDataProvider { mode: stub.mode }),
        intelligence: Arc::new(StubIntelligenceProvider {
            queries: stub.intelligence_queries,
        }),
        forecast: Arc::new(StubForecastProvider),
        analyst: Arc::new(StubAnalyst),
        advisor: Arc::new(StubAdvisor),
    }
}
