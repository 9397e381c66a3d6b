pub mod forecast;
pub mod news;
pub mod openai;
pub mod yahoo;

pub use forecast::StatForecastProvider;
pub use news::NewsIntelligenceProvider;
pub use openai::{OpenAiClient, OpenAiConfig};
pub use yahoo::{YahooDataProvider, YahooHistoryClient};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{AnalysisResult, Briefing, Forecast, Fundamentals, Report, Thesis};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid ticker: {0}")]
    InvalidTicker(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("model inference error: {0}")]
    Inference(String),
}

/// Resolves a ticker to company fundamentals.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<Fundamentals, ProviderError>;
}

/// Gathers recent news for a company and classifies per-item sentiment.
#[async_trait]
pub trait IntelligenceProvider: Send + Sync {
    async fn fetch(&self, ticker: &str, company_name: &str) -> Result<Briefing, ProviderError>;
}

/// Produces a time-series forecast from the ticker's price history.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<Forecast, ProviderError>;
}

/// Writes a narrative analyst report from fundamentals and the briefing.
#[async_trait]
pub trait LlmAnalyst: Send + Sync {
    async fn analyze(
        &self,
        ticker: &str,
        company_name: &str,
        briefing: &Briefing,
    ) -> Result<Report, ProviderError>;
}

/// Synthesizes the final investment thesis from the accumulated result.
#[async_trait]
pub trait AdvisorSynthesizer: Send + Sync {
    async fn synthesize(&self, result: &AnalysisResult) -> Result<Thesis, ProviderError>;
}

/// The full set of provider adapters the pipeline runs against.
#[derive(Clone)]
pub struct ProviderSet {
    pub data: Arc<dyn DataProvider>,
    pub intelligence: Arc<dyn IntelligenceProvider>,
    pub forecast: Arc<dyn ForecastProvider>,
    pub analyst: Arc<dyn LlmAnalyst>,
    pub advisor: Arc<dyn AdvisorSynthesizer>,
}
