use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AdvisorSynthesizer, LlmAnalyst, ProviderError};
use crate::models::{AnalysisResult, Briefing, Report, Thesis};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 800,
            temperature: 0.3,
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("LLM_MODEL").unwrap_or(defaults.model),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }
}

/// OpenAI chat-completions client backing both narrative stages.
///
/// Transient HTTP failures surface as retryable provider errors; redelivery
/// is owned by the pipeline's queue layer, so there is no retry loop here.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

const SYSTEM_PROMPT: &str = "You are a sharp, concise senior financial analyst. \
    Analyze the provided data objectively. Do not offer financial advice.";

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    async fn complete(&self, prompt: String) -> Result<String, ProviderError> {
        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            ProviderError::Inference("LLM disabled: OPENAI_API_KEY not set".to_string())
        })?;

        info!(model = %self.config.model, "requesting LLM completion");

        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Unavailable("LLM request timed out".to_string())
                } else {
                    ProviderError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Inference(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;

        if let Some(usage) = &body.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "LLM completion generated"
            );
        }

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Inference("LLM returned an empty completion".to_string())
            })?;

        Ok(content)
    }
}

fn headline_lines(briefing: &Briefing, limit: usize) -> String {
    if briefing.articles.is_empty() {
        return "No recent news articles found.".to_string();
    }
    briefing
        .articles
        .iter()
        .take(limit)
        .map(|a| format!("- {} (Source: {}, Sentiment: {})", a.title, a.source, a.sentiment))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_analysis_prompt(ticker: &str, company_name: &str, briefing: &Briefing) -> String {
    format!(
        r#"Provide a comprehensive analysis of the stock {ticker} ({company_name}).

**Recent News Headlines & Sentiment:**
{news}

Aggregate sentiment: {positive} positive, {negative} negative, {neutral} neutral of {total} articles.

**Your Analysis (in Markdown format):**
**1. News Digest:** 2-3 sentences on what the recent coverage says about the company.
**2. Sentiment Read:** How the sentiment mix should be interpreted, in 2 sentences.
**3. Key Risks and Catalysts:** 2-3 bullet points each.
If news coverage is limited, say so and base the analysis on general market context."#,
        ticker = ticker,
        company_name = company_name,
        news = headline_lines(briefing, 10),
        positive = briefing.summary.positive,
        negative = briefing.summary.negative,
        neutral = briefing.summary.neutral,
        total = briefing.summary.total,
    )
}

fn build_thesis_prompt(result: &AnalysisResult) -> String {
    let fundamentals_summary = match &result.fundamentals {
        Some(f) => {
            let pe = f
                .pe_ratio
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                "Company: {}\nCurrent Price: {}\nMarket Cap: {}\nP/E Ratio: {}\nSector: {}",
                f.company_name,
                f.current_price,
                f.market_cap
                    .map(|v| format!("{:.0}", v))
                    .unwrap_or_else(|| "N/A".to_string()),
                pe,
                f.sector.clone().unwrap_or_else(|| "N/A".to_string()),
            )
        }
        None => "No fundamentals available.".to_string(),
    };

    let prediction_summary = result
        .prediction_analysis
        .as_ref()
        .map(|p| p.summary.clone())
        .unwrap_or_else(|| "No prediction summary available.".to_string());

    let news_summary = result
        .intelligence_briefing
        .as_ref()
        .map(|b| headline_lines(b, 5))
        .unwrap_or_else(|| "No news briefing available.".to_string());

    let analyst_view = result
        .llm_analysis
        .as_ref()
        .map(|r| r.text.clone())
        .unwrap_or_else(|| "No analyst report available.".to_string());

    format!(
        r#"Provide a clear investment thesis based on the data below.

**Data Overview:**
- **Fundamentals:**
{fundamentals}
- **Quantitative Forecast:** {prediction}
- **Recent News Headlines & Sentiment:**
{news}
- **Analyst Report:**
{analyst}

**Your Thesis (in Markdown format):**
**1. Executive Summary:** A 2-sentence summary of the company's current situation.
**2. Bull Case:** 2-3 bullet points on the positive signals from the data.
**3. Bear Case:** 2-3 bullet points on the primary risks or negative signals.
**4. Final Recommendation:** State ONE of: 'Strong Buy', 'Buy', 'Hold', 'Sell', or
'Strong Sell', with a 1-sentence justification based purely on the provided data."#,
        fundamentals = fundamentals_summary,
        prediction = prediction_summary,
        news = news_summary,
        analyst = analyst_view,
    )
}

#[async_trait]
impl LlmAnalyst for OpenAiClient {
    async fn analyze(
        &self,
        ticker: &str,
        company_name: &str,
        briefing: &Briefing,
    ) -> Result<Report, ProviderError> {
        let prompt = build_analysis_prompt(ticker, company_name, briefing);
        let text = self.complete(prompt).await?;
        Ok(Report { text })
    }
}

#[async_trait]
impl AdvisorSynthesizer for OpenAiClient {
    async fn synthesize(&self, result: &AnalysisResult) -> Result<Thesis, ProviderError> {
        let prompt = build_thesis_prompt(result);
        let text = self.complete(prompt).await?;
        Ok(Thesis { text })
    }
}
