use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{IntelligenceProvider, ProviderError};
use crate::models::{Briefing, BriefingArticle};
use crate::services::SentimentClassifier;

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub max_articles: usize,
}

impl NewsConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("NEWS_API_KEY").ok(),
            max_articles: std::env::var("NEWS_MAX_ARTICLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
        }
    }
}

/// News intelligence adapter: searches a Serper-style news endpoint for the
/// company and classifies each headline with the injected sentiment
/// classifier. Without an API key it degrades to an empty briefing so the
/// pipeline can still complete.
pub struct NewsIntelligenceProvider {
    client: reqwest::Client,
    config: NewsConfig,
    classifier: Arc<dyn SentimentClassifier>,
}

impl NewsIntelligenceProvider {
    pub fn new(config: NewsConfig, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            classifier,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    news: Option<Vec<SerperNewsItem>>,
}

#[derive(Debug, Deserialize)]
struct SerperNewsItem {
    title: String,
    link: String,
    source: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl IntelligenceProvider for NewsIntelligenceProvider {
    async fn fetch(&self, ticker: &str, company_name: &str) -> Result<Briefing, ProviderError> {
        let api_key = match &self.config.api_key {
            Some(key) => key,
            None => {
                warn!(ticker, "NEWS_API_KEY not set, returning empty briefing");
                return Ok(Briefing::empty());
            }
        };

        let query = format!("{} stock", company_name);
        info!(ticker, %query, "fetching news briefing");

        let request_body = serde_json::json!({
            "q": query,
            "type": "news",
            "num": self.config.max_articles.min(100),
        });

        let response = self
            .client
            .post("https://google.serper.dev/news")
            .header("X-API-KEY", api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("news API error: {}", e)))?;

        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ProviderError::BadResponse(format!(
                "news API returned HTTP {}",
                response.status()
            )));
        }

        let serper: SerperResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(format!("malformed news response: {}", e)))?;

        let articles: Vec<BriefingArticle> = serper
            .news
            .unwrap_or_default()
            .into_iter()
            .take(self.config.max_articles)
            .map(|item| {
                let classified = self
                    .classifier
                    .classify(&format!("{} {}", item.title, item.snippet));
                BriefingArticle {
                    title: item.title,
                    url: item.link,
                    source: item.source,
                    sentiment: classified.sentiment,
                    score: classified.score,
                }
            })
            .collect();

        let briefing = Briefing::from_articles(articles);
        info!(
            ticker,
            total = briefing.summary.total,
            positive = briefing.summary.positive,
            negative = briefing.summary.negative,
            "news briefing assembled"
        );
        Ok(briefing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LexiconClassifier;

    #[tokio::test]
    async fn missing_api_key_degrades_to_empty_briefing() {
        let provider = NewsIntelligenceProvider::new(
            NewsConfig {
                api_key: None,
                max_articles: 8,
            },
            Arc::new(LexiconClassifier::new()),
        );

        let briefing = provider.fetch("ACME", "Acme Corp").await.unwrap();
        assert!(briefing.articles.is_empty());
        assert_eq!(briefing.summary.total, 0);
    }
}
