use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;

use super::forecast::{HistoryPoint, PriceHistory};
use super::{DataProvider, ProviderError};
use crate::models::Fundamentals;

const QUOTE_SUMMARY_URL: &str = "https://query1.finance.yahoo.com/v10/finance/quoteSummary";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (compatible; Stockscope/0.1)")
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Yahoo Finance quote-summary adapter. Free, no API key required.
pub struct YahooDataProvider {
    client: reqwest::Client,
}

impl YahooDataProvider {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for YahooDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooApiError {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfileModule>,
    #[serde(rename = "defaultKeyStatistics")]
    key_statistics: Option<KeyStatisticsModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<RawValue>,
    #[serde(rename = "regularMarketPreviousClose")]
    regular_market_previous_close: Option<RawValue>,
    #[serde(rename = "marketCap")]
    market_cap: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetailModule {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    #[serde(rename = "dividendYield")]
    dividend_yield: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AssetProfileModule {
    sector: Option<String>,
    industry: Option<String>,
    #[serde(rename = "longBusinessSummary")]
    long_business_summary: Option<String>,
    website: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "priceToBook")]
    price_to_book: Option<RawValue>,
}

/// Yahoo wraps numerics as `{raw, fmt}`.
#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[async_trait]
impl DataProvider for YahooDataProvider {
    async fn fetch(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[(
                "modules",
                "price,summaryDetail,assetProfile,defaultKeyStatistics",
            )])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        match resp.status().as_u16() {
            404 => return Err(ProviderError::InvalidTicker(ticker.to_string())),
            429 => return Err(ProviderError::RateLimited),
            s if !resp.status().is_success() => {
                return Err(ProviderError::BadResponse(format!("HTTP {}", s)))
            }
            _ => {}
        }

        let body: QuoteSummaryResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;

        if let Some(error) = body.quote_summary.error {
            let description = error.description.unwrap_or_default();
            if description.contains("Quote not found") {
                return Err(ProviderError::InvalidTicker(ticker.to_string()));
            }
            return Err(ProviderError::BadResponse(description));
        }

        let result = body
            .quote_summary
            .result
            .and_then(|mut r| (!r.is_empty()).then(|| r.remove(0)))
            .ok_or_else(|| ProviderError::InvalidTicker(ticker.to_string()))?;

        let price = result
            .price
            .ok_or_else(|| ProviderError::InvalidTicker(ticker.to_string()))?;

        // No market price means the symbol does not resolve to a listed stock.
        let current_price = raw(&price.regular_market_price)
            .ok_or_else(|| ProviderError::InvalidTicker(ticker.to_string()))?;

        let company_name = price
            .long_name
            .or(price.short_name)
            .unwrap_or_else(|| ticker.to_string());

        let profile = result.asset_profile;
        let detail = result.summary_detail;

        Ok(Fundamentals {
            ticker: ticker.to_string(),
            company_name,
            current_price,
            previous_close: raw(&price.regular_market_previous_close),
            market_cap: raw(&price.market_cap),
            pe_ratio: detail.as_ref().and_then(|d| raw(&d.trailing_pe)),
            pb_ratio: result
                .key_statistics
                .as_ref()
                .and_then(|k| raw(&k.price_to_book)),
            dividend_yield: detail.as_ref().and_then(|d| raw(&d.dividend_yield)),
            sector: profile.as_ref().and_then(|p| p.sector.clone()),
            industry: profile.as_ref().and_then(|p| p.industry.clone()),
            summary: profile.as_ref().and_then(|p| p.long_business_summary.clone()),
            website: profile.as_ref().and_then(|p| p.website.clone()),
        })
    }
}

/// Yahoo Finance v8 chart adapter supplying daily close history to the
/// forecast provider.
pub struct YahooHistoryClient {
    client: reqwest::Client,
}

impl YahooHistoryClient {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }
}

impl Default for YahooHistoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
    error: Option<YahooApiError>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    close: Vec<Option<f64>>,
}

#[async_trait]
impl PriceHistory for YahooHistoryClient {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError> {
        let url = format!("{}/{}", CHART_URL, ticker);

        // Yahoo ranges: "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y".
        let range = if days <= 5 {
            "5d"
        } else if days <= 30 {
            "1mo"
        } else if days <= 90 {
            "3mo"
        } else if days <= 180 {
            "6mo"
        } else if days <= 365 {
            "1y"
        } else {
            "2y"
        };

        let resp = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", range)])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        match resp.status().as_u16() {
            404 => return Err(ProviderError::InvalidTicker(ticker.to_string())),
            429 => return Err(ProviderError::RateLimited),
            s if !resp.status().is_success() => {
                return Err(ProviderError::BadResponse(format!("HTTP {}", s)))
            }
            _ => {}
        }

        let body: YahooChartResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))?;

        if let Some(error) = body.chart.error {
            let description = error.description.unwrap_or_default();
            if description.contains("No data found") {
                return Err(ProviderError::InvalidTicker(ticker.to_string()));
            }
            return Err(ProviderError::BadResponse(description));
        }

        let results = body
            .chart
            .result
            .ok_or_else(|| ProviderError::BadResponse("no results in response".to_string()))?;
        let result = results
            .first()
            .ok_or_else(|| ProviderError::InvalidTicker(ticker.to_string()))?;
        let closes = result
            .indicators
            .quote
            .first()
            .ok_or_else(|| ProviderError::BadResponse("no quote data in response".to_string()))?;

        if result.timestamp.len() != closes.close.len() {
            return Err(ProviderError::BadResponse(
                "timestamp and close arrays have different lengths".to_string(),
            ));
        }

        let mut points = Vec::with_capacity(result.timestamp.len());
        for (ts, close) in result.timestamp.iter().zip(closes.close.iter()) {
            if let (Some(date), Some(close)) = (DateTime::from_timestamp(*ts, 0), close) {
                points.push(HistoryPoint {
                    date: date.date_naive(),
                    close: *close,
                });
            }
        }

        Ok(points)
    }
}
