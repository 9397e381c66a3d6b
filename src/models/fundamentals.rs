use serde::{Deserialize, Serialize};

/// Company fundamentals produced by the data stage.
///
/// Only `ticker`, `company_name` and `current_price` are guaranteed; the
/// remaining fields depend on what the quote source returns for the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub ticker: String,
    pub company_name: String,
    pub current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pb_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl Fundamentals {
    /// Minimal record used when the quote source only resolves price data.
    pub fn bare(ticker: &str, company_name: &str, current_price: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: company_name.to_string(),
            current_price,
            previous_close: None,
            market_cap: None,
            pe_ratio: None,
            pb_ratio: None,
            dividend_yield: None,
            sector: None,
            industry: None,
            summary: None,
            website: None,
        }
    }
}
