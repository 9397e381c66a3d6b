use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of the projected price move over the forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Upward,
    Downward,
    Flat,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Upward => write!(f, "upward"),
            TrendDirection::Downward => write!(f, "downward"),
            TrendDirection::Flat => write!(f, "flat"),
        }
    }
}

/// One projected point with its confidence band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Time-series forecast produced by the prediction stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub summary: String,
    pub trend: TrendDirection,
    pub projected_price: f64,
    pub horizon_days: i32,
    pub series: Vec<ForecastPoint>,
}
