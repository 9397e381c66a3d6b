use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use tracing::info;

use super::{ForecastProvider, ProviderError};
use crate::models::{Forecast, ForecastPoint, TrendDirection};

/// Daily close-price point fed into the forecaster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Source of daily close history for a ticker.
#[async_trait]
pub trait PriceHistory: Send + Sync {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError>;
}

const MIN_HISTORY_POINTS: usize = 10;

/// Statistical forecast provider: projects the close-price series forward
/// with an ensemble of linear regression, double exponential smoothing and
/// moving average, weighted 40/40/20, with the widest bounds of the three.
pub struct StatForecastProvider {
    history: Arc<dyn PriceHistory>,
    lookback_days: u32,
    horizon_days: i32,
}

impl StatForecastProvider {
    pub fn new(history: Arc<dyn PriceHistory>) -> Self {
        Self {
            history,
            lookback_days: 365,
            horizon_days: 30,
        }
    }
}

#[async_trait]
impl ForecastProvider for StatForecastProvider {
    async fn fetch(&self, ticker: &str) -> Result<Forecast, ProviderError> {
        info!(ticker, horizon_days = self.horizon_days, "generating forecast");

        let history = self
            .history
            .fetch_daily_history(ticker, self.lookback_days)
            .await?;

        if history.len() < MIN_HISTORY_POINTS {
            return Err(ProviderError::BadResponse(format!(
                "insufficient history for {}: {} points, need at least {}",
                ticker,
                history.len(),
                MIN_HISTORY_POINTS
            )));
        }

        Ok(build_forecast(&history, self.horizon_days))
    }
}

/// Ensemble projection over a close-price series. `history` must hold at
/// least [`MIN_HISTORY_POINTS`] points in ascending date order.
pub fn build_forecast(history: &[HistoryPoint], horizon_days: i32) -> Forecast {
    let closes: Vec<f64> = history.iter().map(|p| p.close).collect();
    let last_date = history.last().map(|p| p.date).unwrap_or_default();
    let current_price = *closes.last().unwrap_or(&0.0);

    let series = ensemble_points(&closes, last_date, horizon_days);

    let projected_price = series
        .last()
        .map(|p| p.predicted)
        .unwrap_or(current_price);

    let change_percent = if current_price > 0.0 {
        (projected_price - current_price) / current_price * 100.0
    } else {
        0.0
    };

    let trend = if change_percent > 0.1 {
        TrendDirection::Upward
    } else if change_percent < -0.1 {
        TrendDirection::Downward
    } else {
        TrendDirection::Flat
    };

    let summary = format!(
        "The model projects a {} trend over the next {} days. \
         Current price: {:.2}, projected price in {} days: {:.2} ({:+.2}% change).",
        trend, horizon_days, current_price, horizon_days, projected_price, change_percent
    );

    Forecast {
        summary,
        trend,
        projected_price,
        horizon_days,
        series,
    }
}

fn ensemble_points(closes: &[f64], last_date: NaiveDate, horizon_days: i32) -> Vec<ForecastPoint> {
    let linear = linear_regression_points(closes, last_date, horizon_days);
    let exponential = exponential_smoothing_points(closes, last_date, horizon_days);
    let moving_avg = moving_average_points(closes, last_date, horizon_days);

    let mut points = Vec::with_capacity(horizon_days as usize);
    for i in 0..horizon_days as usize {
        let predicted = linear[i].predicted * 0.4
            + exponential[i].predicted * 0.4
            + moving_avg[i].predicted * 0.2;
        let lower = linear[i]
            .lower
            .min(exponential[i].lower)
            .min(moving_avg[i].lower);
        let upper = linear[i]
            .upper
            .max(exponential[i].upper)
            .max(moving_avg[i].upper);

        points.push(ForecastPoint {
            date: linear[i].date,
            predicted: predicted.max(0.0),
            lower: lower.max(0.0),
            upper,
        });
    }
    points
}

fn linear_regression_points(
    closes: &[f64],
    last_date: NaiveDate,
    horizon_days: i32,
) -> Vec<ForecastPoint> {
    let n = closes.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = closes.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in closes.iter().enumerate() {
        let x = i as f64;
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }
    let slope = if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    };
    let intercept = y_mean - slope * x_mean;

    let mut sum_squared_residuals = 0.0;
    for (i, &y) in closes.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        sum_squared_residuals += (y - predicted).powi(2);
    }
    let std_error = (sum_squared_residuals / (n - 2.0).max(1.0)).sqrt();

    (1..=horizon_days)
        .map(|day| {
            let x = n + day as f64 - 1.0;
            let predicted = slope * x + intercept;
            // Confidence widens with the forecast horizon.
            let confidence = 1.96 * std_error * (1.0 + day as f64 / horizon_days as f64);
            ForecastPoint {
                date: last_date + Duration::days(i64::from(day)),
                predicted: predicted.max(0.0),
                lower: (predicted - confidence).max(0.0),
                upper: predicted + confidence,
            }
        })
        .collect()
}

fn exponential_smoothing_points(
    closes: &[f64],
    last_date: NaiveDate,
    horizon_days: i32,
) -> Vec<ForecastPoint> {
    // Holt's linear trend method.
    let alpha = 0.3;
    let beta = 0.1;

    let mut level = closes[0];
    let mut trend = closes[1] - closes[0];
    let mut residuals = Vec::with_capacity(closes.len());

    for &value in &closes[1..] {
        residuals.push(value - (level + trend));
        let prev_level = level;
        level = alpha * value + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
    }

    let std_dev = std_dev(&residuals);

    (1..=horizon_days)
        .map(|day| {
            let predicted = level + trend * f64::from(day);
            let confidence = 1.96 * std_dev * (f64::from(day) / horizon_days as f64).sqrt();
            ForecastPoint {
                date: last_date + Duration::days(i64::from(day)),
                predicted: predicted.max(0.0),
                lower: (predicted - confidence).max(0.0),
                upper: predicted + confidence,
            }
        })
        .collect()
}

fn moving_average_points(
    closes: &[f64],
    last_date: NaiveDate,
    horizon_days: i32,
) -> Vec<ForecastPoint> {
    let window = (closes.len() / 3).clamp(3, 10);

    let recent_avg: f64 = closes.iter().rev().take(window).sum::<f64>() / window as f64;
    let earlier: Vec<f64> = closes
        .iter()
        .rev()
        .skip(window)
        .take(window)
        .copied()
        .collect();
    let trend = if earlier.is_empty() {
        0.0
    } else {
        let earlier_avg = earlier.iter().sum::<f64>() / earlier.len() as f64;
        (recent_avg - earlier_avg) / window as f64
    };

    let volatility = std_dev(closes);

    (1..=horizon_days)
        .map(|day| {
            let predicted = recent_avg + trend * f64::from(day);
            let confidence = 1.96 * volatility * (f64::from(day) / horizon_days as f64).sqrt();
            ForecastPoint {
                date: last_date + Duration::days(i64::from(day)),
                predicted: predicted.max(0.0),
                lower: (predicted - confidence).max(0.0),
                upper: predicted + confidence,
            }
        })
        .collect()
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
