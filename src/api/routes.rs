use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::api::error::ApiError;
use crate::service::StatsService;
use crate::types::PriceSeries;

// ── Query params ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AverageQuery {
    minutes: Option<String>,
    aggregation: Option<String>,
}

// ── Response bodies ──────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageResponse {
    average_stock_price: f64,
    price_history: PriceSeries,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    average_price: f64,
    price_history: PriceSeries,
}

#[derive(Debug, Serialize)]
pub struct CorrelationResponse {
    correlation: f64,
    stocks: HashMap<String, StockSummary>,
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn router(service: Arc<StatsService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/stocks/{ticker}", get(stock_average))
        .route("/stockcorrelation", get(stock_correlation))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Stock Price Aggregation Microservice",
        "endpoints": [
            "/stocks/:ticker?minutes=m&aggregation=average",
            "/stockcorrelation?minutes=m&ticker=TICKER1&ticker=TICKER2",
            "/health"
        ]
    }))
}

async fn health(State(service): State<Arc<StatsService>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "authenticated": service.is_authenticated().await,
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn stock_average(
    State(service): State<Arc<StatsService>>,
    Path(ticker): Path<String>,
    Query(q): Query<AverageQuery>,
) -> Result<Json<AverageResponse>, ApiError> {
    let minutes = require_minutes(q.minutes.as_deref())?;

    let aggregation = q.aggregation.as_deref().unwrap_or("average");
    if aggregation != "average" {
        return Err(ApiError::BadRequest("Only average aggregation is supported".to_string()));
    }

    let report = service.get_average(&ticker, minutes).await?;

    Ok(Json(AverageResponse {
        average_stock_price: report.average,
        price_history: report.series,
    }))
}

async fn stock_correlation(
    State(service): State<Arc<StatsService>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<CorrelationResponse>, ApiError> {
    let minutes = require_minutes(
        params
            .iter()
            .find(|(k, _)| k == "minutes")
            .map(|(_, v)| v.as_str()),
    )?;

    let tickers: Vec<&str> = params
        .iter()
        .filter(|(k, _)| k == "ticker")
        .map(|(_, v)| v.as_str())
        .collect();

    let (first, second) = match tickers.as_slice() {
        [a, b] if a == b => {
            return Err(ApiError::BadRequest("Tickers must be distinct".to_string()));
        }
        [a, b] => (*a, *b),
        _ => return Err(ApiError::BadRequest("Exactly two tickers are required".to_string())),
    };

    let report = service.get_correlation(first, second, minutes).await?;

    let stocks = [report.first, report.second]
        .into_iter()
        .map(|s| {
            (
                s.ticker,
                StockSummary {
                    average_price: s.average,
                    price_history: s.series,
                },
            )
        })
        .collect();

    Ok(Json(CorrelationResponse {
        correlation: report.correlation,
        stocks,
    }))
}

fn require_minutes(raw: Option<&str>) -> Result<NonZeroU32, ApiError> {
    parse_minutes(raw)
        .ok_or_else(|| ApiError::BadRequest("Minutes parameter is required".to_string()))
}

/// Leading-integer parse: `"15"` and `"15m"` give 15; empty, non-numeric,
/// zero and negative values give `None`.
fn parse_minutes(raw: Option<&str>) -> Option<NonZeroU32> {
    let s = raw?.trim_start();
    if s.starts_with('-') {
        return None;
    }
    let digits = s.strip_prefix('+').unwrap_or(s);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<u32>().ok().and_then(NonZeroU32::new)
}
