/// Core type definitions for the stock statistics service
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price sample for a ticker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price: f64,
    pub last_updated_at: DateTime<Utc>,
}

impl PricePoint {
    pub fn new(price: f64, last_updated_at: DateTime<Utc>) -> Self {
        PricePoint {
            price,
            last_updated_at,
        }
    }
}

/// Price points of one ticker within one window, ascending by `last_updated_at`.
///
/// Shared rather than copied: a cache hit hands out the same allocation that
/// the original fetch produced.
pub type PriceSeries = Arc<[PricePoint]>;

/// Cache key for a fetch result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    pub ticker: String,
    pub minutes: Option<NonZeroU32>,
}

impl PriceKey {
    pub fn new(ticker: &str, minutes: Option<NonZeroU32>) -> Self {
        PriceKey {
            ticker: ticker.to_string(),
            minutes,
        }
    }
}

/// Result of a single-ticker average request
#[derive(Debug, Clone)]
pub struct AverageReport {
    pub average: f64,
    pub series: PriceSeries,
}

/// Average and series of one side of a correlation request
#[derive(Debug, Clone)]
pub struct TickerStats {
    pub ticker: String,
    pub average: f64,
    pub series: PriceSeries,
}

/// Result of a two-ticker correlation request
#[derive(Debug, Clone)]
pub struct CorrelationReport {
    pub correlation: f64,
    pub first: TickerStats,
    pub second: TickerStats,
}

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // Upstream
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    pub credentials: Credentials,

    // Cache
    #[serde(default = "default_cache_ttl_sec")]
    pub cache_ttl_sec: u64,
    #[serde(default = "default_cache_sweep_interval_sec")]
    pub cache_sweep_interval_sec: u64,

    // Token Management
    #[serde(default = "default_auth_retry_backoff_sec")]
    pub auth_retry_backoff_sec: u64,
    #[serde(default = "default_token_refresh_margin_sec")]
    pub token_refresh_margin_sec: u64,
    #[serde(default = "default_max_refresh_delay_sec")]
    pub max_refresh_delay_sec: u64,

    // Logging
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

/// Credentials exchanged for a bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub name: String,
    pub roll_no: String,
    pub access_code: String,
    pub client_id: String,
    pub client_secret: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_base_url() -> String {
    "http://20.244.56.144/evaluation-service".to_string()
}

fn default_request_timeout_sec() -> u64 {
    30
}

fn default_cache_ttl_sec() -> u64 {
    30
}

fn default_cache_sweep_interval_sec() -> u64 {
    60
}

fn default_auth_retry_backoff_sec() -> u64 {
    60
}

fn default_token_refresh_margin_sec() -> u64 {
    300
}

// Keeps refresh delays within a signed 32-bit millisecond range
fn default_max_refresh_delay_sec() -> u64 {
    2_147_483
}

fn default_log_level() -> String {
    "stockstats=debug,info".to_string()
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval_sec)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
