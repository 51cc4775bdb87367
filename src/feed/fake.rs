//! In-process price feed used by unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{Result, StatsError};
use crate::feed::{
    AuthGrant, Authenticator, PriceCache, PriceFeed, PriceFetcher, RefreshPolicy, TokenManager,
};
use crate::types::PricePoint;
use crate::utils::ManualClock;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 8, 10, 0, 0).unwrap()
}

#[derive(Default)]
pub(crate) struct FakeFeed {
    history: Mutex<HashMap<String, Vec<PricePoint>>>,
    pub auth_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub latest_calls: AtomicUsize,
    /// Number of upcoming authentications that fail
    pub auth_failures: AtomicUsize,
    /// Number of upcoming price calls answered with 401
    pub unauthorized: AtomicUsize,
    /// Status returned by every price call when set
    pub failure_status: Mutex<Option<u16>>,
    pub expires_in: i64,
}

impl FakeFeed {
    pub fn new() -> Self {
        FakeFeed {
            expires_in: 3600,
            ..Default::default()
        }
    }

    pub fn with_history(self, ticker: &str, points: Vec<PricePoint>) -> Self {
        self.history.lock().unwrap().insert(ticker.to_string(), points);
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_price_call(&self, token: &str) -> Result<()> {
        if token.is_empty() || Self::take(&self.unauthorized) {
            return Err(StatsError::TokenExpired("fake feed rejected token".to_string()));
        }
        if let Some(status) = *self.failure_status.lock().unwrap() {
            return Err(StatsError::Upstream {
                status,
                message: "fake feed failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PriceFeed for FakeFeed {
    async fn authenticate(&self) -> Result<AuthGrant> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if Self::take(&self.auth_failures) {
            return Err(StatsError::AuthenticationFailed("fake auth failure".to_string()));
        }
        Ok(AuthGrant {
            access_token: format!("token-{}", n),
            expires_in: self.expires_in,
        })
    }

    async fn price_history(&self, token: &str, ticker: &str, _minutes: u32) -> Result<Vec<PricePoint>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check_price_call(token)?;
        Ok(self.history.lock().unwrap().get(ticker).cloned().unwrap_or_default())
    }

    async fn latest_price(&self, token: &str, ticker: &str) -> Result<PricePoint> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.check_price_call(token)?;
        self.history
            .lock()
            .unwrap()
            .get(ticker)
            .and_then(|points| points.iter().max_by_key(|p| p.last_updated_at).copied())
            .ok_or_else(|| StatsError::Upstream {
                status: 404,
                message: format!("unknown ticker {}", ticker),
            })
    }
}

pub(crate) fn policy() -> RefreshPolicy {
    RefreshPolicy {
        refresh_margin: Duration::from_secs(300),
        max_delay: Duration::from_secs(2_147_483),
        retry_backoff: Duration::from_secs(60),
    }
}

/// Fetcher wired to `feed` and `clock` with a 30 second cache
pub(crate) fn fetcher(feed: Arc<FakeFeed>, clock: Arc<ManualClock>) -> PriceFetcher {
    let tokens = Arc::new(TokenManager::new());
    let authenticator = Arc::new(Authenticator::new(
        feed.clone(),
        tokens.clone(),
        clock.clone(),
        policy(),
    ));
    let cache = Arc::new(PriceCache::new(Duration::from_secs(30), clock.clone()));
    PriceFetcher::new(feed, authenticator, tokens, cache, clock)
}
