/// Cached, window-restricted price fetching with one re-authentication retry
use std::num::NonZeroU32;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::{Result, StatsError};
use crate::feed::auth::Authenticator;
use crate::feed::client::PriceFeed;
use crate::feed::price_cache::PriceCache;
use crate::feed::tokens::TokenManager;
use crate::types::{PriceKey, PricePoint, PriceSeries};
use crate::utils::{time_window, Clock};

pub struct PriceFetcher {
    feed: Arc<dyn PriceFeed>,
    authenticator: Arc<Authenticator>,
    tokens: Arc<TokenManager>,
    cache: Arc<PriceCache>,
    clock: Arc<dyn Clock>,
}

impl PriceFetcher {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        authenticator: Arc<Authenticator>,
        tokens: Arc<TokenManager>,
        cache: Arc<PriceCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        PriceFetcher {
            feed,
            authenticator,
            tokens,
            cache,
            clock,
        }
    }

    /// Price series for `ticker`.
    ///
    /// With `minutes` the series holds only points inside the trailing window,
    /// ascending by timestamp, possibly none. Without it the series is the
    /// single latest point. A 401 from the feed triggers exactly one
    /// re-authentication and one retry; every other failure propagates.
    pub async fn fetch(&self, ticker: &str, minutes: Option<NonZeroU32>) -> Result<PriceSeries> {
        let key = PriceKey::new(ticker, minutes);

        match self.fetch_once(&key).await {
            Err(e) if e.is_auth_expiry() => {
                warn!("Feed rejected token while fetching {}, re-authenticating", ticker);
                self.authenticator.authenticate().await;
                self.fetch_once(&key).await.map_err(|e| {
                    error!("Error fetching {} data after re-authentication: {}", ticker, e);
                    if e.is_auth_expiry() {
                        StatsError::Upstream {
                            status: 401,
                            message: e.to_string(),
                        }
                    } else {
                        e
                    }
                })
            }
            Err(e) => {
                error!("Error fetching {} data: {} ({})", ticker, e, e.error_code());
                Err(e)
            }
            ok => ok,
        }
    }

    /// Whether a granted token is held and has not yet expired
    pub async fn has_valid_token(&self) -> bool {
        let now = self.clock.now();
        self.tokens
            .read()
            .await
            .is_some_and(|session| !session.is_expired(now))
    }

    async fn fetch_once(&self, key: &PriceKey) -> Result<PriceSeries> {
        if let Some(series) = self.cache.get(key).await {
            debug!("Cache hit for {} ({:?} min)", key.ticker, key.minutes);
            return Ok(series);
        }

        if !self.tokens.has_token().await {
            self.authenticator.authenticate().await;
        }
        // Not a feed 401, so the caller does not re-authenticate again
        let token = self.tokens.token().await.ok_or_else(|| StatsError::Upstream {
            status: 401,
            message: "No token available, authentication failed".to_string(),
        })?;

        let series: PriceSeries = match key.minutes {
            Some(minutes) => {
                let points = self.feed.price_history(&token, &key.ticker, minutes.get()).await?;
                let window = time_window(self.clock.as_ref(), minutes);
                let total = points.len();
                let in_window = restrict_to_window(points, |p| window.admits(p.last_updated_at));
                debug!(
                    "Fetched {} points for {}, {} inside {} min window",
                    total,
                    key.ticker,
                    in_window.len(),
                    minutes
                );
                in_window.into()
            }
            None => {
                let latest = self.feed.latest_price(&token, &key.ticker).await?;
                vec![latest].into()
            }
        };

        self.cache.set(key.clone(), series.clone()).await;
        Ok(series)
    }
}

/// Keep admitted points, ordered ascending by timestamp. Ties keep feed order.
fn restrict_to_window<F>(mut points: Vec<PricePoint>, admits: F) -> Vec<PricePoint>
where
    F: Fn(&PricePoint) -> bool,
{
    points.retain(|p| admits(p));
    points.sort_by_key(|p| p.last_updated_at);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::fake::{fetcher, t0, FakeFeed};
    use crate::utils::ManualClock;
    use chrono::Duration;
    use std::sync::atomic::Ordering;

    fn minutes(n: u32) -> Option<NonZeroU32> {
        NonZeroU32::new(n)
    }

    fn at(offset_secs: i64, price: f64) -> PricePoint {
        PricePoint::new(price, t0() + Duration::seconds(offset_secs))
    }

    fn setup(feed: FakeFeed) -> (Arc<FakeFeed>, Arc<ManualClock>, PriceFetcher) {
        let feed = Arc::new(feed);
        let clock = Arc::new(ManualClock::new(t0()));
        let fetcher = fetcher(feed.clone(), clock.clone());
        (feed, clock, fetcher)
    }

    #[tokio::test]
    async fn test_filters_to_window_and_sorts() {
        let (_, _, fetcher) = setup(FakeFeed::new().with_history(
            "NVDA",
            vec![
                at(-60, 30.0),
                at(-600, 99.0),
                at(-240, 10.0),
                at(-300, 20.0),
                at(-301, 98.0),
            ],
        ));

        let series = fetcher.fetch("NVDA", minutes(5)).await.unwrap();

        let prices: Vec<f64> = series.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![20.0, 10.0, 30.0]);
    }

    #[tokio::test]
    async fn test_empty_window_is_not_an_error() {
        let (_, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-3600, 1.0)]));

        let series = fetcher.fetch("NVDA", minutes(5)).await.unwrap();
        assert!(series.is_empty());
    }

    #[tokio::test]
    async fn test_latest_only_without_window() {
        let (feed, _, fetcher) = setup(
            FakeFeed::new().with_history("NVDA", vec![at(-120, 1.0), at(-10, 2.0)]),
        );

        let series = fetcher.fetch("NVDA", None).await.unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].price, 2.0);
        assert_eq!(feed.latest_calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_within_ttl_then_refetch() {
        let (feed, clock, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));

        let first = fetcher.fetch("NVDA", minutes(5)).await.unwrap();
        clock.advance(Duration::seconds(10));
        let second = fetcher.fetch("NVDA", minutes(5)).await.unwrap();

        assert_eq!(feed.history_calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        clock.advance(Duration::seconds(21));
        fetcher.fetch("NVDA", minutes(5)).await.unwrap();
        assert_eq!(feed.history_calls(), 2);
    }

    #[tokio::test]
    async fn test_different_windows_fetch_separately() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));

        fetcher.fetch("NVDA", minutes(5)).await.unwrap();
        fetcher.fetch("NVDA", minutes(10)).await.unwrap();

        assert_eq!(feed.history_calls(), 2);
    }

    #[tokio::test]
    async fn test_authenticates_before_first_request() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));

        fetcher.fetch("NVDA", minutes(5)).await.unwrap();

        assert_eq!(feed.auth_calls(), 1);
    }

    #[tokio::test]
    async fn test_token_validity_follows_expiry() {
        let (_, clock, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        assert!(!fetcher.has_valid_token().await);

        fetcher.fetch("NVDA", minutes(5)).await.unwrap();
        assert!(fetcher.has_valid_token().await);

        clock.advance(Duration::seconds(3600));
        assert!(!fetcher.has_valid_token().await);
    }

    #[tokio::test]
    async fn test_401_reauthenticates_and_retries_once() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        fetcher.fetch("PYPL", minutes(1)).await.unwrap();
        assert_eq!(feed.auth_calls(), 1);
        let calls_before = feed.history_calls();

        feed.unauthorized.store(1, Ordering::SeqCst);
        let series = fetcher.fetch("NVDA", minutes(5)).await.unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(feed.auth_calls(), 2);
        assert_eq!(feed.history_calls() - calls_before, 2);
    }

    #[tokio::test]
    async fn test_repeated_401_is_not_retried_forever() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        feed.unauthorized.store(10, Ordering::SeqCst);

        let err = fetcher.fetch("NVDA", minutes(5)).await.unwrap_err();

        assert!(matches!(err, StatsError::Upstream { status: 401, .. }));
        assert_eq!(feed.history_calls(), 2);
        assert_eq!(feed.auth_calls(), 2);
    }

    #[tokio::test]
    async fn test_auth_outage_surfaces_as_upstream_error() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        feed.auth_failures.store(usize::MAX, Ordering::SeqCst);

        let err = fetcher.fetch("NVDA", minutes(5)).await.unwrap_err();

        assert!(matches!(err, StatsError::Upstream { status: 401, .. }));
        assert_eq!(feed.auth_calls(), 1);
        assert_eq!(feed.history_calls(), 0);
    }

    #[tokio::test]
    async fn test_other_failures_propagate_without_retry() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        *feed.failure_status.lock().unwrap() = Some(503);

        let err = fetcher.fetch("NVDA", minutes(5)).await.unwrap_err();

        assert!(matches!(err, StatsError::Upstream { status: 503, .. }));
        assert_eq!(feed.history_calls(), 1);
        assert_eq!(feed.auth_calls(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (feed, _, fetcher) = setup(FakeFeed::new().with_history("NVDA", vec![at(-10, 5.0)]));
        *feed.failure_status.lock().unwrap() = Some(500);
        assert!(fetcher.fetch("NVDA", minutes(5)).await.is_err());

        *feed.failure_status.lock().unwrap() = None;
        let series = fetcher.fetch("NVDA", minutes(5)).await.unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(feed.history_calls(), 2);
    }
}
