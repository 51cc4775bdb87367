/// Average and correlation requests served from the fetcher
use std::num::NonZeroU32;

use tracing::info;

use crate::analytics::{average, correlate};
use crate::error::Result;
use crate::feed::PriceFetcher;
use crate::types::{AverageReport, CorrelationReport, TickerStats};

/// Entry point for the HTTP layer.
///
/// `minutes` is already validated as positive by the caller; the service
/// never substitutes a default window.
pub struct StatsService {
    fetcher: PriceFetcher,
}

impl StatsService {
    pub fn new(fetcher: PriceFetcher) -> Self {
        StatsService { fetcher }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.fetcher.has_valid_token().await
    }

    /// Mean price of `ticker` over the last `minutes`
    pub async fn get_average(&self, ticker: &str, minutes: NonZeroU32) -> Result<AverageReport> {
        let series = self.fetcher.fetch(ticker, Some(minutes)).await?;
        let average = average(&series);

        info!("Average for {} over {} min: {} ({} points)", ticker, minutes, average, series.len());
        Ok(AverageReport { average, series })
    }

    /// Correlation between two tickers over the last `minutes`.
    ///
    /// Both series are fetched concurrently; either failure fails the request.
    pub async fn get_correlation(
        &self,
        first: &str,
        second: &str,
        minutes: NonZeroU32,
    ) -> Result<CorrelationReport> {
        let (series_a, series_b) = tokio::try_join!(
            self.fetcher.fetch(first, Some(minutes)),
            self.fetcher.fetch(second, Some(minutes)),
        )?;

        let correlation = correlate(&series_a, &series_b);
        info!("Correlation {}/{} over {} min: {}", first, second, minutes, correlation);

        Ok(CorrelationReport {
            correlation,
            first: TickerStats {
                ticker: first.to_string(),
                average: average(&series_a),
                series: series_a,
            },
            second: TickerStats {
                ticker: second.to_string(),
                average: average(&series_b),
                series: series_b,
            },
        })
    }
}
