/// Time alignment of two price series and Pearson correlation
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::types::PricePoint;

/// Two series resampled onto the union of their timestamps, ascending
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedPair {
    pub first: Vec<f64>,
    pub second: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.first.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty()
    }
}

/// Resample `a` and `b` onto one sorted timestamp axis.
///
/// At each timestamp a series contributes its own price if it has one there,
/// else its previous aligned value, else 0.0 when it has not started yet.
/// If a series repeats a timestamp the later point wins. Either side empty
/// yields an empty pair.
pub fn align(a: &[PricePoint], b: &[PricePoint]) -> AlignedPair {
    if a.is_empty() || b.is_empty() {
        return AlignedPair::default();
    }

    let prices_a = by_timestamp(a);
    let prices_b = by_timestamp(b);

    let timestamps: BTreeSet<DateTime<Utc>> = a
        .iter()
        .chain(b)
        .map(|p| p.last_updated_at)
        .collect();

    let mut first = Vec::with_capacity(timestamps.len());
    let mut second = Vec::with_capacity(timestamps.len());

    for ts in &timestamps {
        first.push(sample(&prices_a, ts, first.last()));
        second.push(sample(&prices_b, ts, second.last()));
    }

    AlignedPair { first, second }
}

fn by_timestamp(series: &[PricePoint]) -> HashMap<DateTime<Utc>, f64> {
    series.iter().map(|p| (p.last_updated_at, p.price)).collect()
}

// Forward fill, with 0.0 before the series' first sample
fn sample(prices: &HashMap<DateTime<Utc>, f64>, ts: &DateTime<Utc>, previous: Option<&f64>) -> f64 {
    prices
        .get(ts)
        .or(previous)
        .copied()
        .unwrap_or(0.0)
}

/// Pearson correlation of `a` and `b` after alignment, rounded to 4 decimals.
///
/// Uses sample (n - 1) covariance and standard deviations. Returns 0.0 when
/// fewer than two aligned points exist or either side has no variance.
pub fn correlate(a: &[PricePoint], b: &[PricePoint]) -> f64 {
    let aligned = align(a, b);
    let n = aligned.len();

    if n < 2 {
        return 0.0;
    }

    let mean_a = aligned.first.iter().sum::<f64>() / n as f64;
    let mean_b = aligned.second.iter().sum::<f64>() / n as f64;

    let mut covariance = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;

    for (x, y) in aligned.first.iter().zip(&aligned.second) {
        let diff_a = x - mean_a;
        let diff_b = y - mean_b;
        covariance += diff_a * diff_b;
        variance_a += diff_a * diff_a;
        variance_b += diff_b * diff_b;
    }

    let denom = (n - 1) as f64;
    covariance /= denom;
    let std_dev_a = (variance_a / denom).sqrt();
    let std_dev_b = (variance_b / denom).sqrt();

    if std_dev_a == 0.0 || std_dev_b == 0.0 {
        return 0.0;
    }

    round4(covariance / (std_dev_a * std_dev_b))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
