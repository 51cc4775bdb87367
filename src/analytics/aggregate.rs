/// Price aggregation over a series
use crate::types::PricePoint;

/// Arithmetic mean of `price` at full precision.
///
/// Returns 0.0 for an empty series. That sentinel cannot be told apart from a
/// genuine mean of zero; callers that care must check the series length.
pub fn average(series: &[PricePoint]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }

    let sum: f64 = series.iter().map(|p| p.price).sum();
    sum / series.len() as f64
}
