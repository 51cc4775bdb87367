pub mod aggregate;
pub mod correlation;

pub use aggregate::average;
pub use correlation::{align, correlate, AlignedPair};
