pub mod client;
pub mod tokens;
pub mod auth;
pub mod price_cache;
pub mod fetcher;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{AuthGrant, FeedClient, PriceFeed};
pub use tokens::{AuthSession, TokenManager};
pub use auth::{AuthOutcome, Authenticator, RefreshPolicy};
pub use price_cache::{spawn_sweeper, PriceCache, TtlCache};
pub use fetcher::PriceFetcher;
