/// Credential exchange and the refresh schedule that keeps it current
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::feed::client::PriceFeed;
use crate::feed::tokens::{AuthSession, TokenManager};
use crate::types::Config;
use crate::utils::Clock;

/// Timing rules for token refresh
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    /// Refresh this long before the token expires
    pub refresh_margin: Duration,
    /// Upper bound on any scheduled delay
    pub max_delay: Duration,
    /// Wait after a failed attempt
    pub retry_backoff: Duration,
}

impl RefreshPolicy {
    pub fn from_config(config: &Config) -> Self {
        RefreshPolicy {
            refresh_margin: Duration::from_secs(config.token_refresh_margin_sec),
            max_delay: Duration::from_secs(config.max_refresh_delay_sec),
            retry_backoff: Duration::from_secs(config.auth_retry_backoff_sec),
        }
    }

    /// Delay before refreshing a token valid for `expires_in` seconds
    pub fn refresh_delay(&self, expires_in: i64) -> Duration {
        let margin = self.refresh_margin.as_secs() as i64;
        let secs = expires_in.saturating_sub(margin).max(0) as u64;
        Duration::from_secs(secs).min(self.max_delay)
    }
}

/// Result of one authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    pub success: bool,
    /// When the supervising loop should try again
    pub next_attempt_in: Duration,
}

pub struct Authenticator {
    feed: Arc<dyn PriceFeed>,
    tokens: Arc<TokenManager>,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
}

impl Authenticator {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        tokens: Arc<TokenManager>,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Self {
        Authenticator {
            feed,
            tokens,
            clock,
            policy,
        }
    }

    /// Exchange credentials for a token and report when to do it again.
    ///
    /// A failure never touches the stored session.
    pub async fn attempt(&self) -> AuthOutcome {
        info!("Attempting authentication");

        match self.feed.authenticate().await {
            Ok(grant) => {
                let expires_at = chrono::Duration::try_seconds(grant.expires_in)
                    .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                self.tokens
                    .replace(AuthSession {
                        token: grant.access_token,
                        expires_at,
                    })
                    .await;

                let next = self.policy.refresh_delay(grant.expires_in);
                info!("Authentication successful, next refresh in {}s", next.as_secs());
                AuthOutcome {
                    success: true,
                    next_attempt_in: next,
                }
            }
            Err(e) => {
                error!(
                    "Authentication failed: {} ({}), retrying in {}s",
                    e,
                    e.error_code(),
                    self.policy.retry_backoff.as_secs()
                );
                AuthOutcome {
                    success: false,
                    next_attempt_in: self.policy.retry_backoff,
                }
            }
        }
    }

    /// Authenticate once, on demand
    pub async fn authenticate(&self) -> bool {
        self.attempt().await.success
    }

    /// Spawn the loop that owns the refresh schedule: attempt, then sleep for
    /// whatever the attempt asked for. The first attempt runs immediately.
    pub fn spawn_refresh_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let outcome = self.attempt().await;
                tokio::time::sleep(outcome.next_attempt_in).await;
            }
        })
    }
}
