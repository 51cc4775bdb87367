/// Bearer token session shared by all upstream calls
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token holder with thread-safe access.
///
/// Only [`TokenManager::replace`] mutates the session, so a failed refresh
/// leaves the previous token in place.
#[derive(Debug, Default)]
pub struct TokenManager {
    session: RwLock<Option<AuthSession>>,
}

impl TokenManager {
    pub fn new() -> Self {
        TokenManager {
            session: RwLock::new(None),
        }
    }

    /// Get current session (clone)
    pub async fn read(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    /// Current bearer token, if any has been granted
    pub async fn token(&self) -> Option<String> {
        self.session.read().await.as_ref().map(|s| s.token.clone())
    }

    /// Install a freshly granted session; last writer wins
    pub async fn replace(&self, session: AuthSession) {
        let mut s = self.session.write().await;
        debug!("Token replaced, expires at {}", session.expires_at);
        *s = Some(session);
    }

    /// Whether a token is held at all, regardless of expiry
    pub async fn has_token(&self) -> bool {
        self.session.read().await.is_some()
    }
}
