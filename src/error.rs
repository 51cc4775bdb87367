/// Centralized error types for the stock statistics service
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    // Authentication Errors
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Token expired: {0}")]
    TokenExpired(String),

    // Upstream Errors
    #[error("Upstream request failed with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    // Validation Errors
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    /// Upstream rejected the bearer credential (HTTP 401)
    pub fn is_auth_expiry(&self) -> bool {
        matches!(self, StatsError::TokenExpired(_))
    }

    /// Failure originating from the price feed rather than from this process
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            StatsError::TokenExpired(_)
                | StatsError::Upstream { .. }
                | StatsError::HttpError(_)
                | StatsError::DeserializationError(_)
        )
    }

    /// Check if a later attempt may succeed without intervention
    pub fn is_recoverable(&self) -> bool {
        match self {
            StatsError::AuthenticationFailed(_) | StatsError::TokenExpired(_) => true,
            StatsError::HttpError(e) => e.is_timeout() || e.is_connect(),
            StatsError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            StatsError::AuthenticationFailed(_) => "AUTH_001",
            StatsError::TokenExpired(_) => "AUTH_002",
            StatsError::Upstream { .. } => "NET_001",
            StatsError::HttpError(_) => "NET_002",
            StatsError::DeserializationError(_) => "DATA_001",
            StatsError::InvalidParameter(_) => "VAL_001",
            StatsError::ConfigError(_) => "CFG_001",
        }
    }
}
