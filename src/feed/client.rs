/// REST client for the upstream stock price feed
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StatsError};
use crate::types::{Config, Credentials, PricePoint};

#[derive(Debug, Serialize)]
struct AuthRequest {
    email: String,
    name: String,
    #[serde(rename = "rollNo")]
    roll_no: String,
    #[serde(rename = "accessCode")]
    access_code: String,
    #[serde(rename = "clientID")]
    client_id: String,
    #[serde(rename = "clientSecret")]
    client_secret: String,
}

impl From<&Credentials> for AuthRequest {
    fn from(c: &Credentials) -> Self {
        AuthRequest {
            email: c.email.clone(),
            name: c.name.clone(),
            roll_no: c.roll_no.clone(),
            access_code: c.access_code.clone(),
            client_id: c.client_id.clone(),
            client_secret: c.client_secret.clone(),
        }
    }
}

/// Bearer credential granted by the feed
#[derive(Debug, Clone, Deserialize)]
pub struct AuthGrant {
    pub access_token: String,
    /// Seconds until the token stops being accepted
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct LatestPriceResponse {
    stock: PricePoint,
}

/// Operations the fetcher and authenticator need from the price feed
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Exchange the configured credentials for a bearer token
    async fn authenticate(&self) -> Result<AuthGrant>;

    /// Full series the feed holds for `ticker` over the last `minutes`.
    /// Ordering and window bounds are not trusted.
    async fn price_history(&self, token: &str, ticker: &str, minutes: u32) -> Result<Vec<PricePoint>>;

    /// Most recent price point for `ticker`
    async fn latest_price(&self, token: &str, ticker: &str) -> Result<PricePoint>;
}

/// HTTP implementation of [`PriceFeed`]
pub struct FeedClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl FeedClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(FeedClient {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
        })
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response, what: &str) -> Result<T> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(StatsError::TokenExpired(format!("{} rejected the bearer token", what)));
        }

        let body = response.text().await?;
        debug!("{} response status: {}, {} bytes", what, status, body.len());

        if !status.is_success() {
            return Err(StatsError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl PriceFeed for FeedClient {
    async fn authenticate(&self) -> Result<AuthGrant> {
        let auth_req = AuthRequest::from(&self.credentials);

        let response = self.client
            .post(format!("{}/auth", self.base_url))
            .header("Accept", "application/json")
            .json(&auth_req)
            .send()
            .await
            .map_err(|e| StatsError::AuthenticationFailed(format!("Request error: {}", e)))?;

        let status = response.status();
        let body = response.text().await
            .map_err(|e| StatsError::AuthenticationFailed(format!("Read error: {}", e)))?;

        if !status.is_success() {
            return Err(StatsError::AuthenticationFailed(format!(
                "Auth endpoint returned {}: {}",
                status, body
            )));
        }

        let grant: AuthGrant = serde_json::from_str(&body)
            .map_err(|e| StatsError::AuthenticationFailed(format!("Parse error: {}", e)))?;

        if grant.access_token.is_empty() {
            return Err(StatsError::AuthenticationFailed("Empty access token".to_string()));
        }

        Ok(grant)
    }

    async fn price_history(&self, token: &str, ticker: &str, minutes: u32) -> Result<Vec<PricePoint>> {
        let response = self.client
            .get(format!("{}/stocks/{}", self.base_url, ticker))
            .query(&[("minutes", minutes)])
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        self.read_json(response, "Price history").await
    }

    async fn latest_price(&self, token: &str, ticker: &str) -> Result<PricePoint> {
        let response = self.client
            .get(format!("{}/stocks/{}", self.base_url, ticker))
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let latest: LatestPriceResponse = self.read_json(response, "Latest price").await?;
        Ok(latest.stock)
    }
}
