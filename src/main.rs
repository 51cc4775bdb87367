/// Main entry point for the stock statistics service
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stockstats::{
    api,
    config::load_config,
    feed::{spawn_sweeper, Authenticator, FeedClient, PriceCache, PriceFeed, PriceFetcher, RefreshPolicy, TokenManager},
    utils::{Clock, SystemClock},
    StatsService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("🚀 Starting stock statistics service");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed: Arc<dyn PriceFeed> = Arc::new(FeedClient::new(&config)?);
    let tokens = Arc::new(TokenManager::new());

    let authenticator = Arc::new(Authenticator::new(
        Arc::clone(&feed),
        Arc::clone(&tokens),
        Arc::clone(&clock),
        RefreshPolicy::from_config(&config),
    ));

    let cache = Arc::new(PriceCache::new(config.cache_ttl(), Arc::clone(&clock)));
    spawn_sweeper(Arc::clone(&cache), config.cache_sweep_interval());

    let fetcher = PriceFetcher::new(
        feed,
        Arc::clone(&authenticator),
        tokens,
        cache,
        clock,
    );
    let service = Arc::new(StatsService::new(fetcher));

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    info!("✅ Server running on http://{}", config.listen_addr());

    // First attempt runs immediately, then follows the refresh schedule
    authenticator.spawn_refresh_loop();

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, gracefully stopping…");
}
