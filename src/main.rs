//! Vendora Pricing Engine Service
//!
//! Main entry point for the Vendora marketplace pricing engine.
//! This service provides:
//! - Strategy-based price calculation with volume and loyalty discounts
//! - Automatic margin and dynamic repricing against market data
//! - Pricing analytics over price history and completed orders

mod config;
mod error;
mod market;
mod models;
mod pricing;
mod repositories;
mod services;

use config::AppConfig;
use error::{PricingError, PricingResult};
use market::{CachedMarketData, HttpMarketData, MarketDataSource, SimulatedMarketData};
use repositories::{MemoryCache, QuoteCache, SqlStore};
use services::{ListingLocks, RepriceScheduler, RepricingService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> PricingResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        PricingError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vendora_pricing={},sqlx=warn", config.log_level).into()
            }),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Vendora Pricing Engine Starting                 ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("Reprice interval: {:?}", config.reprice_interval());

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let store = SqlStore::connect(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        PricingError::Store(e)
    })?;

    info!("Running database migrations...");
    store.migrate().await.map_err(|e| {
        error!("Database migration failed: {}", e);
        PricingError::Store(e)
    })?;
    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let cache: Arc<dyn QuoteCache> = Arc::new(MemoryCache::new());

    let upstream: Arc<dyn MarketDataSource> = match &config.market.base_url {
        Some(url) => {
            info!("✓ Market data source: HTTP ({})", url);
            Arc::new(HttpMarketData::new(&config.market)?)
        }
        None => {
            info!("✓ Market data source: simulated (no MARKET_DATA_URL configured)");
            Arc::new(SimulatedMarketData::new())
        }
    };
    let market: Arc<dyn MarketDataSource> = Arc::new(CachedMarketData::new(
        upstream,
        cache.clone(),
        config.engine.market_price_ttl(),
        config.engine.market_conditions_ttl(),
    ));

    let store: Arc<SqlStore> = Arc::new(store);
    let locks = Arc::new(ListingLocks::new());

    let repricing = Arc::new(RepricingService::new(
        store.clone(),
        market.clone(),
        locks.clone(),
        config.engine.clone(),
    ));
    info!("✓ Repricing service initialized");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    info!("Starting background tasks...");

    let cancel = CancellationToken::new();
    let scheduler = RepriceScheduler::new(
        repricing.clone(),
        store.clone(),
        config.reprice_interval(),
        cancel.clone(),
    );

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });
    info!(
        "✓ Reprice scheduler started ({:?} interval)",
        config.reprice_interval()
    );

    // =========================================================================
    // RUN UNTIL SHUTDOWN
    // =========================================================================
    info!("Pricing engine running. Press Ctrl+C to stop.");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    if let Err(e) = scheduler_handle.await {
        error!("Scheduler task panicked: {}", e);
    }

    info!("Pricing engine stopped");
    Ok(())
}
