//! Vendora Pricing Engine Library
//!
//! This module exposes the pricing engine components for use by tests and
//! other consumers.

pub mod config;
pub mod error;
pub mod market;
pub mod models;
pub mod pricing;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{PricingError, PricingResult};

use market::{CachedMarketData, MarketDataSource};
use repositories::{ListingStore, QuoteCache};
use services::{AnalyticsService, ListingLocks, PricingService, RepricingService};
use std::sync::Arc;

/// Application state containing the store, market data and services
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
    pub market: Arc<dyn MarketDataSource>,
    pub cache: Arc<dyn QuoteCache>,
    pub locks: Arc<ListingLocks>,
    pub pricing: Arc<PricingService>,
    pub repricing: Arc<RepricingService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppState {
    /// Wire the services over a store, a market data source and a cache.
    /// The market source is wrapped in the caching decorator using the
    /// configured TTLs.
    pub fn new(
        store: Arc<dyn ListingStore>,
        market: Arc<dyn MarketDataSource>,
        cache: Arc<dyn QuoteCache>,
        config: &AppConfig,
    ) -> Self {
        let market: Arc<dyn MarketDataSource> = Arc::new(CachedMarketData::new(
            market,
            cache.clone(),
            config.engine.market_price_ttl(),
            config.engine.market_conditions_ttl(),
        ));
        let locks = Arc::new(ListingLocks::new());

        let pricing = Arc::new(PricingService::new(
            store.clone(),
            market.clone(),
            cache.clone(),
            locks.clone(),
            config.engine.clone(),
        ));
        let repricing = Arc::new(RepricingService::new(
            store.clone(),
            market.clone(),
            locks.clone(),
            config.engine.clone(),
        ));
        let analytics = Arc::new(AnalyticsService::new(store.clone()));

        Self {
            store,
            market,
            cache,
            locks,
            pricing,
            repricing,
            analytics,
        }
    }
}
