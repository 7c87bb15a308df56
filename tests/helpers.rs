use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use vendora_pricing::config::EngineConfig;
use vendora_pricing::error::CacheError;
use vendora_pricing::market::SimulatedMarketData;
use vendora_pricing::models::*;
use vendora_pricing::repositories::*;
use vendora_pricing::services::*;

/// In-memory engine wiring shared by the integration and e2e tests
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub market: Arc<SimulatedMarketData>,
    pub cache: Arc<MemoryCache>,
    pub locks: Arc<ListingLocks>,
    pub pricing: PricingService,
    pub repricing: Arc<RepricingService>,
    pub analytics: AnalyticsService,
    pub config: EngineConfig,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let market = Arc::new(SimulatedMarketData::new());
        let cache = Arc::new(MemoryCache::new());
        let locks = Arc::new(ListingLocks::new());
        let config = EngineConfig::default();

        let pricing = PricingService::new(
            store.clone(),
            market.clone(),
            cache.clone(),
            locks.clone(),
            config.clone(),
        );
        let repricing = Arc::new(RepricingService::new(
            store.clone(),
            market.clone(),
            locks.clone(),
            config.clone(),
        ));
        let analytics = AnalyticsService::new(store.clone());

        Self {
            store,
            market,
            cache,
            locks,
            pricing,
            repricing,
            analytics,
            config,
        }
    }

    /// Same wiring but quoting through the given cache
    pub fn with_cache(cache: Arc<dyn QuoteCache>) -> Self {
        let base = Self::new();
        let pricing = PricingService::new(
            base.store.clone(),
            base.market.clone(),
            cache,
            base.locks.clone(),
            base.config.clone(),
        );
        Self { pricing, ..base }
    }

    pub async fn seed(&self, listing: &Listing) {
        self.store
            .insert_listing(listing)
            .await
            .expect("Failed to insert listing");
    }

    pub async fn seed_market_price(&self, asset: &Asset, price: Decimal) {
        self.market
            .set_price(asset, MarketPrice::valid(price, "USDC", "simulated"))
            .await;
    }

    /// Give a buyer `count` completed orders so loyalty checks can match
    pub async fn seed_completed_orders(&self, buyer_id: Uuid, count: usize) {
        for _ in 0..count {
            let order = Order::completed(Uuid::new_v4(), buyer_id, dec!(1), dec!(1), dec!(1), "USDC");
            self.store
                .insert_order(&order)
                .await
                .expect("Failed to insert order");
        }
    }
}

/// Cache stub whose every call fails, for verifying best-effort semantics
pub struct FailingCache;

#[async_trait]
impl QuoteCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Backend("cache offline".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("cache offline".to_string()))
    }
}

fn active(mut listing: Listing) -> Listing {
    listing.activate().expect("Failed to activate listing");
    listing
}

pub fn fixed_listing(base_price: Decimal, total_quantity: Decimal) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::token(Uuid::new_v4()),
        PricingStrategy::Fixed,
        Some(base_price),
        &json!({}),
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

pub fn unit_listing(base_price: Decimal, total_quantity: Decimal) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::crypto("SOL"),
        PricingStrategy::Unit,
        Some(base_price),
        &json!({}),
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

/// The three-tier ladder used throughout the tier tests
pub fn standard_tiers() -> serde_json::Value {
    json!({
        "tiers": [
            { "min_quantity": 0, "max_quantity": 99, "price_per_unit": 10 },
            { "min_quantity": 100, "max_quantity": 999, "price_per_unit": 8 },
            { "min_quantity": 1000, "max_quantity": null, "price_per_unit": 5 }
        ]
    })
}

pub fn tiered_listing(
    tiers: &serde_json::Value,
    base_price: Option<Decimal>,
    total_quantity: Decimal,
) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::token(Uuid::new_v4()),
        PricingStrategy::Tiered,
        base_price,
        tiers,
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

pub fn bulk_listing(
    base_price: Option<Decimal>,
    configured_total: Option<Decimal>,
    total_quantity: Decimal,
) -> Listing {
    let config = match configured_total {
        Some(total) => json!({ "total_price": total.to_string() }),
        None => json!({}),
    };
    active(Listing::new(
        Uuid::new_v4(),
        Asset::token(Uuid::new_v4()),
        PricingStrategy::Bulk,
        base_price,
        &config,
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

pub fn margin_fixed_listing(margin: Decimal, total_quantity: Decimal) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::crypto("BTC"),
        PricingStrategy::MarginFixed,
        None,
        &json!({ "margin": margin.to_string() }),
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

pub fn margin_percentage_listing(percentage: Decimal, total_quantity: Decimal) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::crypto("ETH"),
        PricingStrategy::MarginPercentage,
        None,
        &json!({ "percentage": percentage.to_string() }),
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

pub fn dynamic_listing(base_price: Decimal, total_quantity: Decimal) -> Listing {
    active(Listing::new(
        Uuid::new_v4(),
        Asset::crypto("SOL"),
        PricingStrategy::Dynamic,
        Some(base_price),
        &json!({}),
        total_quantity,
        Decimal::ZERO,
        None,
        "USDC",
    ))
}

/// Conditions that move the multiplier well past the dynamic threshold
pub fn surging_conditions() -> MarketConditions {
    MarketConditions {
        volume_24h: dec!(1000000),
        price_change_24h: dec!(0.10),
        active_orders: 250,
        average_order_size: dec!(40),
        market_cap: None,
        volatility: dec!(0.2),
    }
}
