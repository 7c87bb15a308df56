use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::PricingResult;
use crate::market::MarketDataSource;
use crate::models::{Asset, MarketConditions, MarketPrice};
use crate::repositories::QuoteCache;

/// Caching decorator over any market data source.
///
/// Cache failures never fail a lookup; they are logged and the call falls
/// through to the inner source. Only valid prices are cached so a flaky
/// upstream is retried on the next call instead of pinning its error.
pub struct CachedMarketData {
    inner: Arc<dyn MarketDataSource>,
    cache: Arc<dyn QuoteCache>,
    price_ttl: Duration,
    conditions_ttl: Duration,
}

impl CachedMarketData {
    pub fn new(
        inner: Arc<dyn MarketDataSource>,
        cache: Arc<dyn QuoteCache>,
        price_ttl: Duration,
        conditions_ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            price_ttl,
            conditions_ttl,
        }
    }

    async fn cached<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!("Cache hit: {}", key);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    async fn store<T: serde::Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, &raw, ttl).await {
                    warn!("Cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => warn!("Unencodable cache value for {}: {}", key, e),
        }
    }
}

#[async_trait]
impl MarketDataSource for CachedMarketData {
    async fn price(&self, asset: &Asset) -> PricingResult<MarketPrice> {
        let key = format!("market:price:{}", asset.key());
        if let Some(price) = self.cached::<MarketPrice>(&key).await {
            return Ok(price);
        }

        let price = self.inner.price(asset).await?;
        if price.is_valid {
            self.store(&key, &price, self.price_ttl).await;
        }
        Ok(price)
    }

    async fn conditions(&self, asset: &Asset) -> PricingResult<MarketConditions> {
        let key = format!("market:conditions:{}", asset.key());
        if let Some(conditions) = self.cached::<MarketConditions>(&key).await {
            return Ok(conditions);
        }

        let conditions = self.inner.conditions(asset).await?;
        self.store(&key, &conditions, self.conditions_ttl).await;
        Ok(conditions)
    }
}
