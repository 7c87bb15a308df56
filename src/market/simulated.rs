use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::PricingResult;
use crate::market::MarketDataSource;
use crate::models::{Asset, MarketConditions, MarketPrice};

/// In-process market data with seedable values, keyed by `Asset::key()`.
/// Used in tests and when no upstream API is configured. Assets that were
/// never seeded get an invalid price and neutral conditions.
#[derive(Default)]
pub struct SimulatedMarketData {
    prices: RwLock<HashMap<String, MarketPrice>>,
    conditions: RwLock<HashMap<String, MarketConditions>>,
}

impl SimulatedMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, asset: &Asset, price: MarketPrice) {
        self.prices.write().await.insert(asset.key(), price);
    }

    pub async fn set_conditions(&self, asset: &Asset, conditions: MarketConditions) {
        self.conditions.write().await.insert(asset.key(), conditions);
    }

    pub async fn clear(&self) {
        self.prices.write().await.clear();
        self.conditions.write().await.clear();
    }
}

#[async_trait]
impl MarketDataSource for SimulatedMarketData {
    async fn price(&self, asset: &Asset) -> PricingResult<MarketPrice> {
        let prices = self.prices.read().await;
        Ok(prices.get(&asset.key()).cloned().unwrap_or_else(|| {
            MarketPrice::invalid("simulated", format!("No price seeded for {}", asset.key()))
        }))
    }

    async fn conditions(&self, asset: &Asset) -> PricingResult<MarketConditions> {
        let conditions = self.conditions.read().await;
        Ok(conditions
            .get(&asset.key())
            .cloned()
            .unwrap_or_else(MarketConditions::neutral))
    }
}
