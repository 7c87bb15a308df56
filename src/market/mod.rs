//! Market data sources.
//!
//! Margin and dynamic pricing consult an upstream source for reference
//! prices and market conditions. The HTTP source talks to a real API, the
//! simulated source is used in tests and when no API is configured, and
//! the cached decorator wraps either behind the quote cache TTLs.

pub mod cached;
pub mod http;
pub mod simulated;

use async_trait::async_trait;

use crate::error::PricingResult;
use crate::models::{Asset, MarketConditions, MarketPrice};

/// Upstream market data. Implementations return `MarketDataUnavailable`
/// for transport failures and `MarketPrice::invalid` when the upstream
/// answered but could not price the asset.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Current reference price for the asset
    async fn price(&self, asset: &Asset) -> PricingResult<MarketPrice>;

    /// Current market conditions for the asset
    async fn conditions(&self, asset: &Asset) -> PricingResult<MarketConditions>;
}

pub use cached::CachedMarketData;
pub use http::HttpMarketData;
pub use simulated::SimulatedMarketData;
