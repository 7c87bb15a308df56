use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market price snapshot for an asset. Transient: produced per query and
/// cached briefly as a serialized blob, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrice {
    pub price: Decimal,
    pub currency: String,
    /// Label of the upstream source that produced this quote
    pub source: String,
    pub is_valid: bool,
    pub error: Option<String>,
    pub fetched_at: NaiveDateTime,
}

impl MarketPrice {
    /// A valid quote from the named source
    pub fn valid(price: Decimal, currency: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            price,
            currency: currency.into(),
            source: source.into(),
            is_valid: true,
            error: None,
            fetched_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// An invalid quote carrying the upstream error message
    pub fn invalid(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            price: Decimal::ZERO,
            currency: String::new(),
            source: source.into(),
            is_valid: false,
            error: Some(error.into()),
            fetched_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Market conditions snapshot used by dynamic pricing. Transient, cached
/// for about ten minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Trading volume over the trailing 24 hours
    pub volume_24h: Decimal,
    /// Price change over the trailing 24 hours, as a fraction (0.05 = +5%)
    pub price_change_24h: Decimal,
    pub active_orders: u64,
    pub average_order_size: Decimal,
    pub market_cap: Option<Decimal>,
    /// Population standard deviation of recent prices divided by their mean
    pub volatility: Decimal,
}

impl MarketConditions {
    /// Flat market: no volume, no movement, no volatility
    pub fn neutral() -> Self {
        Self {
            volume_24h: Decimal::ZERO,
            price_change_24h: Decimal::ZERO,
            active_orders: 0,
            average_order_size: Decimal::ZERO,
            market_cap: None,
            volatility: Decimal::ZERO,
        }
    }
}
