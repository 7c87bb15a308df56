use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PricingStrategy;

/// Price history entry for a listing. Append-only: entries are written in
/// the same transaction as the listing update they record and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: Uuid,
    pub listing_id: Uuid,
    /// Price per unit at the time of the change
    pub price: Decimal,
    pub currency: String,
    /// Strategy in effect when the change was recorded
    pub strategy: PricingStrategy,
    /// Free-text change reason
    pub reason: String,
    /// True when written by the automatic repricer rather than a user
    pub automatic: bool,
    pub changed_by: Option<Uuid>,
    pub recorded_at: NaiveDateTime,
}

impl PriceHistoryEntry {
    /// Create an entry for an automatic repricer commit
    pub fn automatic(
        listing_id: Uuid,
        price: Decimal,
        currency: impl Into<String>,
        strategy: PricingStrategy,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id,
            price,
            currency: currency.into(),
            strategy,
            reason: reason.into(),
            automatic: true,
            changed_by: None,
            recorded_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// Create an entry for a user-initiated price change
    pub fn manual(
        listing_id: Uuid,
        price: Decimal,
        currency: impl Into<String>,
        strategy: PricingStrategy,
        reason: impl Into<String>,
        changed_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id,
            price,
            currency: currency.into(),
            strategy,
            reason: reason.into(),
            automatic: false,
            changed_by: Some(changed_by),
            recorded_at: chrono::Utc::now().naive_utc(),
        }
    }
}
