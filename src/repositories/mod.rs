//! Storage seams consumed by the pricing services.
//!
//! `ListingStore` covers listings, the append-only price history, and the
//! completed-order ledger. `QuoteCache` is the advisory blob cache; callers
//! log and swallow its failures instead of propagating them.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CacheError, StoreError};
use crate::models::{Listing, Order, PriceHistoryEntry};

pub mod memory;
pub mod sql;

// Re-export all store implementations for convenient access
pub use memory::{MemoryCache, MemoryStore};
pub use sql::SqlStore;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get_listing(&self, id: Uuid) -> StoreResult<Option<Listing>>;

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()>;

    /// Optimistic update: fails with `VersionConflict` when the stored
    /// version no longer matches `listing.version`, otherwise persists the
    /// listing and bumps the stored version by one.
    async fn update_listing(&self, listing: &Listing) -> StoreResult<()>;

    /// Listing update and history append, atomically. Either both are
    /// visible afterwards or neither is.
    async fn commit_price_change(
        &self,
        listing: &Listing,
        entry: &PriceHistoryEntry,
    ) -> StoreResult<()>;

    /// Listing update and order insert, atomically.
    async fn commit_sale(&self, listing: &Listing, order: &Order) -> StoreResult<()>;

    async fn active_listings(&self) -> StoreResult<Vec<Listing>>;

    /// History entries recorded at or after `since`, ascending by time
    async fn price_history_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<PriceHistoryEntry>>;

    async fn insert_order(&self, order: &Order) -> StoreResult<()>;

    /// Completed orders for a listing completed at or after `since`,
    /// ascending by completion time
    async fn completed_orders_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<Order>>;

    /// Completed orders a buyer has placed across all listings
    async fn completed_order_count(&self, buyer_id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait QuoteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}
