use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CacheError, StoreError};
use crate::models::{Listing, ListingStatus, Order, OrderStatus, PriceHistoryEntry};
use crate::repositories::{ListingStore, QuoteCache, StoreResult};

/// In-memory listing store. Backs the test suites and the zero-dependency
/// development mode; the same optimistic-versioning contract as `SqlStore`.
///
/// Lock order is listings, then history, then orders; every multi-map
/// operation takes its guards in that order.
#[derive(Default)]
pub struct MemoryStore {
    listings: RwLock<HashMap<Uuid, Listing>>,
    history: RwLock<Vec<PriceHistoryEntry>>,
    orders: RwLock<Vec<Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_update(stored: &mut HashMap<Uuid, Listing>, listing: &Listing) -> StoreResult<()> {
        let current = stored
            .get(&listing.id)
            .ok_or_else(|| StoreError::NotFound(format!("Listing {}", listing.id)))?;
        if current.version != listing.version {
            return Err(StoreError::VersionConflict {
                id: listing.id,
                expected: listing.version,
            });
        }
        let mut updated = listing.clone();
        updated.version += 1;
        stored.insert(listing.id, updated);
        Ok(())
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn get_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        Ok(self.listings.read().await.get(&id).cloned())
    }

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        let mut listings = self.listings.write().await;
        if listings.contains_key(&listing.id) {
            return Err(StoreError::Duplicate(format!("Listing {}", listing.id)));
        }
        listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_listing(&self, listing: &Listing) -> StoreResult<()> {
        let mut listings = self.listings.write().await;
        Self::apply_update(&mut listings, listing)
    }

    async fn commit_price_change(
        &self,
        listing: &Listing,
        entry: &PriceHistoryEntry,
    ) -> StoreResult<()> {
        let mut listings = self.listings.write().await;
        let mut history = self.history.write().await;
        Self::apply_update(&mut listings, listing)?;
        history.push(entry.clone());
        Ok(())
    }

    async fn commit_sale(&self, listing: &Listing, order: &Order) -> StoreResult<()> {
        let mut listings = self.listings.write().await;
        let mut orders = self.orders.write().await;
        Self::apply_update(&mut listings, listing)?;
        orders.push(order.clone());
        Ok(())
    }

    async fn active_listings(&self) -> StoreResult<Vec<Listing>> {
        let listings = self.listings.read().await;
        let mut active: Vec<Listing> = listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|l| l.created_at);
        Ok(active)
    }

    async fn price_history_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<PriceHistoryEntry>> {
        let history = self.history.read().await;
        let mut entries: Vec<PriceHistoryEntry> = history
            .iter()
            .filter(|e| e.listing_id == listing_id && e.recorded_at >= since)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::Duplicate(format!("Order {}", order.id)));
        }
        orders.push(order.clone());
        Ok(())
    }

    async fn completed_orders_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut completed: Vec<Order> = orders
            .iter()
            .filter(|o| {
                o.listing_id == listing_id
                    && o.status == OrderStatus::Completed
                    && o.completed_at.map(|at| at >= since).unwrap_or(false)
            })
            .cloned()
            .collect();
        completed.sort_by_key(|o| o.completed_at);
        Ok(completed)
    }

    async fn completed_order_count(&self, buyer_id: Uuid) -> StoreResult<u64> {
        let orders = self.orders.read().await;
        Ok(orders
            .iter()
            .filter(|o| o.buyer_id == buyer_id && o.status == OrderStatus::Completed)
            .count() as u64)
    }
}

/// In-memory TTL cache. Expired entries are evicted lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((value, deadline)) if *deadline > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}
