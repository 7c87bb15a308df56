pub mod analytics_service;
pub mod pricing_service;
pub mod repricing_service;
pub mod scheduler;

pub use analytics_service::AnalyticsService;
pub use pricing_service::PricingService;
pub use repricing_service::RepricingService;
pub use scheduler::RepriceScheduler;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-listing write locks serializing repricing and sales on the same
/// listing. The store's version check still backstops writers that bypass
/// the lock. Entries are never pruned; the live listing set stays small.
#[derive(Default)]
pub struct ListingLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ListingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for one listing, creating it on first use
    pub async fn acquire(&self, listing_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(listing_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
