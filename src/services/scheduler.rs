use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::repositories::ListingStore;
use crate::services::RepricingService;

/// Background task that periodically sweeps market-driven listings through
/// the repricers. Fixed, unit, bulk and tiered listings are skipped at
/// collection time; they have nothing to reprice.
pub struct RepriceScheduler {
    repricing: Arc<RepricingService>,
    store: Arc<dyn ListingStore>,
    interval: Duration,
    cancel: CancellationToken,
}

impl RepriceScheduler {
    pub fn new(
        repricing: Arc<RepricingService>,
        store: Arc<dyn ListingStore>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repricing,
            store,
            interval,
            cancel,
        }
    }

    /// Run until the cancellation token fires
    pub async fn run(self) {
        let mut ticker = time::interval(self.interval);
        info!("Reprice scheduler started, sweeping every {:?}", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Reprice sweep failed: {}", e);
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("Reprice scheduler stopping");
                    break;
                }
            }
        }
    }

    async fn sweep_once(&self) -> crate::error::PricingResult<()> {
        let listing_ids: Vec<Uuid> = self
            .store
            .active_listings()
            .await?
            .iter()
            .filter(|listing| listing.strategy.is_market_driven())
            .map(|listing| listing.id)
            .collect();

        if listing_ids.is_empty() {
            return Ok(());
        }

        let report = self
            .repricing
            .reprice_listings(&listing_ids, &self.cancel)
            .await;
        info!(
            "Scheduled sweep over {} listings: updated={}, unchanged={}, failed={}",
            listing_ids.len(),
            report.updated,
            report.unchanged,
            report.failed
        );
        Ok(())
    }
}
