use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{PricingError, PricingResult};
use crate::market::MarketDataSource;
use crate::models::{Listing, MarketConditions, PriceHistoryEntry, PricingStrategy};
use crate::pricing::quote::{dynamic_price, relative_change};
use crate::pricing::StrategyParams;
use crate::repositories::ListingStore;
use crate::services::ListingLocks;

/// Service for automatic market-driven repricing
pub struct RepricingService {
    store: Arc<dyn ListingStore>,
    market: Arc<dyn MarketDataSource>,
    locks: Arc<ListingLocks>,
    config: EngineConfig,
}

/// Margin value a reprice applied, in the listing's configured form
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedMargin {
    Fixed(Decimal),
    Percentage(Decimal),
}

/// Outcome of a margin reprice, committed or not
#[derive(Debug, Clone, Serialize)]
pub struct MarginReprice {
    pub listing_id: Uuid,
    pub old_price: Option<Decimal>,
    pub new_price: Decimal,
    pub market_price: Decimal,
    pub margin: AppliedMargin,
    pub updated: bool,
    pub reason: String,
    /// Label of the market-data source consulted
    pub source: String,
}

/// Outcome of a dynamic reprice, committed or not
#[derive(Debug, Clone, Serialize)]
pub struct DynamicReprice {
    pub listing_id: Uuid,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Price the multiplier was applied to
    pub base_price: Decimal,
    pub multiplier: Decimal,
    /// Descriptions of the factors that moved the price
    pub factors: Vec<String>,
    pub updated: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Updated {
        old_price: Option<Decimal>,
        new_price: Decimal,
    },
    Unchanged {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepItem {
    pub listing_id: Uuid,
    pub status: SweepStatus,
}

/// Per-item results and counts for one repricing sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub items: Vec<SweepItem>,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl RepricingService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        market: Arc<dyn MarketDataSource>,
        locks: Arc<ListingLocks>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            market,
            locks,
            config,
        }
    }

    /// Reprice a margin-based listing against the current market price.
    ///
    /// Commits only when `force` is set or the relative change exceeds the
    /// margin threshold; a gated call reports `updated = false` with the
    /// reason, never an error.
    pub async fn update_margin_price(
        &self,
        listing_id: Uuid,
        force: bool,
    ) -> PricingResult<MarginReprice> {
        let listing = self.load(listing_id).await?;
        if !listing.strategy.is_margin_based() {
            return Err(PricingError::WrongStrategy(format!(
                "Listing {} uses {} pricing, not margin-based",
                listing_id,
                listing.strategy.as_str()
            )));
        }

        // Market fetch happens before the per-listing lock so the lock is
        // held only around the read-modify-write.
        let market = self.market.price(&listing.asset).await?;
        if !market.is_valid {
            return Err(PricingError::MarketDataUnavailable(
                market
                    .error
                    .unwrap_or_else(|| format!("No market price for {}", listing.asset.key())),
            ));
        }

        let _guard = self.locks.acquire(listing_id).await;
        let mut listing = self.load(listing_id).await?;
        ensure_repriceable(&listing)?;

        let (candidate, margin) = match &listing.pricing {
            StrategyParams::MarginFixed { margin } => {
                (market.price + *margin, AppliedMargin::Fixed(*margin))
            }
            StrategyParams::MarginPercentage { percentage } => (
                market.price * (Decimal::ONE + *percentage),
                AppliedMargin::Percentage(*percentage),
            ),
            _ => {
                return Err(PricingError::InvalidState(format!(
                    "Listing {} pricing parameters do not match its strategy",
                    listing_id
                )))
            }
        };

        let old_price = listing.base_price;
        let crossed = crosses_threshold(old_price, candidate, self.config.margin_update_threshold);
        let updated = force || crossed;
        let reason = if crossed {
            "price change exceeded threshold"
        } else if force {
            "forced update"
        } else {
            "change below threshold"
        };

        if updated {
            listing.apply_price(candidate);
            let entry = PriceHistoryEntry::automatic(
                listing_id,
                candidate,
                listing.currency.clone(),
                listing.strategy,
                format!(
                    "Margin reprice: market price {} from {}",
                    market.price, market.source
                ),
            );
            self.store.commit_price_change(&listing, &entry).await?;
            info!(
                "Repriced listing {}: {:?} -> {} (market {} from {})",
                listing_id, old_price, candidate, market.price, market.source
            );
        }

        Ok(MarginReprice {
            listing_id,
            old_price,
            new_price: candidate,
            market_price: market.price,
            margin,
            updated,
            reason: reason.to_string(),
            source: market.source,
        })
    }

    /// Reprice a dynamic listing from market conditions, fetching them when
    /// the caller does not supply a snapshot. Commits only when the relative
    /// change exceeds the dynamic threshold.
    pub async fn update_dynamic_price(
        &self,
        listing_id: Uuid,
        conditions: Option<MarketConditions>,
    ) -> PricingResult<DynamicReprice> {
        let listing = self.load(listing_id).await?;
        if listing.strategy != PricingStrategy::Dynamic {
            return Err(PricingError::WrongStrategy(format!(
                "Listing {} uses {} pricing, not dynamic",
                listing_id,
                listing.strategy.as_str()
            )));
        }

        let conditions = match conditions {
            Some(conditions) => conditions,
            None => self.market.conditions(&listing.asset).await?,
        };

        let _guard = self.locks.acquire(listing_id).await;
        let mut listing = self.load(listing_id).await?;
        ensure_repriceable(&listing)?;

        let (min_multiplier, max_multiplier) = match &listing.pricing {
            StrategyParams::Dynamic {
                min_multiplier,
                max_multiplier,
            } => (*min_multiplier, *max_multiplier),
            _ => {
                return Err(PricingError::InvalidState(format!(
                    "Listing {} pricing parameters do not match its strategy",
                    listing_id
                )))
            }
        };
        let base_price = listing.base_price.ok_or_else(|| {
            PricingError::Config(format!("Dynamic listing {} has no base price", listing_id))
        })?;

        let (new_price, multiplier, factors) =
            dynamic_price(base_price, &conditions, min_multiplier, max_multiplier);
        let updated =
            crosses_threshold(Some(base_price), new_price, self.config.dynamic_update_threshold);
        let reason = if updated {
            "price change exceeded threshold"
        } else {
            "change below threshold"
        };

        if updated {
            listing.apply_price(new_price);
            let entry = PriceHistoryEntry::automatic(
                listing_id,
                new_price,
                listing.currency.clone(),
                listing.strategy,
                format!("Dynamic reprice: multiplier {}", multiplier.round_dp(4)),
            );
            self.store.commit_price_change(&listing, &entry).await?;
            info!(
                "Repriced listing {}: {} -> {} (multiplier {})",
                listing_id,
                base_price,
                new_price,
                multiplier.round_dp(4)
            );
        }

        Ok(DynamicReprice {
            listing_id,
            old_price: base_price,
            new_price,
            base_price,
            multiplier,
            factors: factors.describe(),
            updated,
            reason: reason.to_string(),
        })
    }

    /// Run the matching repricer over a set of listings. Items fail
    /// independently; the sweep never aborts early except on cancellation.
    pub async fn reprice_listings(
        &self,
        listing_ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> SweepReport {
        let started = Instant::now();
        let mut items = Vec::with_capacity(listing_ids.len());
        let (mut updated, mut unchanged, mut failed) = (0usize, 0usize, 0usize);

        for &listing_id in listing_ids {
            if cancel.is_cancelled() {
                info!(
                    "Reprice sweep cancelled after {} of {} listings",
                    items.len(),
                    listing_ids.len()
                );
                break;
            }

            let status = match self.reprice_one(listing_id).await {
                Ok((true, old_price, new_price, _)) => {
                    updated += 1;
                    SweepStatus::Updated {
                        old_price,
                        new_price,
                    }
                }
                Ok((false, _, _, reason)) => {
                    unchanged += 1;
                    SweepStatus::Unchanged { reason }
                }
                Err(e) => {
                    if e.is_validation() {
                        warn!("Listing {} rejected by repricer: {}", listing_id, e);
                    } else {
                        error!("Repricing listing {} failed: {}", listing_id, e);
                    }
                    failed += 1;
                    SweepStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            items.push(SweepItem { listing_id, status });
        }

        let report = SweepReport {
            items,
            updated,
            unchanged,
            failed,
            elapsed: started.elapsed(),
        };
        info!(
            "Reprice sweep finished: updated={}, unchanged={}, failed={}, elapsed={:?}",
            report.updated, report.unchanged, report.failed, report.elapsed
        );
        report
    }

    async fn reprice_one(
        &self,
        listing_id: Uuid,
    ) -> PricingResult<(bool, Option<Decimal>, Decimal, String)> {
        let listing = self.load(listing_id).await?;
        match listing.strategy {
            PricingStrategy::MarginFixed | PricingStrategy::MarginPercentage => {
                let outcome = self.update_margin_price(listing_id, false).await?;
                Ok((
                    outcome.updated,
                    outcome.old_price,
                    outcome.new_price,
                    outcome.reason,
                ))
            }
            PricingStrategy::Dynamic => {
                let outcome = self.update_dynamic_price(listing_id, None).await?;
                Ok((
                    outcome.updated,
                    Some(outcome.old_price),
                    outcome.new_price,
                    outcome.reason,
                ))
            }
            other => Err(PricingError::Unsupported(format!(
                "{} listings are not repriced automatically",
                other.as_str()
            ))),
        }
    }

    async fn load(&self, listing_id: Uuid) -> PricingResult<Listing> {
        self.store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| PricingError::NotFound(format!("Listing {}", listing_id)))
    }
}

fn ensure_repriceable(listing: &Listing) -> PricingResult<()> {
    if listing.status.is_terminal() {
        return Err(PricingError::InvalidState(format!(
            "Listing {} is {} and cannot be repriced",
            listing.id,
            listing.status.as_str()
        )));
    }
    Ok(())
}

/// True when the candidate differs enough from the old price to commit.
/// A listing without a price, or priced at zero, always commits.
fn crosses_threshold(old: Option<Decimal>, new: Decimal, threshold: Decimal) -> bool {
    match old {
        None => true,
        Some(old) => match relative_change(old, new) {
            None => true,
            Some(change) => change > threshold,
        },
    }
}
