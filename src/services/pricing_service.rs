use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{PricingError, PricingResult};
use crate::market::MarketDataSource;
use crate::models::{Listing, Order, PriceHistoryEntry, PricingStrategy};
use crate::pricing::quote::{bulk_quote, quantities_match, strategy_quote};
use crate::pricing::AppliedTier;
use crate::repositories::{ListingStore, QuoteCache};
use crate::services::ListingLocks;

/// Service for quoting and selling listings
pub struct PricingService {
    store: Arc<dyn ListingStore>,
    market: Arc<dyn MarketDataSource>,
    cache: Arc<dyn QuoteCache>,
    locks: Arc<ListingLocks>,
    config: EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Volume,
    Loyalty,
}

/// One discount applied to a quote, with its computed amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub kind: DiscountKind,
    pub percentage: Decimal,
    pub amount: Decimal,
    pub description: String,
}

/// Itemized price for a requested quantity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    pub listing_id: Uuid,
    pub strategy: PricingStrategy,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    /// Strategy price before discounts
    pub subtotal: Decimal,
    /// Final price after discounts
    pub total_price: Decimal,
    pub currency: String,
    pub tier: Option<AppliedTier>,
    pub discounts: Vec<AppliedDiscount>,
}

/// Result of checking a bulk purchase against the remaining quantity
#[derive(Debug, Clone, Serialize)]
pub struct BulkValidation {
    pub listing_id: Uuid,
    pub valid: bool,
    pub required_quantity: Decimal,
    pub requested_quantity: Decimal,
    pub total_price: Decimal,
    pub error: Option<String>,
}

/// A committed sale: the order written and the quote it was priced from
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub order: Order,
    pub quote: PriceQuote,
}

impl PricingService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        market: Arc<dyn MarketDataSource>,
        cache: Arc<dyn QuoteCache>,
        locks: Arc<ListingLocks>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            market,
            cache,
            locks,
            config,
        }
    }

    /// Price a quantity of a listing under its strategy and business rules.
    ///
    /// Only quotes without a buyer go through the cache, in both directions:
    /// buyer quotes can carry a loyalty discount, so caching or serving them
    /// under the buyer-agnostic key would leak one buyer's discount into
    /// another's quote.
    pub async fn calculate_price(
        &self,
        listing_id: Uuid,
        quantity: Decimal,
        buyer_id: Option<Uuid>,
    ) -> PricingResult<PriceQuote> {
        let listing = self.load_listing(listing_id).await?;
        listing.ensure_active()?;
        listing.check_purchase_quantity(quantity)?;

        let cache_key = quote_cache_key(listing_id, quantity);
        if buyer_id.is_none() {
            if let Some(quote) = self.cached_quote(&cache_key).await {
                return Ok(quote);
            }
        }

        let quote = self.build_quote(&listing, quantity, buyer_id).await?;
        if buyer_id.is_none() {
            self.store_quote(&cache_key, &quote).await;
        }

        info!(
            "Priced listing {}: strategy={}, quantity={}, total={}",
            listing_id,
            listing.strategy.as_str(),
            quantity,
            quote.total_price
        );
        Ok(quote)
    }

    /// Check an all-or-nothing bulk purchase. Valid only when the requested
    /// quantity equals the remaining quantity within the shared epsilon.
    pub async fn validate_bulk_purchase(
        &self,
        listing_id: Uuid,
        requested_quantity: Decimal,
    ) -> PricingResult<BulkValidation> {
        let listing = self.load_listing(listing_id).await?;
        listing.ensure_active()?;
        if listing.strategy != PricingStrategy::Bulk {
            return Err(PricingError::WrongStrategy(format!(
                "Listing {} uses {} pricing, not bulk",
                listing_id,
                listing.strategy.as_str()
            )));
        }

        let quote = bulk_quote(
            listing.base_price,
            listing.pricing.bulk_total_price(),
            listing.remaining_quantity,
        )?;
        let valid = quantities_match(requested_quantity, listing.remaining_quantity);

        Ok(BulkValidation {
            listing_id,
            valid,
            required_quantity: listing.remaining_quantity,
            requested_quantity,
            total_price: quote.total_price,
            error: if valid {
                None
            } else {
                Some(format!(
                    "Bulk purchases must take the entire listing: required quantity is {}",
                    listing.remaining_quantity
                ))
            },
        })
    }

    /// Commit a seller-initiated price change, recording who made it.
    /// The new price becomes the listing's authoritative base price.
    pub async fn update_listing_price(
        &self,
        listing_id: Uuid,
        new_price: Decimal,
        changed_by: Uuid,
        reason: impl Into<String>,
    ) -> PricingResult<PriceHistoryEntry> {
        if new_price <= Decimal::ZERO {
            return Err(PricingError::InvalidArgument(
                "Price must be greater than zero".to_string(),
            ));
        }

        let _guard = self.locks.acquire(listing_id).await;
        let mut listing = self.load_listing(listing_id).await?;
        listing.ensure_active()?;

        let old_price = listing.base_price;
        listing.apply_price(new_price);
        let entry = PriceHistoryEntry::manual(
            listing_id,
            new_price,
            listing.currency.clone(),
            listing.strategy,
            reason,
            changed_by,
        );
        self.store.commit_price_change(&listing, &entry).await?;

        info!(
            "Manual price change on listing {}: {:?} -> {} by {}",
            listing_id, old_price, new_price, changed_by
        );
        Ok(entry)
    }

    /// Price and commit a sale, decrementing the remaining quantity and
    /// writing the completed order in one transaction.
    pub async fn record_sale(
        &self,
        listing_id: Uuid,
        buyer_id: Uuid,
        quantity: Decimal,
    ) -> PricingResult<SaleOutcome> {
        let _guard = self.locks.acquire(listing_id).await;

        let mut listing = self.load_listing(listing_id).await?;
        listing.ensure_active()?;
        listing.check_purchase_quantity(quantity)?;
        if listing.strategy == PricingStrategy::Bulk
            && !quantities_match(quantity, listing.remaining_quantity)
        {
            return Err(PricingError::InvalidArgument(format!(
                "Bulk purchases must take the entire listing: required quantity is {}",
                listing.remaining_quantity
            )));
        }

        let quote = self.build_quote(&listing, quantity, Some(buyer_id)).await?;
        listing.record_sale(quantity)?;

        let order = Order::completed(
            listing_id,
            buyer_id,
            quantity,
            quote.price_per_unit,
            quote.total_price,
            listing.currency.clone(),
        );
        self.store.commit_sale(&listing, &order).await?;

        info!(
            "Sale recorded: listing={}, buyer={}, quantity={}, total={}",
            listing_id, buyer_id, quantity, quote.total_price
        );
        Ok(SaleOutcome { order, quote })
    }

    async fn load_listing(&self, listing_id: Uuid) -> PricingResult<Listing> {
        self.store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| PricingError::NotFound(format!("Listing {}", listing_id)))
    }

    /// Strategy price plus discounts. Fetches only the market inputs the
    /// listing's strategy needs.
    async fn build_quote(
        &self,
        listing: &Listing,
        quantity: Decimal,
        buyer_id: Option<Uuid>,
    ) -> PricingResult<PriceQuote> {
        let market_price = if listing.strategy.is_margin_based() {
            let price = self.market.price(&listing.asset).await?;
            if !price.is_valid {
                return Err(PricingError::MarketDataUnavailable(
                    price
                        .error
                        .unwrap_or_else(|| "Upstream could not price the asset".to_string()),
                ));
            }
            Some(price.price)
        } else {
            None
        };

        let conditions = if listing.strategy == PricingStrategy::Dynamic {
            Some(self.market.conditions(&listing.asset).await?)
        } else {
            None
        };

        let strategy = strategy_quote(
            &listing.pricing,
            listing.base_price,
            listing.remaining_quantity,
            quantity,
            market_price,
            conditions.as_ref(),
        )?;

        let mut quote = PriceQuote {
            listing_id: listing.id,
            strategy: listing.strategy,
            quantity,
            price_per_unit: strategy.price_per_unit,
            subtotal: strategy.total_price,
            total_price: strategy.total_price,
            currency: listing.currency.clone(),
            tier: strategy.tier,
            discounts: Vec::new(),
        };
        self.apply_discounts(listing, quantity, buyer_id, &mut quote)
            .await?;
        Ok(quote)
    }

    /// Volume first, then loyalty on the already-discounted total
    async fn apply_discounts(
        &self,
        listing: &Listing,
        quantity: Decimal,
        buyer_id: Option<Uuid>,
        quote: &mut PriceQuote,
    ) -> PricingResult<()> {
        let hundred = Decimal::new(100, 0);

        if quantity >= self.config.volume_discount_threshold
            && listing.strategy != PricingStrategy::Bulk
        {
            let percentage = self.config.volume_discount_percent;
            let amount = quote.total_price * percentage / hundred;
            quote.total_price -= amount;
            quote.discounts.push(AppliedDiscount {
                kind: DiscountKind::Volume,
                percentage,
                amount,
                description: format!(
                    "Volume discount: {}% off for quantities of {} or more",
                    percentage, self.config.volume_discount_threshold
                ),
            });
        }

        if let Some(buyer) = buyer_id {
            let completed = self.store.completed_order_count(buyer).await?;
            if completed >= self.config.loyalty_order_threshold {
                let percentage = self.config.loyalty_discount_percent;
                let amount = quote.total_price * percentage / hundred;
                quote.total_price -= amount;
                quote.discounts.push(AppliedDiscount {
                    kind: DiscountKind::Loyalty,
                    percentage,
                    amount,
                    description: format!(
                        "Loyalty discount: {}% off after {} completed orders",
                        percentage, self.config.loyalty_order_threshold
                    ),
                });
            }
        }
        Ok(())
    }

    async fn cached_quote(&self, key: &str) -> Option<PriceQuote> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<PriceQuote>(&raw) {
                Ok(quote) => Some(quote),
                Err(e) => {
                    warn!("Discarding undecodable cached quote {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Quote cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    /// Best-effort cache write; failures are logged, never propagated
    async fn store_quote(&self, key: &str, quote: &PriceQuote) {
        match serde_json::to_string(quote) {
            Ok(raw) => {
                if let Err(e) = self
                    .cache
                    .set(key, &raw, self.config.quote_cache_ttl())
                    .await
                {
                    warn!("Quote cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => warn!("Unencodable quote for {}: {}", key, e),
        }
    }
}

fn quote_cache_key(listing_id: Uuid, quantity: Decimal) -> String {
    format!("pricing:quote:{}:{}", listing_id, quantity.normalize())
}
