use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{PricingError, PricingResult};
use crate::models::Asset;
use crate::repositories::ListingStore;

/// Service for pricing analytics over history and completed orders
pub struct AnalyticsService {
    store: Arc<dyn ListingStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceTrend {
    Bullish,
    Bearish,
    Stable,
}

impl PriceTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTrend::Bullish => "Bullish",
            PriceTrend::Bearish => "Bearish",
            PriceTrend::Stable => "Stable",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PricePoint {
    pub price: Decimal,
    pub recorded_at: NaiveDateTime,
}

/// Price and sales statistics for one listing over a period
#[derive(Debug, Clone, Serialize)]
pub struct PricingAnalytics {
    pub listing_id: Uuid,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub price_points: Vec<PricePoint>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub average_price: Option<Decimal>,
    pub price_change_count: usize,
    pub total_volume: Decimal,
    pub total_revenue: Decimal,
    pub average_order_size: Decimal,
    /// Direction over the trailing 24 hours of the period
    pub trend: PriceTrend,
    /// Population standard deviation of prices divided by their mean
    pub volatility: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub listing_id: Uuid,
    pub trend: PriceTrend,
    pub change_percent: Decimal,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: Decimal,
    pub listing_count: usize,
}

/// Order-book-style ladder aggregated from active listings.
#[derive(Debug, Clone, Serialize)]
pub struct MarketDepth {
    pub asset: Asset,
    /// Ask levels in ascending price order
    pub asks: Vec<DepthLevel>,
    /// Always empty: there is no pending-buy-order ledger to aggregate
    pub bids: Vec<DepthLevel>,
    pub generated_at: NaiveDateTime,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    /// Aggregate price history and completed orders over `[now - period, now]`
    pub async fn pricing_analytics(
        &self,
        listing_id: Uuid,
        period: chrono::Duration,
    ) -> PricingResult<PricingAnalytics> {
        self.ensure_exists(listing_id).await?;

        let to = chrono::Utc::now().naive_utc();
        let from = to - period;

        let history = self.store.price_history_since(listing_id, from).await?;
        let orders = self.store.completed_orders_since(listing_id, from).await?;

        let price_points: Vec<PricePoint> = history
            .iter()
            .map(|entry| PricePoint {
                price: entry.price,
                recorded_at: entry.recorded_at,
            })
            .collect();
        let prices: Vec<Decimal> = price_points.iter().map(|p| p.price).collect();

        let min_price = prices.iter().copied().min();
        let max_price = prices.iter().copied().max();
        let average_price = if prices.is_empty() {
            None
        } else {
            Some(prices.iter().copied().sum::<Decimal>() / Decimal::from(prices.len() as u64))
        };

        let total_volume: Decimal = orders.iter().map(|o| o.quantity).sum();
        let total_revenue: Decimal = orders.iter().map(|o| o.total_price).sum();
        let average_order_size = if orders.is_empty() {
            Decimal::ZERO
        } else {
            total_volume / Decimal::from(orders.len() as u64)
        };

        let trend = trend_over_window(&price_points, to - chrono::Duration::hours(24));

        info!(
            "Analytics for listing {}: {} price points, {} orders over {}h",
            listing_id,
            price_points.len(),
            orders.len(),
            period.num_hours()
        );

        Ok(PricingAnalytics {
            listing_id,
            from,
            to,
            min_price,
            max_price,
            average_price,
            price_change_count: price_points.len(),
            total_volume,
            total_revenue,
            average_order_size,
            trend,
            volatility: volatility(&prices),
            price_points,
        })
    }

    /// Classify the price direction over the trailing 24 hours
    pub async fn price_trend(&self, listing_id: Uuid) -> PricingResult<TrendReport> {
        self.ensure_exists(listing_id).await?;

        let now = chrono::Utc::now().naive_utc();
        let history = self
            .store
            .price_history_since(listing_id, now - chrono::Duration::hours(24))
            .await?;

        let change_percent = match (history.first(), history.last()) {
            (Some(first), Some(last)) if history.len() >= 2 && first.price > Decimal::ZERO => {
                (last.price - first.price) / first.price * Decimal::new(100, 0)
            }
            _ => Decimal::ZERO,
        };

        Ok(TrendReport {
            listing_id,
            trend: classify(change_percent, history.len()),
            change_percent,
            sample_count: history.len(),
        })
    }

    /// Aggregate active listings for an asset into ask levels by price
    pub async fn market_depth(&self, asset: &Asset) -> PricingResult<MarketDepth> {
        let listings = self.store.active_listings().await?;

        let mut levels: BTreeMap<Decimal, (Decimal, usize)> = BTreeMap::new();
        for listing in listings.iter().filter(|l| &l.asset == asset) {
            let Some(price) = listing.base_price else {
                continue;
            };
            let level = levels.entry(price).or_insert((Decimal::ZERO, 0));
            level.0 += listing.remaining_quantity;
            level.1 += 1;
        }

        let asks = levels
            .into_iter()
            .map(|(price, (quantity, listing_count))| DepthLevel {
                price,
                quantity,
                listing_count,
            })
            .collect();

        Ok(MarketDepth {
            asset: asset.clone(),
            asks,
            bids: Vec::new(),
            generated_at: chrono::Utc::now().naive_utc(),
        })
    }

    async fn ensure_exists(&self, listing_id: Uuid) -> PricingResult<()> {
        self.store
            .get_listing(listing_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| PricingError::NotFound(format!("Listing {}", listing_id)))
    }
}

/// Trend over the points recorded at or after `window_start`. Fewer than two
/// points in the window, or a zero first price, classify as Stable.
fn trend_over_window(points: &[PricePoint], window_start: NaiveDateTime) -> PriceTrend {
    let window: Vec<&PricePoint> = points
        .iter()
        .filter(|p| p.recorded_at >= window_start)
        .collect();

    match (window.first(), window.last()) {
        (Some(first), Some(last)) if window.len() >= 2 && first.price > Decimal::ZERO => {
            let change_percent =
                (last.price - first.price) / first.price * Decimal::new(100, 0);
            classify(change_percent, window.len())
        }
        _ => PriceTrend::Stable,
    }
}

fn classify(change_percent: Decimal, sample_count: usize) -> PriceTrend {
    let threshold = Decimal::new(5, 0);
    if sample_count < 2 {
        PriceTrend::Stable
    } else if change_percent > threshold {
        PriceTrend::Bullish
    } else if change_percent < -threshold {
        PriceTrend::Bearish
    } else {
        PriceTrend::Stable
    }
}

/// Population standard deviation over mean. Decimal has no square root, so
/// the variance math goes through f64 and back.
fn volatility(prices: &[Decimal]) -> Decimal {
    if prices.len() < 2 {
        return Decimal::ZERO;
    }
    let values: Vec<f64> = prices
        .iter()
        .map(|p| p.to_f64().unwrap_or(0.0))
        .collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return Decimal::ZERO;
    }
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    Decimal::from_f64_retain(variance.sqrt() / mean).unwrap_or_default()
}
