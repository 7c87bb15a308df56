//! Domain models for the Vendora pricing engine.
//!
//! This module contains the entities the pricing subsystem operates on:
//! listings, their price history, the completed-order ledger, and the
//! transient market-data snapshots.

pub mod listing;
pub mod market;
pub mod order;
pub mod price_history;

// Re-export all models for convenient access
pub use listing::{Asset, Listing, ListingStatus, PricingStrategy};
pub use market::{MarketConditions, MarketPrice};
pub use order::{Order, OrderStatus};
pub use price_history::PriceHistoryEntry;
