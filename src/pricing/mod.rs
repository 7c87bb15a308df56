//! Pure pricing computations: strategy parameters and per-strategy quote math.
//!
//! Everything in this module is synchronous and side-effect free; the service
//! layer provides listings, market data, and persistence around it.

pub mod params;
pub mod quote;

pub use params::{PriceTier, StrategyParams};
pub use quote::{AppliedTier, DynamicFactors, StrategyQuote};
