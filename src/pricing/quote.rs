use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, PricingResult};
use crate::models::MarketConditions;
use crate::pricing::params::{PriceTier, StrategyParams};

/// Tolerance for quantity equality checks (bulk all-or-nothing)
pub fn quantity_epsilon() -> Decimal {
    Decimal::new(1, 8) // 1e-8
}

/// True when two quantities are equal within the 8-decimal epsilon
pub fn quantities_match(requested: Decimal, available: Decimal) -> bool {
    (requested - available).abs() < quantity_epsilon()
}

/// Relative magnitude of a price change. `None` when there is no previous
/// price to compare against (callers treat that as "always commit").
pub fn relative_change(old: Decimal, new: Decimal) -> Option<Decimal> {
    if old == Decimal::ZERO {
        None
    } else {
        Some(((new - old) / old).abs())
    }
}

/// The tier a tiered quote resolved to, with its discount versus the
/// listing base price for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTier {
    pub min_quantity: Decimal,
    pub max_quantity: Option<Decimal>,
    pub price_per_unit: Decimal,
    /// Percentage saved against the listing base price, floored at zero
    pub discount_percent: Decimal,
    pub description: Option<String>,
}

/// Raw output of a strategy computation, before discounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyQuote {
    pub price_per_unit: Decimal,
    pub total_price: Decimal,
    pub tier: Option<AppliedTier>,
}

impl StrategyQuote {
    fn per_unit(price_per_unit: Decimal, quantity: Decimal) -> Self {
        Self {
            price_per_unit,
            total_price: price_per_unit * quantity,
            tier: None,
        }
    }
}

/// Multiplicative factors of the dynamic-pricing formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicFactors {
    /// 1 + volatility x 0.1
    pub volatility_factor: Decimal,
    /// 1 + (24h volume / 1,000,000) x 0.05
    pub volume_factor: Decimal,
    /// 1 + 24h price change x 0.5
    pub price_change_factor: Decimal,
}

impl DynamicFactors {
    pub fn from_conditions(conditions: &MarketConditions) -> Self {
        let one = Decimal::ONE;
        Self {
            volatility_factor: one + conditions.volatility * Decimal::new(1, 1),
            volume_factor: one
                + (conditions.volume_24h / Decimal::new(1_000_000, 0)) * Decimal::new(5, 2),
            price_change_factor: one + conditions.price_change_24h * Decimal::new(5, 1),
        }
    }

    /// Product of all three factors
    pub fn multiplier(&self) -> Decimal {
        self.volatility_factor * self.volume_factor * self.price_change_factor
    }

    /// Human-readable descriptions of the factors that moved the price.
    /// Factors within 1% of neutral are omitted.
    pub fn describe(&self) -> Vec<String> {
        let threshold = Decimal::new(1, 2);
        let mut described = Vec::new();
        for (label, factor) in [
            ("Volatility", self.volatility_factor),
            ("Volume", self.volume_factor),
            ("Price change", self.price_change_factor),
        ] {
            if (factor - Decimal::ONE).abs() > threshold {
                described.push(format!("{}: {}", label, factor.round_dp(4)));
            }
        }
        described
    }
}

/// Fixed and Unit strategies: the listing base price, no quantity sensitivity
pub fn fixed_quote(base_price: Decimal, quantity: Decimal) -> StrategyQuote {
    StrategyQuote::per_unit(base_price, quantity)
}

/// Bulk strategy: one flat price for the entire remaining quantity, either
/// configured directly or derived as base price x remaining
pub fn bulk_quote(
    base_price: Option<Decimal>,
    configured_total: Option<Decimal>,
    remaining_quantity: Decimal,
) -> PricingResult<StrategyQuote> {
    if remaining_quantity <= Decimal::ZERO {
        return Err(PricingError::InvalidState(
            "Bulk listing has no remaining quantity to price".to_string(),
        ));
    }
    let total_price = match (configured_total, base_price) {
        (Some(total), _) => total,
        (None, Some(base)) => base * remaining_quantity,
        (None, None) => {
            return Err(PricingError::Config(
                "Bulk listing has neither a configured total price nor a base price".to_string(),
            ))
        }
    };
    Ok(StrategyQuote {
        price_per_unit: total_price / remaining_quantity,
        total_price,
        tier: None,
    })
}

/// Percentage saved against the base price when buying at a tier price,
/// floored at zero for display
pub fn tier_discount_percent(base_price: Option<Decimal>, tier_price: Decimal) -> Decimal {
    match base_price {
        Some(base) if base > Decimal::ZERO => {
            ((base - tier_price) / base * Decimal::new(100, 0)).max(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    }
}

/// Tiered strategy: walk the ladder in ascending min-quantity order and take
/// the first tier containing the quantity; fall back to the last tier, and to
/// a zero price when no tiers are configured at all
pub fn tiered_quote(
    tiers: &[PriceTier],
    base_price: Option<Decimal>,
    quantity: Decimal,
) -> StrategyQuote {
    let selected = tiers
        .iter()
        .find(|tier| tier.contains(quantity))
        .or_else(|| tiers.last());

    match selected {
        Some(tier) => {
            let applied = AppliedTier {
                min_quantity: tier.min_quantity,
                max_quantity: tier.max_quantity,
                price_per_unit: tier.price_per_unit,
                discount_percent: tier_discount_percent(base_price, tier.price_per_unit),
                description: tier.description.clone(),
            };
            StrategyQuote {
                price_per_unit: tier.price_per_unit,
                total_price: tier.price_per_unit * quantity,
                tier: Some(applied),
            }
        }
        None => StrategyQuote {
            price_per_unit: Decimal::ZERO,
            total_price: Decimal::ZERO,
            tier: None,
        },
    }
}

/// MarginFixed strategy: market price plus an absolute markup
pub fn margin_fixed_quote(market_price: Decimal, margin: Decimal, quantity: Decimal) -> StrategyQuote {
    StrategyQuote::per_unit(market_price + margin, quantity)
}

/// MarginPercentage strategy: market price scaled by (1 + percentage)
pub fn margin_percentage_quote(
    market_price: Decimal,
    percentage: Decimal,
    quantity: Decimal,
) -> StrategyQuote {
    StrategyQuote::per_unit(market_price * (Decimal::ONE + percentage), quantity)
}

/// Dynamic strategy: base price scaled by the market-condition multiplier,
/// clamped to `[base x min_multiplier, base x max_multiplier]`.
///
/// Returns the clamped price per unit, the raw multiplier, and the factors.
pub fn dynamic_price(
    base_price: Decimal,
    conditions: &MarketConditions,
    min_multiplier: Decimal,
    max_multiplier: Decimal,
) -> (Decimal, Decimal, DynamicFactors) {
    let factors = DynamicFactors::from_conditions(conditions);
    let multiplier = factors.multiplier();
    let floor = base_price * min_multiplier;
    let ceiling = base_price * max_multiplier;
    let price = (base_price * multiplier).max(floor).min(ceiling);
    (price, multiplier, factors)
}

/// Single dispatch point for all strategies. Pure: market inputs are passed
/// in by the caller, which fetches only what the strategy needs.
pub fn strategy_quote(
    params: &StrategyParams,
    base_price: Option<Decimal>,
    remaining_quantity: Decimal,
    quantity: Decimal,
    market_price: Option<Decimal>,
    conditions: Option<&MarketConditions>,
) -> PricingResult<StrategyQuote> {
    let require_base = |strategy: &str| {
        base_price.ok_or_else(|| {
            PricingError::Config(format!("{} pricing requires a base price", strategy))
        })
    };
    let require_market = || {
        market_price.ok_or_else(|| {
            PricingError::MarketDataUnavailable(
                "No market price available for margin pricing".to_string(),
            )
        })
    };

    match params {
        StrategyParams::Fixed => Ok(fixed_quote(require_base("Fixed")?, quantity)),
        StrategyParams::Unit => Ok(fixed_quote(require_base("Unit")?, quantity)),
        StrategyParams::Bulk { total_price } => {
            bulk_quote(base_price, *total_price, remaining_quantity)
        }
        StrategyParams::Tiered { tiers } => Ok(tiered_quote(tiers, base_price, quantity)),
        StrategyParams::MarginFixed { margin } => {
            Ok(margin_fixed_quote(require_market()?, *margin, quantity))
        }
        StrategyParams::MarginPercentage { percentage } => Ok(margin_percentage_quote(
            require_market()?,
            *percentage,
            quantity,
        )),
        StrategyParams::Dynamic {
            min_multiplier,
            max_multiplier,
        } => {
            let base = require_base("Dynamic")?;
            let conditions = conditions.ok_or_else(|| {
                PricingError::MarketDataUnavailable(
                    "No market conditions available for dynamic pricing".to_string(),
                )
            })?;
            let (price, _, _) = dynamic_price(base, conditions, *min_multiplier, *max_multiplier);
            Ok(StrategyQuote::per_unit(price, quantity))
        }
    }
}
