use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::PricingStrategy;

/// Default markup for margin-percentage listings that configure no value
pub fn default_margin_percentage() -> Decimal {
    Decimal::new(20, 2)
}

/// Default dynamic-pricing multiplier bounds
pub fn default_min_multiplier() -> Decimal {
    Decimal::new(5, 1)
}

pub fn default_max_multiplier() -> Decimal {
    Decimal::new(2, 0)
}

/// One quantity tier of a tiered-pricing ladder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTier {
    pub min_quantity: Decimal,
    /// Upper bound, inclusive; `None` leaves the tier open-ended
    pub max_quantity: Option<Decimal>,
    pub price_per_unit: Decimal,
    pub description: Option<String>,
}

impl PriceTier {
    /// Whether a requested quantity falls inside this tier
    pub fn contains(&self, quantity: Decimal) -> bool {
        if quantity < self.min_quantity {
            return false;
        }
        match self.max_quantity {
            Some(max) => quantity <= max,
            None => true,
        }
    }
}

/// Strategy-specific pricing parameters, one variant per strategy.
///
/// Decoded once from the seller-supplied configuration document when the
/// listing is created, never re-parsed during price calculation. Decoding is
/// deliberately tolerant: a malformed document degrades to the strategy's
/// defaults with a warning rather than failing the listing, so a bad
/// configuration shows up in logs instead of breaking quoting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyParams {
    Fixed,
    Unit,
    Bulk {
        /// Flat price for the whole remaining quantity; falls back to
        /// base price x remaining quantity when absent
        total_price: Option<Decimal>,
    },
    Tiered {
        /// Sorted ascending by `min_quantity`
        tiers: Vec<PriceTier>,
    },
    MarginFixed {
        /// Absolute markup added to the market price
        margin: Decimal,
    },
    MarginPercentage {
        /// Fractional markup over the market price (0.20 = +20%)
        percentage: Decimal,
    },
    Dynamic {
        min_multiplier: Decimal,
        max_multiplier: Decimal,
    },
}

impl StrategyParams {
    /// Decode the configuration document for a strategy.
    ///
    /// Unknown keys are ignored. Missing or unparseable fields fall back to
    /// defaults; anything that degrades emits a warning.
    pub fn decode(strategy: PricingStrategy, raw: &Value) -> Self {
        if !raw.is_null() && !raw.is_object() {
            warn!(
                "Malformed pricing configuration for {} strategy, using defaults: {}",
                strategy.as_str(),
                raw
            );
            return Self::defaults(strategy);
        }

        match strategy {
            PricingStrategy::Fixed => StrategyParams::Fixed,
            PricingStrategy::Unit => StrategyParams::Unit,
            PricingStrategy::Bulk => StrategyParams::Bulk {
                total_price: decimal_field(raw, "total_price", PricingStrategy::Bulk),
            },
            PricingStrategy::Tiered => StrategyParams::Tiered {
                tiers: decode_tiers(raw),
            },
            PricingStrategy::MarginFixed => StrategyParams::MarginFixed {
                margin: decimal_field(raw, "margin", PricingStrategy::MarginFixed)
                    .unwrap_or(Decimal::ZERO),
            },
            PricingStrategy::MarginPercentage => StrategyParams::MarginPercentage {
                percentage: decimal_field(raw, "percentage", PricingStrategy::MarginPercentage)
                    .unwrap_or_else(default_margin_percentage),
            },
            PricingStrategy::Dynamic => decode_dynamic(raw),
        }
    }

    /// Defaults for a strategy with no usable configuration
    pub fn defaults(strategy: PricingStrategy) -> Self {
        match strategy {
            PricingStrategy::Fixed => StrategyParams::Fixed,
            PricingStrategy::Unit => StrategyParams::Unit,
            PricingStrategy::Bulk => StrategyParams::Bulk { total_price: None },
            PricingStrategy::Tiered => StrategyParams::Tiered { tiers: Vec::new() },
            PricingStrategy::MarginFixed => StrategyParams::MarginFixed {
                margin: Decimal::ZERO,
            },
            PricingStrategy::MarginPercentage => StrategyParams::MarginPercentage {
                percentage: default_margin_percentage(),
            },
            PricingStrategy::Dynamic => StrategyParams::Dynamic {
                min_multiplier: default_min_multiplier(),
                max_multiplier: default_max_multiplier(),
            },
        }
    }

    /// The strategy these parameters belong to
    pub fn strategy(&self) -> PricingStrategy {
        match self {
            StrategyParams::Fixed => PricingStrategy::Fixed,
            StrategyParams::Unit => PricingStrategy::Unit,
            StrategyParams::Bulk { .. } => PricingStrategy::Bulk,
            StrategyParams::Tiered { .. } => PricingStrategy::Tiered,
            StrategyParams::MarginFixed { .. } => PricingStrategy::MarginFixed,
            StrategyParams::MarginPercentage { .. } => PricingStrategy::MarginPercentage,
            StrategyParams::Dynamic { .. } => PricingStrategy::Dynamic,
        }
    }

    /// Configured flat total for a Bulk listing, if any
    pub fn bulk_total_price(&self) -> Option<Decimal> {
        match self {
            StrategyParams::Bulk { total_price } => *total_price,
            _ => None,
        }
    }
}

/// Read a decimal field, accepting both JSON numbers and numeric strings.
/// Numbers go through their literal representation so no float rounding
/// sneaks into money values.
fn decimal_field(raw: &Value, key: &str, strategy: PricingStrategy) -> Option<Decimal> {
    let value = raw.get(key)?;
    let parsed = match value {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        Value::String(s) => s.parse::<Decimal>().ok(),
        _ => None,
    };
    if parsed.is_none() {
        warn!(
            "Unparseable '{}' in {} pricing configuration, using default: {}",
            key,
            strategy.as_str(),
            value
        );
    }
    parsed
}

fn decode_tiers(raw: &Value) -> Vec<PriceTier> {
    let entries = match raw.get("tiers") {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!("'tiers' in tiered pricing configuration is not an array: {}", other);
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut tiers = Vec::with_capacity(entries.len());
    for entry in entries {
        let min_quantity = decimal_field(entry, "min_quantity", PricingStrategy::Tiered);
        let price_per_unit = decimal_field(entry, "price_per_unit", PricingStrategy::Tiered);
        let (Some(min_quantity), Some(price_per_unit)) = (min_quantity, price_per_unit) else {
            warn!("Skipping tier without min_quantity/price_per_unit: {}", entry);
            continue;
        };
        let max_quantity = match entry.get("max_quantity") {
            None | Some(Value::Null) => None,
            Some(_) => decimal_field(entry, "max_quantity", PricingStrategy::Tiered),
        };
        let description = entry
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        tiers.push(PriceTier {
            min_quantity,
            max_quantity,
            price_per_unit,
            description,
        });
    }

    // Tier selection walks the ladder in ascending order
    tiers.sort_by(|a, b| a.min_quantity.cmp(&b.min_quantity));
    tiers
}

fn decode_dynamic(raw: &Value) -> StrategyParams {
    let min_multiplier = decimal_field(raw, "min_multiplier", PricingStrategy::Dynamic)
        .unwrap_or_else(default_min_multiplier);
    let max_multiplier = decimal_field(raw, "max_multiplier", PricingStrategy::Dynamic)
        .unwrap_or_else(default_max_multiplier);

    if min_multiplier <= Decimal::ZERO || max_multiplier < min_multiplier {
        warn!(
            "Invalid dynamic multiplier bounds [{}, {}], using defaults",
            min_multiplier, max_multiplier
        );
        return StrategyParams::Dynamic {
            min_multiplier: default_min_multiplier(),
            max_multiplier: default_max_multiplier(),
        };
    }

    StrategyParams::Dynamic {
        min_multiplier,
        max_multiplier,
    }
}
