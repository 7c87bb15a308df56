use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PricingError, PricingResult};
use crate::pricing::StrategyParams;

/// Pricing strategy configured on a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingStrategy {
    Fixed,
    Bulk,
    MarginFixed,
    MarginPercentage,
    Tiered,
    Dynamic,
    Unit,
}

impl PricingStrategy {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(PricingStrategy::Fixed),
            "bulk" => Ok(PricingStrategy::Bulk),
            "margin_fixed" => Ok(PricingStrategy::MarginFixed),
            "margin_percentage" => Ok(PricingStrategy::MarginPercentage),
            "tiered" => Ok(PricingStrategy::Tiered),
            "dynamic" => Ok(PricingStrategy::Dynamic),
            "unit" => Ok(PricingStrategy::Unit),
            _ => Err(format!("Invalid pricing strategy: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingStrategy::Fixed => "fixed",
            PricingStrategy::Bulk => "bulk",
            PricingStrategy::MarginFixed => "margin_fixed",
            PricingStrategy::MarginPercentage => "margin_percentage",
            PricingStrategy::Tiered => "tiered",
            PricingStrategy::Dynamic => "dynamic",
            PricingStrategy::Unit => "unit",
        }
    }

    /// Strategies priced off a live market quote
    pub fn is_margin_based(&self) -> bool {
        matches!(
            self,
            PricingStrategy::MarginFixed | PricingStrategy::MarginPercentage
        )
    }

    /// Strategies the automatic repricer is responsible for
    pub fn is_market_driven(&self) -> bool {
        self.is_margin_based() || matches!(self, PricingStrategy::Dynamic)
    }
}

impl From<String> for PricingStrategy {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(PricingStrategy::Fixed)
    }
}

impl From<PricingStrategy> for String {
    fn from(strategy: PricingStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

/// Listing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Active,
    SoldOut,
    Cancelled,
}

impl ListingStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ListingStatus::Draft),
            "active" => Ok(ListingStatus::Active),
            "sold_out" => Ok(ListingStatus::SoldOut),
            "cancelled" => Ok(ListingStatus::Cancelled),
            _ => Err(format!("Invalid listing status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Active => "active",
            ListingStatus::SoldOut => "sold_out",
            ListingStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states cannot transition further
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::SoldOut | ListingStatus::Cancelled)
    }
}

impl From<String> for ListingStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(ListingStatus::Draft)
    }
}

impl From<ListingStatus> for String {
    fn from(status: ListingStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Asset a listing sells: a platform token or an external crypto symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Asset {
    Token { token_id: Uuid },
    Crypto { symbol: String },
}

impl Asset {
    pub fn token(token_id: Uuid) -> Self {
        Asset::Token { token_id }
    }

    pub fn crypto(symbol: impl Into<String>) -> Self {
        Asset::Crypto {
            symbol: symbol.into().to_uppercase(),
        }
    }

    /// Stable key used in cache keys and log lines
    pub fn key(&self) -> String {
        match self {
            Asset::Token { token_id } => format!("token:{}", token_id),
            Asset::Crypto { symbol } => format!("crypto:{}", symbol),
        }
    }

    /// Reassemble from the flattened database columns
    pub fn from_parts(
        kind: &str,
        symbol: Option<String>,
        token_id: Option<Uuid>,
    ) -> Result<Self, String> {
        match kind {
            "token" => token_id
                .map(|token_id| Asset::Token { token_id })
                .ok_or_else(|| "Token asset is missing token_id".to_string()),
            "crypto" => symbol
                .map(|symbol| Asset::Crypto { symbol })
                .ok_or_else(|| "Crypto asset is missing symbol".to_string()),
            _ => Err(format!("Invalid asset kind: {}", kind)),
        }
    }

    /// Database string for the asset kind
    pub fn kind_str(&self) -> &'static str {
        match self {
            Asset::Token { .. } => "token",
            Asset::Crypto { .. } => "crypto",
        }
    }
}

/// Listing model, the pricing subject. `version` is bumped by the store on
/// every update and checked optimistically so concurrent writers cannot
/// silently drop each other's changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub asset: Asset,
    pub strategy: PricingStrategy,
    /// Current authoritative price per unit. Margin-priced listings start
    /// without one until the first reprice commits.
    pub base_price: Option<Decimal>,
    pub pricing: StrategyParams,
    pub total_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub min_purchase_quantity: Decimal,
    pub max_purchase_quantity: Option<Decimal>,
    pub currency: String,
    pub status: ListingStatus,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Listing {
    /// Create a new Draft listing. The strategy configuration document is
    /// decoded once here; it is not re-parsed per price calculation.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seller_id: Uuid,
        asset: Asset,
        strategy: PricingStrategy,
        base_price: Option<Decimal>,
        pricing_config: &serde_json::Value,
        total_quantity: Decimal,
        min_purchase_quantity: Decimal,
        max_purchase_quantity: Option<Decimal>,
        currency: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            seller_id,
            asset,
            strategy,
            base_price,
            pricing: StrategyParams::decode(strategy, pricing_config),
            total_quantity,
            remaining_quantity: total_quantity,
            min_purchase_quantity,
            max_purchase_quantity,
            currency: currency.into(),
            status: ListingStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    /// Reject any operation that requires an Active listing
    pub fn ensure_active(&self) -> PricingResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(PricingError::InvalidState(format!(
                "Listing {} is not active (status: {})",
                self.id,
                self.status.as_str()
            )))
        }
    }

    /// Validate the listing and move it from Draft to Active
    pub fn activate(&mut self) -> PricingResult<()> {
        if self.status != ListingStatus::Draft {
            return Err(PricingError::InvalidState(format!(
                "Listing {} cannot be activated from status {}",
                self.id,
                self.status.as_str()
            )));
        }
        self.validate()?;
        self.status = ListingStatus::Active;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Structural validation, applied on activation
    pub fn validate(&self) -> PricingResult<()> {
        if self.total_quantity <= Decimal::ZERO {
            return Err(PricingError::InvalidArgument(
                "Total quantity must be greater than zero".to_string(),
            ));
        }
        if self.remaining_quantity < Decimal::ZERO || self.remaining_quantity > self.total_quantity
        {
            return Err(PricingError::InvalidArgument(format!(
                "Remaining quantity {} must be between 0 and the total quantity {}",
                self.remaining_quantity, self.total_quantity
            )));
        }
        if self.min_purchase_quantity < Decimal::ZERO {
            return Err(PricingError::InvalidArgument(
                "Minimum purchase quantity must not be negative".to_string(),
            ));
        }
        if let Some(max) = self.max_purchase_quantity {
            if max < self.min_purchase_quantity {
                return Err(PricingError::InvalidArgument(format!(
                    "Maximum purchase quantity {} is below the minimum purchase quantity {}",
                    max, self.min_purchase_quantity
                )));
            }
        }
        if self.currency.trim().is_empty() {
            return Err(PricingError::InvalidArgument(
                "Currency must not be empty".to_string(),
            ));
        }
        // Strategies priced off the listing itself need a base price up front;
        // margin strategies get one from the first committed reprice.
        let needs_base = matches!(
            self.strategy,
            PricingStrategy::Fixed | PricingStrategy::Unit | PricingStrategy::Dynamic
        );
        if needs_base && self.base_price.is_none() {
            return Err(PricingError::Config(format!(
                "Listing {} uses the {} strategy and requires a base price",
                self.id,
                self.strategy.as_str()
            )));
        }
        if self.strategy == PricingStrategy::Bulk
            && self.base_price.is_none()
            && self.pricing.bulk_total_price().is_none()
        {
            return Err(PricingError::Config(format!(
                "Bulk listing {} requires either a base price or a configured total price",
                self.id
            )));
        }
        Ok(())
    }

    /// Check a requested purchase quantity against the listing bounds
    pub fn check_purchase_quantity(&self, quantity: Decimal) -> PricingResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(PricingError::InvalidArgument(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        if quantity < self.min_purchase_quantity {
            return Err(PricingError::InvalidArgument(format!(
                "Quantity {} is below the minimum purchase quantity {}",
                quantity, self.min_purchase_quantity
            )));
        }
        if let Some(max) = self.max_purchase_quantity {
            if quantity > max {
                return Err(PricingError::InvalidArgument(format!(
                    "Quantity {} exceeds the maximum purchase quantity {}",
                    quantity, max
                )));
            }
        }
        if quantity > self.remaining_quantity {
            return Err(PricingError::InvalidArgument(format!(
                "Quantity {} exceeds the remaining quantity {}",
                quantity, self.remaining_quantity
            )));
        }
        Ok(())
    }

    /// Record a sale: decrement remaining quantity, flipping to SoldOut at zero
    pub fn record_sale(&mut self, quantity: Decimal) -> PricingResult<()> {
        self.ensure_active()?;
        self.check_purchase_quantity(quantity)?;
        self.remaining_quantity -= quantity;
        if self.remaining_quantity == Decimal::ZERO {
            self.status = ListingStatus::SoldOut;
        }
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// Set a newly committed price
    pub fn apply_price(&mut self, price: Decimal) {
        self.base_price = Some(price);
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}
