use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(OrderStatus::Pending)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Order model representing a purchase against a listing. Completed orders
/// back the loyalty discount and the analytics volume/revenue figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: Uuid,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub total_price: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Order {
    /// Create an already-completed order. Settlement/escrow happens outside
    /// this service, so sales recorded here complete immediately.
    pub fn completed(
        listing_id: Uuid,
        buyer_id: Uuid,
        quantity: Decimal,
        price_per_unit: Decimal,
        total_price: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4(),
            listing_id,
            buyer_id,
            quantity,
            price_per_unit,
            total_price,
            currency: currency.into(),
            status: OrderStatus::Completed,
            created_at: now,
            completed_at: Some(now),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }
}
