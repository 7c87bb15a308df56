use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::models::{
    Asset, Listing, ListingStatus, Order, OrderStatus, PriceHistoryEntry, PricingStrategy,
};
use crate::pricing::StrategyParams;
use crate::repositories::{ListingStore, StoreResult};

/// SQLite-backed listing store.
///
/// Decimals and uuids are stored as TEXT and parsed back on load; timestamps
/// are stored as INTEGER microseconds so range queries compare numerically.
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open a connection pool for the configured database
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(StoreError::Query)?
            .create_if_missing(true);

        // An in-memory sqlite database exists per connection; more than one
        // connection would see disjoint data.
        let max_connections = if config.url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        info!("Database pool created: max_connections={}", max_connections);
        Ok(Self { pool })
    }

    /// Apply the embedded schema
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(include_str!("../../migrations/0001_init.sql"))
            .execute(&self.pool)
            .await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn update_listing_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        listing: &Listing,
    ) -> StoreResult<()> {
        let pricing = serde_json::to_string(&listing.pricing)
            .map_err(|e| StoreError::Corrupt(format!("Unencodable pricing params: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE listings
            SET base_price = ?, pricing = ?, total_quantity = ?, remaining_quantity = ?,
                min_purchase_quantity = ?, max_purchase_quantity = ?, currency = ?,
                status = ?, version = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(listing.base_price.map(|p| p.to_string()))
        .bind(pricing)
        .bind(listing.total_quantity.to_string())
        .bind(listing.remaining_quantity.to_string())
        .bind(listing.min_purchase_quantity.to_string())
        .bind(listing.max_purchase_quantity.map(|q| q.to_string()))
        .bind(&listing.currency)
        .bind(listing.status.as_str())
        .bind(listing.version + 1)
        .bind(to_micros(listing.updated_at))
        .bind(listing.id.to_string())
        .bind(listing.version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE id = ?")
                .bind(listing.id.to_string())
                .fetch_one(&mut **tx)
                .await?;
            if exists == 0 {
                return Err(StoreError::NotFound(format!("Listing {}", listing.id)));
            }
            return Err(StoreError::VersionConflict {
                id: listing.id,
                expected: listing.version,
            });
        }
        Ok(())
    }

    async fn insert_history_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        entry: &PriceHistoryEntry,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history
                (id, listing_id, price, currency, strategy, reason, automatic, changed_by, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.listing_id.to_string())
        .bind(entry.price.to_string())
        .bind(&entry.currency)
        .bind(entry.strategy.as_str())
        .bind(&entry.reason)
        .bind(entry.automatic)
        .bind(entry.changed_by.map(|u| u.to_string()))
        .bind(to_micros(entry.recorded_at))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_order_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        order: &Order,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, listing_id, buyer_id, quantity, price_per_unit, total_price,
                 currency, status, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id.to_string())
        .bind(order.listing_id.to_string())
        .bind(order.buyer_id.to_string())
        .bind(order.quantity.to_string())
        .bind(order.price_per_unit.to_string())
        .bind(order.total_price.to_string())
        .bind(&order.currency)
        .bind(order.status.as_str())
        .bind(to_micros(order.created_at))
        .bind(order.completed_at.map(to_micros))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for SqlStore {
    async fn get_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        let row = sqlx::query("SELECT * FROM listings WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| listing_from_row(&r)).transpose()
    }

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        let pricing = serde_json::to_string(&listing.pricing)
            .map_err(|e| StoreError::Corrupt(format!("Unencodable pricing params: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO listings
                (id, seller_id, asset_kind, asset_symbol, asset_token_id, strategy,
                 base_price, pricing, total_quantity, remaining_quantity,
                 min_purchase_quantity, max_purchase_quantity, currency, status,
                 version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing.id.to_string())
        .bind(listing.seller_id.to_string())
        .bind(listing.asset.kind_str())
        .bind(match &listing.asset {
            Asset::Crypto { symbol } => Some(symbol.clone()),
            Asset::Token { .. } => None,
        })
        .bind(match &listing.asset {
            Asset::Token { token_id } => Some(token_id.to_string()),
            Asset::Crypto { .. } => None,
        })
        .bind(listing.strategy.as_str())
        .bind(listing.base_price.map(|p| p.to_string()))
        .bind(pricing)
        .bind(listing.total_quantity.to_string())
        .bind(listing.remaining_quantity.to_string())
        .bind(listing.min_purchase_quantity.to_string())
        .bind(listing.max_purchase_quantity.map(|q| q.to_string()))
        .bind(&listing.currency)
        .bind(listing.status.as_str())
        .bind(listing.version)
        .bind(to_micros(listing.created_at))
        .bind(to_micros(listing.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_listing(&self, listing: &Listing) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_listing_in_tx(&mut tx, listing).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_price_change(
        &self,
        listing: &Listing,
        entry: &PriceHistoryEntry,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_listing_in_tx(&mut tx, listing).await?;
        Self::insert_history_in_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_sale(&self, listing: &Listing, order: &Order) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::update_listing_in_tx(&mut tx, listing).await?;
        Self::insert_order_in_tx(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn active_listings(&self) -> StoreResult<Vec<Listing>> {
        let rows = sqlx::query("SELECT * FROM listings WHERE status = 'active' ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(listing_from_row).collect()
    }

    async fn price_history_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM price_history
            WHERE listing_id = ? AND recorded_at >= ?
            ORDER BY recorded_at ASC
            "#,
        )
        .bind(listing_id.to_string())
        .bind(to_micros(since))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(history_from_row).collect()
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_order_in_tx(&mut tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn completed_orders_since(
        &self,
        listing_id: Uuid,
        since: NaiveDateTime,
    ) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE listing_id = ? AND status = 'completed' AND completed_at >= ?
            ORDER BY completed_at ASC
            "#,
        )
        .bind(listing_id.to_string())
        .bind(to_micros(since))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(order_from_row).collect()
    }

    async fn completed_order_count(&self, buyer_id: Uuid) -> StoreResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE buyer_id = ? AND status = 'completed'",
        )
        .bind(buyer_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}

fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

fn from_micros(micros: i64, column: &str) -> StoreResult<NaiveDateTime> {
    chrono::DateTime::from_timestamp_micros(micros)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| StoreError::Corrupt(format!("Invalid timestamp in {}: {}", column, micros)))
}

fn parse_decimal(value: &str, column: &str) -> StoreResult<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|_| StoreError::Corrupt(format!("Invalid decimal in {}: {}", column, value)))
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::Corrupt(format!("Invalid uuid in {}: {}", column, value)))
}

fn listing_from_row(row: &SqliteRow) -> StoreResult<Listing> {
    let asset_kind: String = row.try_get("asset_kind")?;
    let asset_symbol: Option<String> = row.try_get("asset_symbol")?;
    let asset_token_id: Option<String> = row.try_get("asset_token_id")?;
    let token_id = asset_token_id
        .map(|raw| parse_uuid(&raw, "listings.asset_token_id"))
        .transpose()?;
    let asset = Asset::from_parts(&asset_kind, asset_symbol, token_id)
        .map_err(StoreError::Corrupt)?;

    let strategy_raw: String = row.try_get("strategy")?;
    let strategy = PricingStrategy::from_str(&strategy_raw).map_err(StoreError::Corrupt)?;
    let status_raw: String = row.try_get("status")?;
    let status = ListingStatus::from_str(&status_raw).map_err(StoreError::Corrupt)?;

    let pricing_raw: String = row.try_get("pricing")?;
    let pricing = serde_json::from_str::<StrategyParams>(&pricing_raw)
        .map_err(|e| StoreError::Corrupt(format!("Invalid pricing params: {}", e)))?;

    let base_price: Option<String> = row.try_get("base_price")?;
    let max_purchase: Option<String> = row.try_get("max_purchase_quantity")?;

    Ok(Listing {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "listings.id")?,
        seller_id: parse_uuid(&row.try_get::<String, _>("seller_id")?, "listings.seller_id")?,
        asset,
        strategy,
        base_price: base_price
            .map(|raw| parse_decimal(&raw, "listings.base_price"))
            .transpose()?,
        pricing,
        total_quantity: parse_decimal(
            &row.try_get::<String, _>("total_quantity")?,
            "listings.total_quantity",
        )?,
        remaining_quantity: parse_decimal(
            &row.try_get::<String, _>("remaining_quantity")?,
            "listings.remaining_quantity",
        )?,
        min_purchase_quantity: parse_decimal(
            &row.try_get::<String, _>("min_purchase_quantity")?,
            "listings.min_purchase_quantity",
        )?,
        max_purchase_quantity: max_purchase
            .map(|raw| parse_decimal(&raw, "listings.max_purchase_quantity"))
            .transpose()?,
        currency: row.try_get("currency")?,
        status,
        version: row.try_get("version")?,
        created_at: from_micros(row.try_get("created_at")?, "listings.created_at")?,
        updated_at: from_micros(row.try_get("updated_at")?, "listings.updated_at")?,
    })
}

fn history_from_row(row: &SqliteRow) -> StoreResult<PriceHistoryEntry> {
    let strategy_raw: String = row.try_get("strategy")?;
    let changed_by: Option<String> = row.try_get("changed_by")?;

    Ok(PriceHistoryEntry {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "price_history.id")?,
        listing_id: parse_uuid(
            &row.try_get::<String, _>("listing_id")?,
            "price_history.listing_id",
        )?,
        price: parse_decimal(&row.try_get::<String, _>("price")?, "price_history.price")?,
        currency: row.try_get("currency")?,
        strategy: PricingStrategy::from_str(&strategy_raw).map_err(StoreError::Corrupt)?,
        reason: row.try_get("reason")?,
        automatic: row.try_get("automatic")?,
        changed_by: changed_by
            .map(|raw| parse_uuid(&raw, "price_history.changed_by"))
            .transpose()?,
        recorded_at: from_micros(row.try_get("recorded_at")?, "price_history.recorded_at")?,
    })
}

fn order_from_row(row: &SqliteRow) -> StoreResult<Order> {
    let status_raw: String = row.try_get("status")?;
    let completed_at: Option<i64> = row.try_get("completed_at")?;

    Ok(Order {
        id: parse_uuid(&row.try_get::<String, _>("id")?, "orders.id")?,
        listing_id: parse_uuid(&row.try_get::<String, _>("listing_id")?, "orders.listing_id")?,
        buyer_id: parse_uuid(&row.try_get::<String, _>("buyer_id")?, "orders.buyer_id")?,
        quantity: parse_decimal(&row.try_get::<String, _>("quantity")?, "orders.quantity")?,
        price_per_unit: parse_decimal(
            &row.try_get::<String, _>("price_per_unit")?,
            "orders.price_per_unit",
        )?,
        total_price: parse_decimal(
            &row.try_get::<String, _>("total_price")?,
            "orders.total_price",
        )?,
        currency: row.try_get("currency")?,
        status: OrderStatus::from_str(&status_raw).map_err(StoreError::Corrupt)?,
        created_at: from_micros(row.try_get("created_at")?, "orders.created_at")?,
        completed_at: completed_at
            .map(|micros| from_micros(micros, "orders.completed_at"))
            .transpose()?,
    })
}
