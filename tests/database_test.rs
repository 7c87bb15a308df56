mod helpers;

use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use vendora_pricing::config::DatabaseConfig;
use vendora_pricing::error::StoreError;
use vendora_pricing::models::*;
use vendora_pricing::pricing::StrategyParams;
use vendora_pricing::repositories::{ListingStore, SqlStore};

/// Fresh in-memory database with the schema applied
async fn sql_store() -> SqlStore {
    let store = SqlStore::connect(&DatabaseConfig::default())
        .await
        .expect("Failed to open in-memory database");
    store.migrate().await.expect("Failed to run migrations");
    store
}

#[tokio::test]
async fn test_listing_round_trip_preserves_all_fields() {
    let store = sql_store().await;
    let mut listing = tiered_listing(&standard_tiers(), Some(dec!(10)), dec!(5000));
    listing.min_purchase_quantity = dec!(1);
    listing.max_purchase_quantity = Some(dec!(2000));
    store.insert_listing(&listing).await.unwrap();

    let loaded = store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, listing.id);
    assert_eq!(loaded.seller_id, listing.seller_id);
    assert_eq!(loaded.asset, listing.asset);
    assert_eq!(loaded.strategy, PricingStrategy::Tiered);
    assert_eq!(loaded.base_price, Some(dec!(10)));
    assert_eq!(loaded.pricing, listing.pricing);
    assert_eq!(loaded.total_quantity, dec!(5000));
    assert_eq!(loaded.remaining_quantity, dec!(5000));
    assert_eq!(loaded.min_purchase_quantity, dec!(1));
    assert_eq!(loaded.max_purchase_quantity, Some(dec!(2000)));
    assert_eq!(loaded.currency, "USDC");
    assert_eq!(loaded.status, ListingStatus::Active);
    assert_eq!(loaded.version, 1);
    // Timestamps are stored at microsecond precision.
    assert_eq!(
        loaded.created_at.and_utc().timestamp_micros(),
        listing.created_at.and_utc().timestamp_micros()
    );

    // The decoded tier ladder survives the TEXT column.
    let StrategyParams::Tiered { tiers } = loaded.pricing else {
        panic!("expected tiered params");
    };
    assert_eq!(tiers.len(), 3);
    assert_eq!(tiers[1].price_per_unit, dec!(8));
}

#[tokio::test]
async fn test_both_asset_kinds_round_trip() {
    let store = sql_store().await;

    let token = fixed_listing(dec!(5), dec!(100));
    let crypto = unit_listing(dec!(7), dec!(100));
    store.insert_listing(&token).await.unwrap();
    store.insert_listing(&crypto).await.unwrap();

    let loaded = store.get_listing(token.id).await.unwrap().unwrap();
    assert!(matches!(loaded.asset, Asset::Token { .. }));
    let loaded = store.get_listing(crypto.id).await.unwrap().unwrap();
    assert_eq!(loaded.asset, Asset::crypto("SOL"));
}

#[tokio::test]
async fn test_get_missing_listing_returns_none() {
    let store = sql_store().await;
    assert!(store.get_listing(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_insert_rejected() {
    let store = sql_store().await;
    let listing = fixed_listing(dec!(5), dec!(100));
    store.insert_listing(&listing).await.unwrap();

    assert!(matches!(
        store.insert_listing(&listing).await,
        Err(StoreError::Duplicate(_))
    ));
}

#[tokio::test]
async fn test_update_bumps_version_and_rejects_stale_writers() {
    let store = sql_store().await;
    let listing = fixed_listing(dec!(5), dec!(100));
    store.insert_listing(&listing).await.unwrap();

    let mut first = store.get_listing(listing.id).await.unwrap().unwrap();
    first.apply_price(dec!(6));
    store.update_listing(&first).await.unwrap();

    let reloaded = store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(reloaded.version, 2);
    assert_eq!(reloaded.base_price, Some(dec!(6)));

    // `first` still carries version 1 and must now be rejected.
    assert!(matches!(
        store.update_listing(&first).await,
        Err(StoreError::VersionConflict { .. })
    ));

    let missing = fixed_listing(dec!(5), dec!(100));
    assert!(matches!(
        store.update_listing(&missing).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_commit_price_change_writes_listing_and_history_together() {
    let store = sql_store().await;
    let mut listing = margin_fixed_listing(dec!(2), dec!(100));
    store.insert_listing(&listing).await.unwrap();

    listing.apply_price(dec!(102));
    let entry = PriceHistoryEntry::automatic(
        listing.id,
        dec!(102),
        "USDC",
        listing.strategy,
        "Margin reprice: market price 100",
    );
    store.commit_price_change(&listing, &entry).await.unwrap();

    let loaded = store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(loaded.base_price, Some(dec!(102)));
    assert_eq!(loaded.version, 2);

    let since = chrono::Utc::now().naive_utc() - chrono::Duration::hours(1);
    let history = store.price_history_since(listing.id, since).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price, dec!(102));
    assert_eq!(history[0].strategy, PricingStrategy::MarginFixed);
    assert!(history[0].automatic);
    assert_eq!(history[0].changed_by, None);
}

#[tokio::test]
async fn test_commit_price_change_rolls_back_on_version_conflict() {
    let store = sql_store().await;
    let listing = margin_fixed_listing(dec!(2), dec!(100));
    store.insert_listing(&listing).await.unwrap();

    let mut current = store.get_listing(listing.id).await.unwrap().unwrap();
    current.apply_price(dec!(102));
    store.update_listing(&current).await.unwrap();

    // A writer still holding version 1 commits nothing, not even history.
    let mut stale = listing.clone();
    stale.apply_price(dec!(103));
    let entry = PriceHistoryEntry::automatic(
        listing.id,
        dec!(103),
        "USDC",
        listing.strategy,
        "stale reprice",
    );
    assert!(matches!(
        store.commit_price_change(&stale, &entry).await,
        Err(StoreError::VersionConflict { .. })
    ));

    let since = chrono::Utc::now().naive_utc() - chrono::Duration::hours(1);
    let history = store.price_history_since(listing.id, since).await.unwrap();
    assert!(history.is_empty());

    let loaded = store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(loaded.base_price, Some(dec!(102)));
}

#[tokio::test]
async fn test_commit_sale_writes_listing_and_order_together() {
    let store = sql_store().await;
    let mut listing = fixed_listing(dec!(5), dec!(10));
    store.insert_listing(&listing).await.unwrap();
    let buyer = Uuid::new_v4();

    listing.record_sale(dec!(10)).unwrap();
    let order = Order::completed(listing.id, buyer, dec!(10), dec!(5), dec!(50), "USDC");
    store.commit_sale(&listing, &order).await.unwrap();

    let loaded = store.get_listing(listing.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, ListingStatus::SoldOut);
    assert_eq!(loaded.remaining_quantity, Decimal::ZERO);

    let since = chrono::Utc::now().naive_utc() - chrono::Duration::hours(1);
    let orders = store.completed_orders_since(listing.id, since).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].buyer_id, buyer);
    assert_eq!(orders[0].total_price, dec!(50));
    assert_eq!(orders[0].status, OrderStatus::Completed);

    assert_eq!(store.completed_order_count(buyer).await.unwrap(), 1);
}

#[tokio::test]
async fn test_history_query_filters_by_listing_and_time() {
    let store = sql_store().await;
    let listing = margin_fixed_listing(dec!(2), dec!(100));
    let other = margin_fixed_listing(dec!(2), dec!(100));
    store.insert_listing(&listing).await.unwrap();
    store.insert_listing(&other).await.unwrap();

    let now = chrono::Utc::now().naive_utc();
    let mut old_entry = PriceHistoryEntry::automatic(
        listing.id,
        dec!(90),
        "USDC",
        listing.strategy,
        "old reprice",
    );
    old_entry.recorded_at = now - chrono::Duration::hours(48);
    let recent = PriceHistoryEntry::automatic(
        listing.id,
        dec!(102),
        "USDC",
        listing.strategy,
        "recent reprice",
    );
    let foreign = PriceHistoryEntry::automatic(
        other.id,
        dec!(55),
        "USDC",
        other.strategy,
        "other listing",
    );

    let mut current = store.get_listing(listing.id).await.unwrap().unwrap();
    store.commit_price_change(&current, &old_entry).await.unwrap();
    current.version += 1;
    store.commit_price_change(&current, &recent).await.unwrap();
    let other_current = store.get_listing(other.id).await.unwrap().unwrap();
    store.commit_price_change(&other_current, &foreign).await.unwrap();

    let history = store
        .price_history_since(listing.id, now - chrono::Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price, dec!(102));

    let full = store
        .price_history_since(listing.id, now - chrono::Duration::days(7))
        .await
        .unwrap();
    assert_eq!(full.len(), 2);
    // Ascending by recorded time.
    assert_eq!(full[0].price, dec!(90));
    assert_eq!(full[1].price, dec!(102));
}

#[tokio::test]
async fn test_completed_order_queries_skip_other_statuses() {
    let store = sql_store().await;
    let listing = fixed_listing(dec!(5), dec!(100));
    store.insert_listing(&listing).await.unwrap();
    let buyer = Uuid::new_v4();

    let completed = Order::completed(listing.id, buyer, dec!(2), dec!(5), dec!(10), "USDC");
    let mut pending = Order::completed(listing.id, buyer, dec!(3), dec!(5), dec!(15), "USDC");
    pending.status = OrderStatus::Pending;
    pending.completed_at = None;
    store.insert_order(&completed).await.unwrap();
    store.insert_order(&pending).await.unwrap();

    let since = chrono::Utc::now().naive_utc() - chrono::Duration::hours(1);
    let orders = store.completed_orders_since(listing.id, since).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, dec!(2));

    assert_eq!(store.completed_order_count(buyer).await.unwrap(), 1);
    assert_eq!(store.completed_order_count(Uuid::new_v4()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_active_listings_excludes_other_statuses() {
    let store = sql_store().await;

    let active = fixed_listing(dec!(5), dec!(100));
    let mut sold_out = fixed_listing(dec!(5), dec!(100));
    sold_out.record_sale(dec!(100)).unwrap();
    store.insert_listing(&active).await.unwrap();
    store.insert_listing(&sold_out).await.unwrap();

    let listings = store.active_listings().await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id, active.id);
}
