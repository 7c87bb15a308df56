mod helpers;

use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;
use vendora_pricing::config::EngineConfig;
use vendora_pricing::error::PricingError;
use vendora_pricing::models::*;
use vendora_pricing::pricing::quote::{
    dynamic_price, quantities_match, relative_change, strategy_quote, tiered_quote,
};
use vendora_pricing::pricing::{DynamicFactors, PriceTier, StrategyParams};

/// Unit tests for strategy and status conversions
#[test]
fn test_pricing_strategy_string_round_trip() {
    for strategy in [
        PricingStrategy::Fixed,
        PricingStrategy::Bulk,
        PricingStrategy::MarginFixed,
        PricingStrategy::MarginPercentage,
        PricingStrategy::Tiered,
        PricingStrategy::Dynamic,
        PricingStrategy::Unit,
    ] {
        let parsed = PricingStrategy::from_str(strategy.as_str()).unwrap();
        assert_eq!(parsed, strategy);
    }

    assert!(PricingStrategy::from_str("haggling").is_err());
    assert_eq!(
        PricingStrategy::from_str("MARGIN_FIXED").unwrap(),
        PricingStrategy::MarginFixed
    );
}

#[test]
fn test_listing_status_terminality() {
    assert!(!ListingStatus::Draft.is_terminal());
    assert!(!ListingStatus::Active.is_terminal());
    assert!(ListingStatus::SoldOut.is_terminal());
    assert!(ListingStatus::Cancelled.is_terminal());
}

#[test]
fn test_asset_keys_and_parts() {
    let token_id = Uuid::new_v4();
    let token = Asset::token(token_id);
    assert_eq!(token.key(), format!("token:{}", token_id));

    let crypto = Asset::crypto("btc");
    assert_eq!(crypto.key(), "crypto:BTC");

    let rebuilt = Asset::from_parts("crypto", Some("BTC".to_string()), None).unwrap();
    assert_eq!(rebuilt, crypto);
    assert!(Asset::from_parts("token", None, None).is_err());
    assert!(Asset::from_parts("bond", None, None).is_err());
}

/// Unit tests for listing validation
#[test]
fn test_activation_requires_base_price_for_fixed() {
    let mut listing = Listing::new(
        Uuid::new_v4(),
        Asset::crypto("SOL"),
        PricingStrategy::Fixed,
        None,
        &json!({}),
        dec!(100),
        Decimal::ZERO,
        None,
        "USDC",
    );
    assert!(matches!(
        listing.activate(),
        Err(PricingError::Config(_))
    ));

    listing.base_price = Some(dec!(5));
    listing.activate().unwrap();
    assert!(listing.is_active());
}

#[test]
fn test_margin_listing_activates_without_base_price() {
    let listing = margin_percentage_listing(dec!(0.25), dec!(100));
    assert!(listing.is_active());
    assert_eq!(listing.base_price, None);
}

#[test]
fn test_record_sale_flips_to_sold_out() {
    let mut listing = fixed_listing(dec!(5), dec!(10));
    listing.record_sale(dec!(4)).unwrap();
    assert_eq!(listing.remaining_quantity, dec!(6));
    assert_eq!(listing.status, ListingStatus::Active);

    listing.record_sale(dec!(6)).unwrap();
    assert_eq!(listing.remaining_quantity, Decimal::ZERO);
    assert_eq!(listing.status, ListingStatus::SoldOut);

    // Terminal listings refuse further sales
    assert!(listing.record_sale(dec!(1)).is_err());
}

#[test]
fn test_quantity_bounds_name_the_violated_bound() {
    let mut listing = fixed_listing(dec!(5), dec!(100));
    listing.min_purchase_quantity = dec!(10);
    listing.max_purchase_quantity = Some(dec!(50));

    let below = listing.check_purchase_quantity(dec!(9)).unwrap_err();
    assert!(below.to_string().contains("minimum purchase quantity 10"));

    let above = listing.check_purchase_quantity(dec!(51)).unwrap_err();
    assert!(above.to_string().contains("maximum purchase quantity 50"));

    let beyond = listing.check_purchase_quantity(dec!(101)).unwrap_err();
    assert!(beyond.to_string().contains("remaining quantity 100"));
}

/// Unit tests for the quote math
#[test]
fn test_strategy_dispatch_covers_all_params() {
    let conditions = MarketConditions::neutral();

    // Fixed and Unit price off the base
    for params in [StrategyParams::Fixed, StrategyParams::Unit] {
        let quote = strategy_quote(&params, Some(dec!(5)), dec!(100), dec!(3), None, None).unwrap();
        assert_eq!(quote.total_price, dec!(15));
    }

    // Margin strategies price off the market
    let quote = strategy_quote(
        &StrategyParams::MarginFixed { margin: dec!(2) },
        None,
        dec!(100),
        dec!(1),
        Some(dec!(40)),
        None,
    )
    .unwrap();
    assert_eq!(quote.price_per_unit, dec!(42));

    // Dynamic prices off base and conditions
    let quote = strategy_quote(
        &StrategyParams::Dynamic {
            min_multiplier: dec!(0.5),
            max_multiplier: dec!(2),
        },
        Some(dec!(100)),
        dec!(10),
        dec!(1),
        None,
        Some(&conditions),
    )
    .unwrap();
    assert_eq!(quote.price_per_unit, dec!(100));
}

#[test]
fn test_tiered_fallback_to_last_tier() {
    // A gap between tiers: quantities beyond every range take the last tier.
    let tiers = vec![
        PriceTier {
            min_quantity: dec!(0),
            max_quantity: Some(dec!(10)),
            price_per_unit: dec!(10),
            description: None,
        },
        PriceTier {
            min_quantity: dec!(20),
            max_quantity: Some(dec!(30)),
            price_per_unit: dec!(7),
            description: None,
        },
    ];
    let quote = tiered_quote(&tiers, Some(dec!(10)), dec!(15));
    assert_eq!(quote.price_per_unit, dec!(7));

    let tier = quote.tier.unwrap();
    assert_eq!(tier.min_quantity, dec!(20));
    assert_eq!(tier.discount_percent, dec!(30));
}

#[test]
fn test_dynamic_multiplier_composition() {
    let conditions = MarketConditions {
        volume_24h: dec!(400000),
        price_change_24h: dec!(0.04),
        active_orders: 10,
        average_order_size: dec!(100),
        market_cap: None,
        volatility: dec!(0.2),
    };
    let factors = DynamicFactors::from_conditions(&conditions);
    assert_eq!(factors.volatility_factor, dec!(1.02));
    assert_eq!(factors.volume_factor, dec!(1.02));
    assert_eq!(factors.price_change_factor, dec!(1.02));

    let (price, multiplier, _) = dynamic_price(dec!(100), &conditions, dec!(0.5), dec!(2));
    assert_eq!(multiplier, dec!(1.061208));
    assert_eq!(price, dec!(106.1208));
}

#[test]
fn test_dynamic_factor_descriptions_skip_neutral_factors() {
    let conditions = MarketConditions {
        volume_24h: dec!(100000),      // factor 1.005, inside the 1% band
        price_change_24h: dec!(0.1),   // factor 1.05
        active_orders: 0,
        average_order_size: Decimal::ZERO,
        market_cap: None,
        volatility: dec!(0.5),         // factor 1.05
    };
    let described = DynamicFactors::from_conditions(&conditions).describe();
    assert_eq!(
        described,
        vec!["Volatility: 1.05".to_string(), "Price change: 1.05".to_string()]
    );
}

#[test]
fn test_quantity_epsilon_and_relative_change() {
    assert!(quantities_match(dec!(100), dec!(100)));
    assert!(quantities_match(dec!(100.000000001), dec!(100)));
    assert!(!quantities_match(dec!(99.9999), dec!(100)));

    assert_eq!(relative_change(dec!(100), dec!(102)), Some(dec!(0.02)));
    assert_eq!(relative_change(dec!(100), dec!(98)), Some(dec!(0.02)));
    assert_eq!(relative_change(dec!(0), dec!(98)), None);
}

/// Unit tests for configuration defaults
#[test]
fn test_engine_config_documented_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.volume_discount_threshold, dec!(1000));
    assert_eq!(config.volume_discount_percent, dec!(2));
    assert_eq!(config.loyalty_order_threshold, 5);
    assert_eq!(config.loyalty_discount_percent, dec!(1));
    assert_eq!(config.margin_update_threshold, dec!(0.01));
    assert_eq!(config.dynamic_update_threshold, dec!(0.005));
}
