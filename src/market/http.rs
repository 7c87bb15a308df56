use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::MarketDataConfig;
use crate::error::{PricingError, PricingResult};
use crate::market::MarketDataSource;
use crate::models::{Asset, MarketConditions, MarketPrice};

/// Market data fetched from an upstream HTTP API.
pub struct HttpMarketData {
    client: Client,
    base_url: String,
}

impl HttpMarketData {
    pub fn new(config: &MarketDataConfig) -> PricingResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| PricingError::Config("MARKET_DATA_URL is not set".to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PricingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, url: &str) -> PricingResult<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PricingError::MarketDataUnavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(PricingError::MarketDataUnavailable(format!(
                "{}: upstream returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PricingError::MarketDataUnavailable(format!("{}: bad body: {}", url, e)))
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketData {
    async fn price(&self, asset: &Asset) -> PricingResult<MarketPrice> {
        let url = format!("{}/price/{}", self.base_url, asset.key());
        let body = self.fetch(&url).await?;

        let Some(price) = decimal_at(&body, "price") else {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("upstream returned no price")
                .to_string();
            return Ok(MarketPrice::invalid(&self.base_url, error));
        };

        let currency = body
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("USD")
            .to_string();

        Ok(MarketPrice::valid(price, currency, &self.base_url))
    }

    async fn conditions(&self, asset: &Asset) -> PricingResult<MarketConditions> {
        let url = format!("{}/conditions/{}", self.base_url, asset.key());
        let body = self.fetch(&url).await?;

        let mut conditions = MarketConditions::neutral();
        if let Some(v) = decimal_at(&body, "volume_24h") {
            conditions.volume_24h = v;
        }
        if let Some(v) = decimal_at(&body, "price_change_24h") {
            conditions.price_change_24h = v;
        }
        if let Some(v) = body.get("active_orders").and_then(Value::as_u64) {
            conditions.active_orders = v;
        }
        if let Some(v) = decimal_at(&body, "average_order_size") {
            conditions.average_order_size = v;
        }
        conditions.market_cap = decimal_at(&body, "market_cap");
        if let Some(v) = decimal_at(&body, "volatility") {
            conditions.volatility = v;
        }
        Ok(conditions)
    }
}

/// Read a decimal field that the upstream may encode as a JSON number or
/// a string. Numbers go through their text form so no float rounding leaks in.
fn decimal_at(body: &Value, key: &str) -> Option<Decimal> {
    match body.get(key)? {
        Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
        Value::String(s) => s.parse::<Decimal>().ok(),
        _ => None,
    }
}
