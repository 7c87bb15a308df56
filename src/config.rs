use rust_decimal::Decimal;
use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Pricing-engine tuning knobs. Defaults match the documented business rules;
/// every value can be overridden through the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum quantity that qualifies for the volume discount
    pub volume_discount_threshold: Decimal,
    /// Volume discount, percent of the order total
    pub volume_discount_percent: Decimal,
    /// Completed orders a buyer needs before the loyalty discount applies
    pub loyalty_order_threshold: u64,
    /// Loyalty discount, percent of the (already discounted) order total
    pub loyalty_discount_percent: Decimal,
    /// Relative price change required to commit a margin-based reprice
    pub margin_update_threshold: Decimal,
    /// Relative price change required to commit a dynamic reprice
    pub dynamic_update_threshold: Decimal,
    pub quote_cache_ttl_secs: u64,
    pub market_price_ttl_secs: u64,
    pub market_conditions_ttl_secs: u64,
}

/// Market-data source configuration
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    /// Base URL of the upstream market-data API. When unset the service
    /// runs against the simulated source.
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub market: MarketDataConfig,
    pub log_level: String,
    pub environment: String,
    pub reprice_interval_secs: u64,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_decimal(name: &str, default: Decimal) -> Decimal {
    env::var(name)
        .ok()
        .and_then(|s| s.parse::<Decimal>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);

        let acquire_timeout_secs = env_u64("DATABASE_ACQUIRE_TIMEOUT_SECS", 30);

        // Validate configuration
        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("DATABASE_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
        })
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Create engine config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            volume_discount_threshold: env_decimal(
                "VOLUME_DISCOUNT_THRESHOLD",
                Decimal::new(1000, 0),
            ),
            volume_discount_percent: env_decimal("VOLUME_DISCOUNT_PERCENT", Decimal::new(2, 0)),
            loyalty_order_threshold: env_u64("LOYALTY_ORDER_THRESHOLD", 5),
            loyalty_discount_percent: env_decimal("LOYALTY_DISCOUNT_PERCENT", Decimal::new(1, 0)),
            margin_update_threshold: env_decimal("MARGIN_UPDATE_THRESHOLD", Decimal::new(1, 2)),
            dynamic_update_threshold: env_decimal("DYNAMIC_UPDATE_THRESHOLD", Decimal::new(5, 3)),
            quote_cache_ttl_secs: env_u64("QUOTE_CACHE_TTL_SECS", 300),
            market_price_ttl_secs: env_u64("MARKET_PRICE_TTL_SECS", 300),
            market_conditions_ttl_secs: env_u64("MARKET_CONDITIONS_TTL_SECS", 600),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        let percent_range = Decimal::ZERO..=Decimal::new(100, 0);
        if !percent_range.contains(&self.volume_discount_percent) {
            return Err("VOLUME_DISCOUNT_PERCENT must be between 0 and 100".to_string());
        }
        if !percent_range.contains(&self.loyalty_discount_percent) {
            return Err("LOYALTY_DISCOUNT_PERCENT must be between 0 and 100".to_string());
        }
        if self.margin_update_threshold < Decimal::ZERO {
            return Err("MARGIN_UPDATE_THRESHOLD must not be negative".to_string());
        }
        if self.dynamic_update_threshold < Decimal::ZERO {
            return Err("DYNAMIC_UPDATE_THRESHOLD must not be negative".to_string());
        }
        Ok(())
    }

    /// Get quote-cache TTL as Duration
    pub fn quote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.quote_cache_ttl_secs)
    }

    /// Get market-price TTL as Duration
    pub fn market_price_ttl(&self) -> Duration {
        Duration::from_secs(self.market_price_ttl_secs)
    }

    /// Get market-conditions TTL as Duration
    pub fn market_conditions_ttl(&self) -> Duration {
        Duration::from_secs(self.market_conditions_ttl_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volume_discount_threshold: Decimal::new(1000, 0),
            volume_discount_percent: Decimal::new(2, 0),
            loyalty_order_threshold: 5,
            loyalty_discount_percent: Decimal::new(1, 0),
            margin_update_threshold: Decimal::new(1, 2),
            dynamic_update_threshold: Decimal::new(5, 3),
            quote_cache_ttl_secs: 300,
            market_price_ttl_secs: 300,
            market_conditions_ttl_secs: 600,
        }
    }
}

impl MarketDataConfig {
    /// Create market-data config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("MARKET_DATA_URL").ok().filter(|s| !s.is_empty());
        let request_timeout_secs = env_u64("MARKET_DATA_TIMEOUT_SECS", 2);

        if request_timeout_secs == 0 {
            return Err("MARKET_DATA_TIMEOUT_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            base_url,
            request_timeout_secs,
        })
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 2,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let engine = EngineConfig::from_env()?;
        let market = MarketDataConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let reprice_interval_secs = env_u64("REPRICE_INTERVAL_SECS", 300);

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        // Validate environment
        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        if reprice_interval_secs == 0 {
            return Err("REPRICE_INTERVAL_SECS must be greater than 0".to_string());
        }

        Ok(Self {
            database,
            engine,
            market,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
            reprice_interval_secs,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Get database URL (convenience method)
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Get reprice sweep interval as Duration
    pub fn reprice_interval(&self) -> Duration {
        Duration::from_secs(self.reprice_interval_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            engine: EngineConfig::default(),
            market: MarketDataConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            reprice_interval_secs: 300,
        }
    }
}
