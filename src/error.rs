use sqlx::Error as SqlxError;
use thiserror::Error;
use uuid::Uuid;

/// Pricing-engine error types
#[derive(Error, Debug)]
pub enum PricingError {
    /// Listing or referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation attempted against a listing status that forbids it
    #[error("Invalid listing state: {0}")]
    InvalidState(String),

    /// Quantity or configuration violates a stated bound
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires a pricing strategy the listing does not have
    #[error("Wrong pricing strategy: {0}")]
    WrongStrategy(String),

    /// Upstream market-data source returned an invalid or error result
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    /// Strategy value with no repricing handler
    #[error("Unsupported strategy: {0}")]
    Unsupported(String),

    /// Listing configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for pricing-engine errors
pub type PricingResult<T> = Result<T, PricingError>;

impl PricingError {
    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, PricingError::NotFound(_))
    }

    /// Check if error is a validation rejection (as opposed to a system failure).
    /// Batch jobs use this to log rejected items without treating them as outages.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PricingError::NotFound(_)
                | PricingError::InvalidState(_)
                | PricingError::InvalidArgument(_)
                | PricingError::WrongStrategy(_)
                | PricingError::Unsupported(_)
                | PricingError::Config(_)
        )
    }
}

/// Store-specific error types
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Stale write rejected by the optimistic version check
    #[error("Version conflict on listing {id}: expected version {expected}")]
    VersionConflict { id: Uuid, expected: i64 },

    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Stored value failed to parse back into its model type
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<SqlxError> for StoreError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(db_err.message().to_string())
            }
            _ => StoreError::Query(err),
        }
    }
}

/// Cache backend error. Callers treat the cache as advisory and never
/// propagate this type; it exists so failures can be logged with context.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}
