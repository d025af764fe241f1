use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by a `DurableStore` adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Condition check failed")]
    ConditionFailed,
    #[error("Store call timed out")]
    Timeout,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Failures raised by a `PaymentGateway` adapter or by the breaker guarding it.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway transport error: {0}")]
    Transport(String),
    #[error("Gateway rejected the call (status {status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Gateway response could not be decoded: {0}")]
    Decode(String),
    #[error("Gateway call timed out")]
    Timeout,
    #[error("Service {0} is temporarily unavailable")]
    CircuitOpen(String),
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },
    #[error("Concurrent update detected for wallet {0}")]
    ConcurrencyConflict(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Service {0} is temporarily unavailable")]
    CircuitOpen(String),
    #[error("Payment {0} already refunded")]
    AlreadyRefunded(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Refund amount {requested} exceeds payment amount {original}")]
    RefundAmountExceeded { requested: Decimal, original: Decimal },
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
    #[error("Gateway error: {0}")]
    Gateway(GatewayError),
}

impl From<GatewayError> for PaymentError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::CircuitOpen(service) => PaymentError::CircuitOpen(service),
            other => PaymentError::Gateway(other),
        }
    }
}

impl PaymentError {
    /// Stable machine-readable code for the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::ValidationError(_) => "VALIDATION_ERROR",
            PaymentError::NotFound(_) => "NOT_FOUND",
            PaymentError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            PaymentError::ConcurrencyConflict(_) => "CONCURRENCY_CONFLICT",
            PaymentError::AlreadyExists(_) => "ALREADY_EXISTS",
            PaymentError::CircuitOpen(_) => "CIRCUIT_BREAKER_OPEN",
            PaymentError::AlreadyRefunded(_) => "ALREADY_REFUNDED",
            PaymentError::InvalidState(_) => "INVALID_STATE",
            PaymentError::RefundAmountExceeded { .. } => "REFUND_AMOUNT_EXCEEDED",
            PaymentError::Persistence(_) => "PERSISTENCE_ERROR",
            PaymentError::Gateway(_) => "GATEWAY_ERROR",
        }
    }

    /// Whether a caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::ConcurrencyConflict(_)
                | PaymentError::CircuitOpen(_)
                | PaymentError::Persistence(StoreError::Timeout)
                | PaymentError::Gateway(GatewayError::Timeout)
        )
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
