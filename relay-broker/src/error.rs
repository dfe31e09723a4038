//! Error types for the broker.

/// Main error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Store adapter errors.
///
/// All of these are connection-scoped and recoverable: they are logged,
/// surfaced to the affected connection as a domain error event, and never
/// take down the relay.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A range query failed.
    #[error("store read failed: {0}")]
    Read(String),

    /// An append failed.
    #[error("store write failed: {0}")]
    Write(String),

    /// A store call exceeded the configured timeout.
    #[error("store operation timed out")]
    Timeout,

    /// The circuit breaker is open after repeated failures.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from submitting a message for publication.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PublishError {
    /// The message failed shape validation.
    #[error("invalid message: {0}")]
    Invalid(String),

    /// The store rejected or failed the append.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
