//! Error types for the tier ladder
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific tier and rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("Unsupported store backend: {backend}")]
    StoreUnsupported { backend: String },

    #[error("Store operation failed: {message}")]
    StoreFailure { message: String },

    #[error("Tier not found: {name}")]
    UnknownTier { name: String },

    #[error("Tier already registered: {name}")]
    DuplicateTier { name: String },

    #[error("Parent cycle detected through tier: {name}")]
    ParentCycle { name: String },

    #[error("Query worker is not running")]
    WorkerUnavailable,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}
