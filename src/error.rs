//! Freshcache error types

/// Freshcache error types
#[derive(Debug, thiserror::Error)]
pub enum FreshnessError {
    // Connection lifecycle errors
    /// Discovery or cluster-handle construction failed. No handle was
    /// established; the next evaluation attempt retries setup.
    #[error("connection setup failed: {0}")]
    ConnectionSetup(String),

    /// A single cache operation failed (timeout, refused, protocol error).
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The per-call reconnect ceiling was exceeded. Callers must surface
    /// this as a server error, never as a freshness answer.
    #[error("could not connect to cache after {attempts} attempts: {last_error}")]
    CacheExhausted { attempts: u32, last_error: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FreshnessError {
    /// Whether the evaluator should reconnect and try again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FreshnessError::CacheUnavailable(_) | FreshnessError::ConnectionSetup(_)
        )
    }
}

impl From<redis::RedisError> for FreshnessError {
    fn from(err: redis::RedisError) -> Self {
        FreshnessError::CacheUnavailable(err.to_string())
    }
}

/// Result type alias for Freshcache operations
pub type Result<T> = std::result::Result<T, FreshnessError>;
