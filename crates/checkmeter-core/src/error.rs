//! Error types for CheckMeter

/// Result type alias using CheckMeter's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CheckMeter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The vision service could not be reached or answered with a non-2xx status
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The vision service answered, but not with a usable JSON object
    #[error("invalid model response: {0}")]
    InvalidResponse(String),

    /// Image decoding, transformation or re-encoding failed
    #[error("image error: {0}")]
    Image(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout errors
    #[error("operation timed out")]
    Timeout,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new invalid-response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a new image error
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from talking to the vision service.
    ///
    /// All of these collapse to one generic user-facing message.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::InvalidResponse(_) | Self::Timeout | Self::Serialization(_)
        )
    }
}
