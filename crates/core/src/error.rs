use thiserror::Error;

pub type FanResult<T> = Result<T, FanError>;

#[derive(Error, Debug)]
pub enum FanError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown activity type: {0}")]
    UnknownActivity(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl FanError {
    /// Rejected before any state was touched; resubmitting the same event will fail again.
    pub fn is_validation(&self) -> bool {
        matches!(self, FanError::Validation(_) | FanError::UnknownActivity(_))
    }

    /// The transaction was rolled back and the caller may resubmit the event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FanError::Store(_) | FanError::Conflict(_))
    }

    /// Short machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            FanError::Validation(_) => "invalid_request",
            FanError::UnknownActivity(_) => "unknown_activity_type",
            FanError::Store(_) => "store_unavailable",
            FanError::Conflict(_) => "store_conflict",
            FanError::Config(_) => "configuration_error",
            FanError::Notification(_) => "notification_failed",
            FanError::Serialization(_) => "serialization_error",
            FanError::Internal(_) => "internal_error",
        }
    }

    /// Caller-facing `message` for error envelopes, keyed on how the caller should react.
    pub fn summary(&self) -> &'static str {
        if self.is_validation() {
            "Request rejected"
        } else if self.is_retryable() {
            "Request not recorded; retry it"
        } else {
            "Request processing failed"
        }
    }
}

impl From<config::ConfigError> for FanError {
    fn from(err: config::ConfigError) -> Self {
        FanError::Config(err.to_string())
    }
}
