use thiserror::Error;

/// Validation and contract errors exposed by `fundbadge-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid platform '{value}', expected one of github")]
    InvalidPlatform { value: String },

    #[error("timestamp is not RFC3339: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("rate limit remaining {remaining} exceeds limit {limit}")]
    RemainingExceedsLimit { remaining: u32, limit: u32 },
}
