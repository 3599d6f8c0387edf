//! # Domain Models
//!
//! Canonical domain types for fundbadge funding data.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FundingRecord`] | Immutable snapshot of a sponsee's funding state |
//! | [`FundingBreakdown`] | Sponsor and tier counts behind a funding figure |
//! | [`RateLimitInfo`] | Upstream quota snapshot |
//! | [`Platform`] | Funding source identifier |
//! | [`AccessToken`] | Redacted bearer credential |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! ## Validation
//!
//! Constructors enforce invariants, so a `FundingRecord` with a negative
//! amount or a `RateLimitInfo` with `remaining > limit` cannot be built:
//!
//! ```rust
//! use fundbadge_core::{RateLimitInfo, UtcDateTime, ValidationError};
//!
//! let reset = UtcDateTime::parse("2024-01-01T00:00:00Z").unwrap();
//! let invalid = RateLimitInfo::new(6000, 5000, reset);
//! assert!(matches!(invalid, Err(ValidationError::RemainingExceedsLimit { .. })));
//! ```

mod credential;
mod funding;
mod platform;
mod timestamp;

pub use credential::AccessToken;
pub use funding::{
    validate_currency_code, FundingBreakdown, FundingRecord, RateLimitInfo, TierCount,
};
pub use platform::Platform;
pub use timestamp::UtcDateTime;
