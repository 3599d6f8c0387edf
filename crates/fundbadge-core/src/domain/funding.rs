use serde::{Deserialize, Serialize};

use crate::{Platform, UtcDateTime, ValidationError};

/// Count of sponsors on one monthly tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCount {
    pub amount: f64,
    pub count: u32,
}

/// Structured detail behind a funding figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingBreakdown {
    pub sponsors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<TierCount>>,
}

impl FundingBreakdown {
    pub const fn sponsors(sponsors: u32) -> Self {
        Self {
            sponsors,
            tiers: None,
        }
    }
}

/// Immutable snapshot of a sponsee's funding state.
///
/// A new record is built on every successful upstream fetch and superseded by
/// the next one; nothing mutates a record after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingRecord {
    pub platform: Platform,
    pub username: String,
    pub current_amount: f64,
    pub currency: String,
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<FundingBreakdown>,
    pub last_updated: UtcDateTime,
}

impl FundingRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Platform,
        username: impl Into<String>,
        current_amount: f64,
        currency: impl AsRef<str>,
        is_recurring: bool,
        breakdown: Option<FundingBreakdown>,
        last_updated: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("current_amount", current_amount)?;
        if let Some(tiers) = breakdown.as_ref().and_then(|value| value.tiers.as_ref()) {
            for tier in tiers {
                validate_non_negative("tier.amount", tier.amount)?;
            }
        }

        Ok(Self {
            platform,
            username: username.into(),
            current_amount,
            currency: validate_currency_code(currency.as_ref())?,
            is_recurring,
            breakdown,
            last_updated,
        })
    }

    /// Builds a record from an upstream minor-unit (cents) total.
    pub fn from_cents(
        platform: Platform,
        username: impl Into<String>,
        cents: u64,
        currency: impl AsRef<str>,
        is_recurring: bool,
        breakdown: Option<FundingBreakdown>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            platform,
            username,
            cents as f64 / 100.0,
            currency,
            is_recurring,
            breakdown,
            UtcDateTime::now(),
        )
    }
}

/// Upstream quota snapshot. Fetched on demand and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    pub reset: UtcDateTime,
}

impl RateLimitInfo {
    pub fn new(remaining: u32, limit: u32, reset: UtcDateTime) -> Result<Self, ValidationError> {
        if remaining > limit {
            return Err(ValidationError::RemainingExceedsLimit { remaining, limit });
        }
        Ok(Self {
            remaining,
            limit,
            reset,
        })
    }

    pub const fn is_below(&self, threshold: u32) -> bool {
        self.remaining < threshold
    }
}

/// Validate and normalize currency to uppercase 3-letter code.
pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
