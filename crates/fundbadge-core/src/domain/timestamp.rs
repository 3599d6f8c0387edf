use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// Instant held in UTC and exchanged as an RFC3339 string.
///
/// GitHub reports `resetAt` with a `Z` suffix; values carrying another
/// offset are shifted to UTC on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        OffsetDateTime::parse(input, &Rfc3339)
            .map(|value| Self(value.to_offset(UtcOffset::UTC)))
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    pub fn format_rfc3339(self) -> String {
        // Rfc3339 only refuses years outside 0..=9999, which UTC `now` and
        // parsed values never reach.
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl TryFrom<String> for UtcDateTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UtcDateTime> for String {
    fn from(value: UtcDateTime) -> Self {
        value.format_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_utc_timestamps() {
        let parsed = UtcDateTime::parse("2024-03-01T13:00:00Z").expect("must parse");
        assert_eq!(parsed.to_string(), "2024-03-01T13:00:00Z");
    }

    #[test]
    fn shifts_offsets_to_utc() {
        let parsed = UtcDateTime::parse("2024-03-01T14:00:00+01:00").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-03-01T13:00:00Z");
    }

    #[test]
    fn serde_uses_rfc3339_strings() {
        let parsed: UtcDateTime =
            serde_json::from_str(r#""2024-03-01T13:00:00Z""#).expect("must decode");
        assert_eq!(
            serde_json::to_string(&parsed).expect("must encode"),
            r#""2024-03-01T13:00:00Z""#
        );

        let err = serde_json::from_str::<UtcDateTime>(r#""next tuesday""#).expect_err("must fail");
        assert!(err.to_string().contains("next tuesday"));
    }
}
