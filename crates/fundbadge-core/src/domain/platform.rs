use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Funding source identifiers used in cache keys, routes and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
}

impl Platform {
    pub const ALL: [Self; 1] = [Self::Github];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    /// Platform identifiers are matched exactly; `GitHub` is not `github`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "github" => Ok(Self::Github),
            other => Err(ValidationError::InvalidPlatform {
                value: other.to_owned(),
            }),
        }
    }
}
