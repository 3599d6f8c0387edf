use std::fmt::{Debug, Formatter};

use secrecy::{ExposeSecret, SecretString};

/// Opaque bearer token authorizing reads of one account's sponsorship data.
///
/// The wrapped value never appears in `Debug` output or logs.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().trim().is_empty()
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl From<SecretString> for AccessToken {
    fn from(value: SecretString) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let token = AccessToken::new("gho_supersecret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("supersecret"));
        assert_eq!(token.expose(), "gho_supersecret");
    }
}
