//! Per-user access-token lookup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fundbadge_vault::TokenVault;
use tokio::sync::RwLock;

use crate::{AccessToken, FundingError};

/// Source of the tokens users granted through account linking.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored token for `username`, or `None` when the account
    /// was never linked.
    fn get_credential<'a>(
        &'a self,
        username: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AccessToken>, FundingError>> + Send + 'a>>;
}

/// Map-backed store for tests and single-process setups.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, username: impl Into<String>, token: AccessToken) {
        self.tokens.write().await.insert(username.into(), token);
    }

    pub async fn remove(&self, username: &str) -> bool {
        self.tokens.write().await.remove(username).is_some()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get_credential<'a>(
        &'a self,
        username: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AccessToken>, FundingError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.tokens.read().await.get(username).cloned()) })
    }
}

impl CredentialStore for TokenVault {
    fn get_credential<'a>(
        &'a self,
        username: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<AccessToken>, FundingError>> + Send + 'a>> {
        Box::pin(async move {
            let vault = self.clone();
            let username = username.to_owned();

            let token = tokio::task::spawn_blocking(move || vault.get_user_token(&username))
                .await
                .map_err(|error| {
                    FundingError::internal(format!("credential lookup task failed: {error}"))
                })?
                .map_err(|error| {
                    tracing::error!(error = %error, "token vault lookup failed");
                    FundingError::credential_store(format!("token lookup failed: {error}"))
                })?;

            Ok(token.map(AccessToken::from))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundbadge_vault::{NewUserToken, VaultConfig};
    use secrecy::SecretString;

    #[tokio::test]
    async fn in_memory_store_returns_inserted_tokens() {
        let store = InMemoryCredentialStore::new();
        store.insert("octocat", AccessToken::new("gho_one")).await;

        let token = store
            .get_credential("octocat")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(token.expose(), "gho_one");
        assert!(store.get_credential("Octocat").await.expect("lookup").is_none());

        assert!(store.remove("octocat").await);
        assert!(store.get_credential("octocat").await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn vault_lookup_runs_off_the_runtime_threads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let vault = TokenVault::open(VaultConfig::new(
            temp.path().join("vault.duckdb"),
            SecretString::from(String::from("0123456789abcdef0123456789abcdef")),
        ))
        .expect("vault");
        vault
            .save_user_token(&NewUserToken {
                username: String::from("octocat"),
                github_user_id: 1,
                access_token: SecretString::from(String::from("gho_vault")),
                scope: String::from("read:user"),
                expires_at: None,
            })
            .expect("save");

        let token = vault
            .get_credential("octocat")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(token.expose(), "gho_vault");
        assert!(vault.get_credential("ghost").await.expect("lookup").is_none());
    }
}
