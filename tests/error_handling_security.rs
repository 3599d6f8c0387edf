//! Behavior-driven tests for error handling and secret hygiene.
//!
//! These tests verify how failures are classified for callers and that
//! access tokens and app secrets never surface in debug output, error
//! messages or the vault's storage.

use std::collections::HashMap;

use fundbadge_core::{
    AccessToken, AppConfig, ConfigError, CredentialStore, FundingError, FundingErrorKind,
    HttpAuth, OAuthAppCredentials, OAuthToken,
};
use fundbadge_vault::{NewUserToken, TokenCipher, TokenVault, VaultConfig, VaultError};
use secrecy::{ExposeSecret, SecretString};
use tempfile::tempdir;

const SECRET: &str = "0123456789abcdef0123456789abcdef";
const OTHER_SECRET: &str = "fedcba9876543210fedcba9876543210";

fn all_errors() -> Vec<FundingError> {
    let unavailable = FundingError::unavailable("upstream returned status 503");
    vec![
        FundingError::invalid_username(fundbadge_core::Platform::Github, "-bad"),
        FundingError::credential_required("token needed"),
        FundingError::not_authorized("octocat"),
        FundingError::user_not_found("ghost"),
        FundingError::access_denied("octocat"),
        FundingError::rate_limit_exceeded("quota"),
        FundingError::unsupported_platform("patreon"),
        FundingError::max_retries_exceeded(3, &unavailable),
        unavailable,
        FundingError::malformed_response("not json"),
        FundingError::timeout("slow"),
        FundingError::credential_store("vault offline"),
        FundingError::internal("bug"),
    ]
}

fn linked_token(username: &str, token: &str) -> NewUserToken {
    NewUserToken {
        username: username.to_owned(),
        github_user_id: 583_231,
        access_token: SecretString::from(token.to_owned()),
        scope: String::from("read:user read:org"),
        expires_at: None,
    }
}

// =============================================================================
// Error Handling: Classification
// =============================================================================

#[test]
fn when_errors_are_raised_then_each_kind_has_its_own_stable_code() {
    // Given: one error of every kind
    let errors = all_errors();

    // When: their codes are collected
    let mut codes: Vec<&str> = errors.iter().map(FundingError::code).collect();
    codes.sort_unstable();
    codes.dedup();

    // Then: every kind maps to a distinct namespaced code
    assert_eq!(codes.len(), errors.len());
    assert!(codes.iter().all(|code| code.starts_with("funding.")));
}

#[test]
fn when_errors_are_raised_then_only_transient_failures_are_retryable() {
    for error in all_errors() {
        let expected = error.kind() == FundingErrorKind::Unavailable;
        assert_eq!(error.retryable(), expected, "{}", error.code());
    }
}

#[test]
fn when_retries_are_exhausted_then_last_failure_is_kept_in_message() {
    // Given: the last attempt failed with a 502
    let last = FundingError::unavailable("github graphql returned status 502");

    // When: the retry budget runs out
    let error = FundingError::max_retries_exceeded(3, &last);

    // Then: the caller sees both the budget and the cause
    assert_eq!(error.kind(), FundingErrorKind::MaxRetriesExceeded);
    assert!(error.message().contains("status 502"));
    assert!(error.to_string().contains("funding.max_retries_exceeded"));
}

#[test]
fn when_account_is_unlinked_then_message_names_the_account() {
    let error = FundingError::not_authorized("octocat");

    assert_eq!(error.kind(), FundingErrorKind::NotAuthorized);
    assert!(error.message().contains("octocat"));
}

// =============================================================================
// Security: Secrets in Debug Output
// =============================================================================

#[test]
fn when_tokens_are_debug_printed_then_their_value_is_redacted() {
    // Given: a token wrapped in every type that carries one
    let token = AccessToken::new("gho_supersecretvalue");
    let auth = HttpAuth::BearerToken(token.clone());
    let grant = OAuthToken {
        access_token: token.clone(),
        token_type: String::from("bearer"),
        scope: String::from("read:user"),
    };

    // When: they are formatted for logs
    let rendered = format!("{token:?} {auth:?} {grant:?}");

    // Then: the raw value never appears
    assert!(!rendered.contains("gho_supersecretvalue"));
    assert!(rendered.contains("REDACTED"));
    assert_eq!(token.expose(), "gho_supersecretvalue");
}

#[test]
fn when_app_credentials_are_debug_printed_then_client_secret_is_hidden() {
    let credentials = OAuthAppCredentials {
        client_id: String::from("Iv1.client"),
        client_secret: SecretString::from(String::from("shh-client-secret")),
        callback_url: String::from("https://badges.example.com/auth/github/callback"),
    };

    let rendered = format!("{credentials:?}");

    assert!(rendered.contains("Iv1.client"));
    assert!(!rendered.contains("shh-client-secret"));
}

#[test]
fn when_configuration_is_debug_printed_then_no_secret_leaks() {
    // Given: a complete environment
    let env: HashMap<&str, &str> = [
        ("GITHUB_TOKEN", "ghp_admin_secret_value"),
        ("GITHUB_OAUTH_CLIENT_ID", "Iv1.client"),
        ("GITHUB_OAUTH_CLIENT_SECRET", "oauth_client_secret_value"),
        (
            "GITHUB_OAUTH_CALLBACK_URL",
            "https://badges.example.com/auth/github/callback",
        ),
        ("ENCRYPTION_SECRET", SECRET),
    ]
    .into_iter()
    .collect();

    // When: it is loaded and printed
    let config = AppConfig::from_lookup(|name| env.get(name).map(|value| (*value).to_owned()))
        .expect("config should load");
    let rendered = format!("{config:?}");

    // Then: none of the secrets are visible
    assert!(!rendered.contains("ghp_admin_secret_value"));
    assert!(!rendered.contains("oauth_client_secret_value"));
    assert!(!rendered.contains(SECRET));
}

#[test]
fn when_required_secret_is_missing_then_error_names_the_variable_only() {
    let error = AppConfig::from_lookup(|_| None).expect_err("empty environment must fail");

    assert_eq!(
        error,
        ConfigError::Missing {
            name: "GITHUB_TOKEN"
        }
    );
}

// =============================================================================
// Security: Tokens at Rest
// =============================================================================

#[test]
fn when_token_is_sealed_then_ciphertext_hides_it_and_varies_per_call() {
    // Given: a cipher keyed by the configured secret
    let cipher = TokenCipher::new(&SecretString::from(SECRET.to_owned())).expect("strong secret");

    // When: the same token is sealed twice
    let first = cipher.encrypt("gho_user_token").expect("encrypt");
    let second = cipher.encrypt("gho_user_token").expect("encrypt");

    // Then: neither ciphertext contains the token and nonces differ
    assert!(!first.contains("gho_user_token"));
    assert_ne!(first, second);
    assert_eq!(
        cipher.decrypt(&first).expect("decrypt").expose_secret(),
        "gho_user_token"
    );
}

#[test]
fn when_sealed_token_is_tampered_then_decryption_fails() {
    let cipher = TokenCipher::new(&SecretString::from(SECRET.to_owned())).expect("strong secret");
    let sealed = cipher.encrypt("gho_user_token").expect("encrypt");

    let mut tampered = sealed.into_bytes();
    let middle = tampered.len() / 2;
    tampered[middle] = if tampered[middle] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).expect("base64 stays ascii");

    assert!(matches!(
        cipher.decrypt(&tampered),
        Err(VaultError::Decrypt(_))
    ));
    assert!(matches!(
        cipher.decrypt("not base64 at all!"),
        Err(VaultError::Decrypt(_))
    ));
}

#[test]
fn when_encryption_secret_is_short_then_vault_refuses_to_open() {
    let dir = tempdir().expect("temp dir");

    let result = TokenVault::open(VaultConfig::new(
        dir.path().join("vault.duckdb"),
        SecretString::from(String::from("too-short")),
    ));

    assert!(matches!(result, Err(VaultError::WeakSecret { .. })));
}

#[test]
fn when_secret_changes_then_stored_tokens_cannot_be_read() {
    // Given: a token stored under one secret
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("vault.duckdb");
    {
        let vault = TokenVault::open(VaultConfig::new(
            &path,
            SecretString::from(SECRET.to_owned()),
        ))
        .expect("open vault");
        vault
            .save_user_token(&linked_token("octocat", "gho_user_token"))
            .expect("save token");
    }

    // When: the vault is reopened with a different secret
    let vault = TokenVault::open(VaultConfig::new(
        &path,
        SecretString::from(OTHER_SECRET.to_owned()),
    ))
    .expect("reopen vault");

    // Then: the row exists but cannot be decrypted
    assert!(vault.has_token("octocat").expect("has_token"));
    assert!(matches!(
        vault.get_user_token("octocat"),
        Err(VaultError::Decrypt(_))
    ));
}

#[tokio::test]
async fn when_vault_cannot_decrypt_then_credential_lookup_reports_store_failure() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("vault.duckdb");
    {
        let vault = TokenVault::open(VaultConfig::new(
            &path,
            SecretString::from(SECRET.to_owned()),
        ))
        .expect("open vault");
        vault
            .save_user_token(&linked_token("octocat", "gho_user_token"))
            .expect("save token");
    }
    let vault = TokenVault::open(VaultConfig::new(
        &path,
        SecretString::from(OTHER_SECRET.to_owned()),
    ))
    .expect("reopen vault");

    let error = vault
        .get_credential("octocat")
        .await
        .expect_err("undecryptable token must fail");

    assert_eq!(error.kind(), FundingErrorKind::CredentialStore);
    assert!(!error.message().contains("gho_user_token"));
}

#[tokio::test]
async fn when_account_is_linked_then_vault_serves_its_token_as_credential() {
    let dir = tempdir().expect("temp dir");
    let vault = TokenVault::open(VaultConfig::new(
        dir.path().join("vault.duckdb"),
        SecretString::from(SECRET.to_owned()),
    ))
    .expect("open vault");
    vault
        .save_user_token(&linked_token("octocat", "gho_user_token"))
        .expect("save token");

    let linked = vault
        .get_credential("octocat")
        .await
        .expect("lookup should succeed");
    let unlinked = vault
        .get_credential("someone-else")
        .await
        .expect("lookup should succeed");

    assert_eq!(
        linked.map(|token| token.expose().to_owned()).as_deref(),
        Some("gho_user_token")
    );
    assert!(unlinked.is_none());

    let record = vault
        .token_record("octocat")
        .expect("record lookup")
        .expect("record exists");
    assert!(record.last_used_at.is_some());
}
