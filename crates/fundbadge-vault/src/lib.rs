//! # fundbadge vault
//!
//! Encrypted persistence for the GitHub access tokens users grant through the
//! OAuth flow.
//!
//! Tokens are sealed with AES-256-GCM ([`TokenCipher`]) before they touch
//! disk and live in a single `DuckDB` table:
//!
//! | Column | Description |
//! |--------|-------------|
//! | `username` | GitHub login, primary key |
//! | `github_user_id` | numeric account id |
//! | `access_token` | sealed token, `base64(nonce || ciphertext)` |
//! | `scope` | granted OAuth scopes |
//! | `expires_at` | optional expiry reported by GitHub |
//! | `created_at` / `updated_at` | record bookkeeping |
//! | `last_used_at` | set each time the token is read for a fetch |
//!
//! All values are bound as statement parameters.
//!
//! ```rust,no_run
//! use fundbadge_vault::{NewUserToken, TokenVault, VaultConfig};
//! use secrecy::SecretString;
//!
//! let vault = TokenVault::open(VaultConfig::new(
//!     "./data/fundbadge.duckdb",
//!     SecretString::from(String::from("a-secret-of-at-least-32-characters!")),
//! ))?;
//!
//! vault.save_user_token(&NewUserToken {
//!     username: String::from("octocat"),
//!     github_user_id: 583231,
//!     access_token: SecretString::from(String::from("gho_example")),
//!     scope: String::from("read:user,read:org"),
//!     expires_at: None,
//! })?;
//! assert!(vault.has_token("octocat")?);
//! # Ok::<(), fundbadge_vault::VaultError>(())
//! ```
//!
//! The API is synchronous; async callers run it on a blocking thread.

mod crypto;
mod error;
pub mod migrations;
mod pool;

use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, OptionalExt, Row};
use secrecy::{ExposeSecret, SecretString};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use crypto::{TokenCipher, MIN_SECRET_LEN};
pub use error::VaultError;
pub use pool::{ConnectionPool, PooledConnection};

/// Location and key material for a vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub db_path: PathBuf,
    pub max_pool_size: usize,
    pub encryption_secret: SecretString,
}

impl VaultConfig {
    pub fn new(db_path: impl Into<PathBuf>, encryption_secret: SecretString) -> Self {
        Self {
            db_path: db_path.into(),
            max_pool_size: 4,
            encryption_secret,
        }
    }
}

/// Token grant to persist.
#[derive(Debug, Clone)]
pub struct NewUserToken {
    pub username: String,
    pub github_user_id: i64,
    pub access_token: SecretString,
    pub scope: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Stored authorization metadata. Never carries the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTokenRecord {
    pub username: String,
    pub github_user_id: i64,
    pub scope: String,
    pub expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
}

/// `DuckDB`-backed store of sealed user tokens.
#[derive(Clone)]
pub struct TokenVault {
    pool: ConnectionPool,
    cipher: TokenCipher,
}

impl TokenVault {
    /// Opens (creating if needed) the database file and applies migrations.
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        let cipher = TokenCipher::new(&config.encryption_secret)?;
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = ConnectionPool::new(config.db_path, config.max_pool_size);
        let connection = pool.checkout()?;
        migrations::apply_migrations(&connection)?;
        drop(connection);

        tracing::info!(path = %pool.path().display(), "token vault ready");
        Ok(Self { pool, cipher })
    }

    pub fn db_path(&self) -> &Path {
        self.pool.path()
    }

    /// Inserts or replaces the grant for `token.username`.
    ///
    /// On replace the token, scope and expiry are overwritten and
    /// `updated_at` advances; `created_at` and the account id are kept.
    pub fn save_user_token(&self, token: &NewUserToken) -> Result<(), VaultError> {
        let sealed = self.cipher.encrypt(token.access_token.expose_secret())?;
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let expires_at = token.expires_at.map(format_timestamp).transpose()?;

        let connection = self.pool.checkout()?;
        connection.execute(
            "INSERT INTO user_tokens
                (username, github_user_id, access_token, scope, expires_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (username) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at",
            params![
                token.username,
                token.github_user_id,
                sealed,
                token.scope,
                expires_at,
                now,
                now,
            ],
        )?;

        tracing::info!(username = %token.username, "user token saved");
        Ok(())
    }

    /// Returns the decrypted token for `username` and stamps `last_used_at`.
    pub fn get_user_token(&self, username: &str) -> Result<Option<SecretString>, VaultError> {
        let connection = self.pool.checkout()?;
        let sealed: Option<String> = connection
            .query_row(
                "SELECT access_token FROM user_tokens WHERE username = ?",
                params![username],
                |row| row.get(0),
            )
            .optional()?;

        let Some(sealed) = sealed else {
            return Ok(None);
        };

        connection.execute(
            "UPDATE user_tokens SET last_used_at = ? WHERE username = ?",
            params![format_timestamp(OffsetDateTime::now_utc())?, username],
        )?;

        self.cipher.decrypt(&sealed).map(Some)
    }

    /// Removes the grant. Returns whether a row existed.
    pub fn delete_user_token(&self, username: &str) -> Result<bool, VaultError> {
        let connection = self.pool.checkout()?;
        let deleted = connection.execute(
            "DELETE FROM user_tokens WHERE username = ?",
            params![username],
        )?;

        if deleted > 0 {
            tracing::info!(username, "user token deleted");
        }
        Ok(deleted > 0)
    }

    pub fn has_token(&self, username: &str) -> Result<bool, VaultError> {
        let connection = self.pool.checkout()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM user_tokens WHERE username = ?",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn token_record(&self, username: &str) -> Result<Option<UserTokenRecord>, VaultError> {
        let connection = self.pool.checkout()?;
        let raw = connection
            .query_row(
                "SELECT username, github_user_id, scope, expires_at, created_at, updated_at, last_used_at
                 FROM user_tokens WHERE username = ?",
                params![username],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::into_record).transpose()
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("db_path", &self.db_path())
            .finish_non_exhaustive()
    }
}

struct RawRecord {
    username: String,
    github_user_id: i64,
    scope: String,
    expires_at: Option<String>,
    created_at: String,
    updated_at: String,
    last_used_at: Option<String>,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> Result<Self, ::duckdb::Error> {
        Ok(Self {
            username: row.get(0)?,
            github_user_id: row.get(1)?,
            scope: row.get(2)?,
            expires_at: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            last_used_at: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<UserTokenRecord, VaultError> {
        Ok(UserTokenRecord {
            username: self.username,
            github_user_id: self.github_user_id,
            scope: self.scope,
            expires_at: parse_optional("expires_at", self.expires_at)?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            last_used_at: parse_optional("last_used_at", self.last_used_at)?,
        })
    }
}

fn format_timestamp(value: OffsetDateTime) -> Result<String, VaultError> {
    value
        .format(&Rfc3339)
        .map_err(|error| VaultError::InvalidData {
            column: "timestamp",
            message: error.to_string(),
        })
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<OffsetDateTime, VaultError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|error| VaultError::InvalidData {
        column,
        message: error.to_string(),
    })
}

fn parse_optional(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<OffsetDateTime>, VaultError> {
    value
        .as_deref()
        .map(|value| parse_timestamp(column, value))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn open_vault() -> (TempDir, TokenVault) {
        let temp = tempdir().expect("tempdir");
        let vault = TokenVault::open(VaultConfig::new(
            temp.path().join("data").join("vault.duckdb"),
            SecretString::from(String::from(SECRET)),
        ))
        .expect("vault open");
        (temp, vault)
    }

    fn grant(username: &str, token: &str, scope: &str) -> NewUserToken {
        NewUserToken {
            username: username.to_owned(),
            github_user_id: 583231,
            access_token: SecretString::from(token.to_owned()),
            scope: scope.to_owned(),
            expires_at: None,
        }
    }

    #[test]
    fn saved_token_reads_back_decrypted() {
        let (_temp, vault) = open_vault();
        vault
            .save_user_token(&grant("octocat", "gho_first", "read:user"))
            .expect("save");

        let token = vault.get_user_token("octocat").expect("get").expect("present");
        assert_eq!(token.expose_secret(), "gho_first");
        assert!(vault.has_token("octocat").expect("has"));
        assert!(vault.get_user_token("ghost").expect("get").is_none());
    }

    #[test]
    fn token_is_not_stored_in_plaintext() {
        let (_temp, vault) = open_vault();
        vault
            .save_user_token(&grant("octocat", "gho_plaintext_marker", "read:user"))
            .expect("save");

        let connection = vault.pool.checkout().expect("checkout");
        let stored: String = connection
            .query_row(
                "SELECT access_token FROM user_tokens WHERE username = 'octocat'",
                [],
                |row| row.get(0),
            )
            .expect("raw row");
        assert!(!stored.contains("gho_plaintext_marker"));
    }

    #[test]
    fn save_upserts_and_keeps_creation_time() {
        let (_temp, vault) = open_vault();
        vault
            .save_user_token(&grant("octocat", "gho_first", "read:user"))
            .expect("first save");
        let created = vault
            .token_record("octocat")
            .expect("record")
            .expect("present")
            .created_at;

        vault
            .save_user_token(&grant("octocat", "gho_second", "read:user,read:org"))
            .expect("second save");

        let record = vault.token_record("octocat").expect("record").expect("present");
        assert_eq!(record.scope, "read:user,read:org");
        assert_eq!(record.created_at, created);
        assert!(record.updated_at >= created);
        assert_eq!(
            vault
                .get_user_token("octocat")
                .expect("get")
                .expect("present")
                .expose_secret(),
            "gho_second"
        );
    }

    #[test]
    fn reading_a_token_stamps_last_used() {
        let (_temp, vault) = open_vault();
        vault
            .save_user_token(&grant("octocat", "gho_first", "read:user"))
            .expect("save");
        assert!(vault
            .token_record("octocat")
            .expect("record")
            .expect("present")
            .last_used_at
            .is_none());

        vault.get_user_token("octocat").expect("get");

        let record = vault.token_record("octocat").expect("record").expect("present");
        assert!(record.last_used_at.is_some());
    }

    #[test]
    fn delete_reports_whether_a_row_existed() {
        let (_temp, vault) = open_vault();
        vault
            .save_user_token(&grant("octocat", "gho_first", "read:user"))
            .expect("save");

        assert!(vault.delete_user_token("octocat").expect("delete"));
        assert!(!vault.delete_user_token("octocat").expect("second delete"));
        assert!(!vault.has_token("octocat").expect("has"));
    }

    #[test]
    fn hostile_usernames_are_bound_as_parameters() {
        let (_temp, vault) = open_vault();
        let hostile = "x'; DROP TABLE user_tokens; --";
        vault
            .save_user_token(&grant(hostile, "gho_first", "read:user"))
            .expect("save");

        assert!(vault.has_token(hostile).expect("has"));
        assert!(!vault.has_token("x").expect("has"));
    }

    #[test]
    fn reopening_with_another_secret_cannot_decrypt() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("vault.duckdb");
        {
            let vault = TokenVault::open(VaultConfig::new(
                &path,
                SecretString::from(String::from(SECRET)),
            ))
            .expect("open");
            vault
                .save_user_token(&grant("octocat", "gho_first", "read:user"))
                .expect("save");
        }

        let reopened = TokenVault::open(VaultConfig::new(
            &path,
            SecretString::from(String::from("fedcba9876543210fedcba9876543210")),
        ))
        .expect("reopen");
        assert!(matches!(
            reopened.get_user_token("octocat"),
            Err(VaultError::Decrypt(_))
        ));
    }
}
