use thiserror::Error;

/// Errors raised by the token vault.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encryption secret must be at least {min} characters")]
    WeakSecret { min: usize },

    #[error("stored token could not be decrypted: {0}")]
    Decrypt(String),

    #[error("token encryption failed")]
    Encrypt,

    #[error("invalid stored value in column '{column}': {message}")]
    InvalidData { column: &'static str, message: String },

    #[error("migration {version} failed: {source}")]
    Migration {
        version: &'static str,
        #[source]
        source: ::duckdb::Error,
    },
}
