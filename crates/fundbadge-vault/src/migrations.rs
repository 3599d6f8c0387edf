//! Ordered schema migrations, applied once each and recorded in
//! `schema_migrations`.

use ::duckdb::{params, Connection};

use crate::VaultError;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: "0001_user_tokens",
    sql: r"
        CREATE TABLE IF NOT EXISTS user_tokens (
            username VARCHAR PRIMARY KEY,
            github_user_id BIGINT NOT NULL,
            access_token VARCHAR NOT NULL,
            scope VARCHAR NOT NULL,
            expires_at VARCHAR,
            created_at VARCHAR NOT NULL,
            updated_at VARCHAR NOT NULL,
            last_used_at VARCHAR
        );
    ",
}];

/// Applies every migration not yet recorded.
pub fn apply_migrations(connection: &Connection) -> Result<(), VaultError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version VARCHAR PRIMARY KEY,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        );",
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection
            .execute_batch(migration.sql)
            .map_err(|source| VaultError::Migration {
                version: migration.version,
                source,
            })?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params![migration.version],
        )?;
        tracing::info!(version = migration.version, "applied vault migration");
    }

    Ok(())
}
