use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;

use super::{CacheBackend, CacheError};

impl From<::redis::RedisError> for CacheError {
    fn from(error: ::redis::RedisError) -> Self {
        Self::Backend(error.to_string())
    }
}

/// Shared cache backend on a Redis server.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Opens a managed connection to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = ::redis::Client::open(url)?;
        let connection = client.get_connection_manager().await?;
        tracing::info!("connected to redis cache");
        Ok(Self { connection })
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

impl CacheBackend for RedisCache {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let value: Option<String> = connection.get(key).await?;
            Ok(value)
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            // SETEX rejects zero; round sub-second TTLs up.
            let seconds = ttl.as_secs().max(1);
            let () = connection.set_ex(key, value, seconds).await?;
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let () = connection.del(key).await?;
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let mut connection = self.connection.clone();
            let reply: String = ::redis::cmd("PING").query_async(&mut connection).await?;
            if reply == "PONG" {
                Ok(())
            } else {
                Err(CacheError::Backend(format!("unexpected PING reply: {reply}")))
            }
        })
    }
}
