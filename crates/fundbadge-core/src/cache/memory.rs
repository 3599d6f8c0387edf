use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
struct Slot {
    body: String,
    expires_at: Instant,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local cache backend.
///
/// Entries expire lazily: a read past the deadline reports a miss, and
/// [`purge_expired`](InMemoryCache::purge_expired) drops them from the map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.slots.write().await.retain(|_, slot| slot.is_live(now));
    }
}

impl CacheBackend for InMemoryCache {
    fn get<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let slots = self.slots.read().await;
            let now = Instant::now();
            Ok(slots
                .get(key)
                .filter(|slot| slot.is_live(now))
                .map(|slot| slot.body.clone()))
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            let slot = Slot {
                body: value,
                expires_at: Instant::now() + ttl,
            };
            self.slots.write().await.insert(key.to_owned(), slot);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async move {
            self.slots.write().await.remove(key);
            Ok(())
        })
    }

    fn ping<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_overwrites_values() {
        let cache = InMemoryCache::new();

        assert_eq!(cache.get("funding:github:octocat").await.expect("get"), None);

        cache
            .set("funding:github:octocat", String::from("first"), Duration::from_secs(60))
            .await
            .expect("set");
        cache
            .set("funding:github:octocat", String::from("second"), Duration::from_secs(60))
            .await
            .expect("set");

        assert_eq!(
            cache.get("funding:github:octocat").await.expect("get"),
            Some(String::from("second"))
        );
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = InMemoryCache::new();
        cache
            .set("short", String::from("v"), Duration::from_millis(50))
            .await
            .expect("set");
        cache
            .set("long", String::from("v"), Duration::from_secs(60))
            .await
            .expect("set");

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("short").await.expect("get"), None);
        assert!(cache.get("long").await.expect("get").is_some());

        assert_eq!(cache.len().await, 2);
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = InMemoryCache::new();
        cache
            .set("k", String::from("v"), Duration::from_secs(60))
            .await
            .expect("set");
        cache.delete("k").await.expect("delete");

        assert!(cache.is_empty().await);
        assert!(cache.ping().await.is_ok());
    }
}
