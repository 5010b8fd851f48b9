use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::verdict::VatVerdict;

#[async_trait]
pub trait TtlCache: Send + Sync {
    /// Live entry for `key`; expired entries behave as absent.
    async fn get(&self, key: &str) -> Option<VatVerdict>;
    async fn put(&self, key: &str, verdict: VatVerdict, ttl: Duration);
    /// Drops expired entries and returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

#[derive(Clone, Debug)]
struct CacheEntry {
    verdict: VatVerdict,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TtlCache for InMemoryTtlCache {
    async fn get(&self, key: &str) -> Option<VatVerdict> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Some(entry.verdict.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, verdict: VatVerdict, ttl: Duration) {
        let entry = CacheEntry { verdict, expires_at: Instant::now() + ttl };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }
}
