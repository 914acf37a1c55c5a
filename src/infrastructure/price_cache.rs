//! TTL-keyed caches
//!
//! A small generic TTL map backs both the per-(product, marketplace)
//! listing cache and the engine's outer comparison-result cache.
//! Entries are immutable once written; every write is a whole-entry
//! replacement, so readers never observe partial updates.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{Listing, MarketplaceId, ProductId};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Shared in-memory map whose entries expire after a per-entry TTL.
/// Expired entries are treated as absent at read time and removed
/// either then or by [`TtlCache::purge_expired`].
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the value when present and fresh; a stale entry is
    /// dropped and reported as absent.
    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Upgrade to a write lock only to evict the stale entry.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired()) {
            entries.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Sweep expired entries; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Listing cache keyed by (product, marketplace).
#[derive(Debug)]
pub struct PriceCache {
    inner: TtlCache<(ProductId, MarketplaceId), Listing>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new(ttl),
        }
    }

    pub async fn get(&self, product_id: &ProductId, marketplace_id: &MarketplaceId) -> Option<Listing> {
        self.inner
            .get(&(product_id.clone(), marketplace_id.clone()))
            .await
    }

    pub async fn put(&self, listing: Listing) {
        self.inner
            .insert(
                (listing.product_id.clone(), listing.marketplace_id.clone()),
                listing,
            )
            .await;
    }

    pub async fn purge_expired(&self) -> usize {
        let removed = self.inner.purge_expired().await;
        if removed > 0 {
            debug!(removed, "purged expired listings from price cache");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn listing(marketplace: &str) -> Listing {
        Listing {
            product_id: ProductId::new("B000TEST01").unwrap(),
            marketplace_id: marketplace.into(),
            price: dec!(29.99),
            shipping_cost: None,
            currency: "EUR".into(),
            available: true,
            title: None,
            source_url: format!("https://{marketplace}/dp/B000TEST01"),
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn entry_is_present_before_ttl_and_absent_after() {
        let cache = PriceCache::new(Duration::from_millis(40));
        let product = ProductId::new("B000TEST01").unwrap();
        cache.put(listing("amazon.de")).await;

        assert!(cache.get(&product, &"amazon.de".into()).await.is_some());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&product, &"amazon.de".into()).await.is_none());
        // The stale entry was evicted on read.
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn keys_are_per_marketplace() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let product = ProductId::new("B000TEST01").unwrap();
        cache.put(listing("amazon.de")).await;

        assert!(cache.get(&product, &"amazon.de".into()).await.is_some());
        assert!(cache.get(&product, &"amazon.it".into()).await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_the_whole_entry() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let product = ProductId::new("B000TEST01").unwrap();
        cache.put(listing("amazon.de")).await;

        let mut updated = listing("amazon.de");
        updated.price = dec!(19.99);
        cache.put(updated).await;

        let got = cache.get(&product, &"amazon.de".into()).await.unwrap();
        assert_eq!(got.price, dec!(19.99));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_entries() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60));
        cache.insert_with_ttl("stale", 1, Duration::from_millis(10)).await;
        cache.insert("fresh", 2).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let removed = cache.purge_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.get(&"fresh").await, Some(2));
        assert!(cache.get(&"stale").await.is_none());
    }
}
