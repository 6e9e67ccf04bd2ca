//! Time-expiring cache of variation records, persisted as a single blob.
//!
//! The whole cache lives under one storage key:
//!
//! ```json
//! { "timestamp": 1718000000000, "products": { "123": [ ... ] } }
//! ```
//!
//! Expiry is global: once `timestamp` is older than the TTL the blob is
//! dropped in full, and every `set` rewrites the blob with a fresh timestamp.
//! All operations are best-effort. Storage and parse failures are logged and
//! behave like an empty cache.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sizebar_core::{ProductId, VariationRecord};

use crate::clock::{Clock, SystemClock};
use crate::storage::Storage;

/// Storage key holding the cache blob.
pub const CACHE_STORAGE_KEY: &str = "sizebar_variations_cache";

/// Default expiry window for the whole cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheBlob {
    timestamp: i64,
    #[serde(default)]
    products: BTreeMap<String, Vec<VariationRecord>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of products with cached records.
    pub count: usize,
    /// Size of the persisted blob in bytes.
    pub approx_byte_size: usize,
}

pub struct VariationCache {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    // Serializes read-modify-write in `set`.
    write_lock: Mutex<()>,
}

impl VariationCache {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, ttl: Duration) -> Self {
        Self::with_clock(storage, ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(storage: Arc<dyn Storage>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            ttl,
            write_lock: Mutex::new(()),
        }
    }

    /// Cached records for `id`, or `None` on a miss or an expired cache.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<Vec<VariationRecord>> {
        let (mut blob, _) = self.load()?;
        blob.products.remove(id.as_str())
    }

    /// Merges `records` for `id` into the blob and refreshes its timestamp.
    pub fn set(&self, id: &ProductId, records: &[VariationRecord]) {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut blob = self.load().map(|(blob, _)| blob).unwrap_or_default();
        blob.products.insert(id.as_str().to_owned(), records.to_vec());
        blob.timestamp = self.clock.now_millis();

        let raw = match serde_json::to_string(&blob) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize variation cache");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(CACHE_STORAGE_KEY, &raw) {
            tracing::warn!(product_id = %id, error = %e, "could not persist variation cache");
        }
    }

    /// Drops every cached product.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(CACHE_STORAGE_KEY) {
            tracing::warn!(error = %e, "could not clear variation cache");
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.load().map_or(
            CacheStats {
                count: 0,
                approx_byte_size: 0,
            },
            |(blob, size)| CacheStats {
                count: blob.products.len(),
                approx_byte_size: size,
            },
        )
    }

    /// Reads the blob, clearing it when expired. Returns the blob and its
    /// serialized size.
    fn load(&self) -> Option<(CacheBlob, usize)> {
        let raw = match self.storage.get_item(CACHE_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "variation cache unavailable");
                return None;
            }
        };

        let blob: CacheBlob = match serde_json::from_str(&raw) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::debug!(error = %e, "discarding malformed variation cache");
                self.clear();
                return None;
            }
        };

        let age_millis = self.clock.now_millis().saturating_sub(blob.timestamp);
        let ttl_millis = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        if age_millis > ttl_millis {
            tracing::debug!(age_millis, ttl_millis, "variation cache expired");
            self.clear();
            return None;
        }

        Some((blob, raw.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use sizebar_core::{OptionValue, VariationId};

    fn pid(raw: &str) -> ProductId {
        ProductId::parse(raw).unwrap()
    }

    fn records(size: &str) -> Vec<VariationRecord> {
        vec![VariationRecord {
            id: Some(VariationId::new("1")),
            options: vec![OptionValue {
                name: "Talle".to_owned(),
                value: size.to_owned(),
            }],
            in_stock: Some(true),
            unlimited: None,
            sku: Some("SKU-1".to_owned()),
            price: Some("100.00".to_owned()),
        }]
    }

    fn cache_with_clock() -> (VariationCache, Arc<ManualClock>, Arc<MemoryStorage>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let storage = Arc::new(MemoryStorage::new());
        let cache = VariationCache::with_clock(
            Arc::clone(&storage) as Arc<dyn Storage>,
            DEFAULT_CACHE_TTL,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (cache, clock, storage)
    }

    #[test]
    fn set_then_get_round_trips() {
        let (cache, _, _) = cache_with_clock();
        cache.set(&pid("10"), &records("M"));
        assert_eq!(cache.get(&pid("10")), Some(records("M")));
        assert_eq!(cache.get(&pid("11")), None);
    }

    #[test]
    fn set_merges_products() {
        let (cache, _, _) = cache_with_clock();
        cache.set(&pid("10"), &records("M"));
        cache.set(&pid("11"), &records("L"));
        assert_eq!(cache.get(&pid("10")), Some(records("M")));
        assert_eq!(cache.get(&pid("11")), Some(records("L")));
        assert_eq!(cache.stats().count, 2);
    }

    #[test]
    fn expiry_clears_every_product() {
        let (cache, clock, storage) = cache_with_clock();
        cache.set(&pid("10"), &records("M"));
        cache.set(&pid("11"), &records("L"));

        clock.advance(DEFAULT_CACHE_TTL + Duration::from_secs(1));

        assert_eq!(cache.get(&pid("10")), None);
        assert!(storage.get_item(CACHE_STORAGE_KEY).unwrap().is_none());
        assert_eq!(cache.get(&pid("11")), None);
    }

    #[test]
    fn any_write_refreshes_the_global_timestamp() {
        let (cache, clock, _) = cache_with_clock();
        cache.set(&pid("10"), &records("M"));
        clock.advance(DEFAULT_CACHE_TTL - Duration::from_secs(60));
        cache.set(&pid("11"), &records("L"));
        clock.advance(Duration::from_secs(120));
        // 10 was written more than a TTL ago but survives with the blob.
        assert_eq!(cache.get(&pid("10")), Some(records("M")));
    }

    #[test]
    fn malformed_blob_is_an_empty_cache() {
        let (cache, _, storage) = cache_with_clock();
        storage.set_item(CACHE_STORAGE_KEY, "{not json").unwrap();
        assert_eq!(cache.get(&pid("10")), None);
        assert_eq!(cache.stats().count, 0);
        cache.set(&pid("10"), &records("S"));
        assert_eq!(cache.get(&pid("10")), Some(records("S")));
    }

    #[test]
    fn stats_reports_blob_size() {
        let (cache, _, storage) = cache_with_clock();
        assert_eq!(
            cache.stats(),
            CacheStats {
                count: 0,
                approx_byte_size: 0
            }
        );
        cache.set(&pid("10"), &records("M"));
        let raw = storage.get_item(CACHE_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(cache.stats().approx_byte_size, raw.len());
    }

    #[test]
    fn clear_drops_everything() {
        let (cache, _, _) = cache_with_clock();
        cache.set(&pid("10"), &records("M"));
        cache.clear();
        assert_eq!(cache.get(&pid("10")), None);
    }
}
