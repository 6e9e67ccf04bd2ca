pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod fetcher;
pub mod host;
pub mod rate_limit;
pub mod storage;

pub use cache::{CacheStats, VariationCache, CACHE_STORAGE_KEY, DEFAULT_CACHE_TTL};
pub use client::CatalogClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FetchError, StorageError};
pub use fetcher::{FetcherSettings, Source, VariationFetcher};
pub use host::{
    records_from_host_product, HostApiSlot, HostCombination, HostOption, HostProduct,
    StaticStorefront, StorefrontApi,
};
pub use rate_limit::RetryPolicy;
pub use storage::{FileStorage, MemoryStorage, Storage};
