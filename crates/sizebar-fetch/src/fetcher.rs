//! Multi-source variation fetcher.
//!
//! Sources are tried in order and the first non-empty result wins:
//!
//! 1. the local [`VariationCache`],
//! 2. the host storefront API, when one is installed,
//! 3. the credential-holding proxy, when configured,
//! 4. the catalog API directly with the public credential.
//!
//! The direct call usually fails with 403 because public credentials lack
//! the catalog scope; it stays as a last resort. Source failures are logged
//! and never surfaced: a product with no reachable data simply gets no
//! records.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sizebar_core::{ProductId, VariationRecord, Verbosity, WidgetConfig};

use crate::cache::VariationCache;
use crate::client::CatalogClient;
use crate::error::FetchError;
use crate::host::{records_from_host_product, HostApiSlot};
use crate::rate_limit::RetryPolicy;
use crate::storage::{FileStorage, Storage};

/// Where a set of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    HostApi,
    Proxy,
    Direct,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::Cache => "cache",
            Source::HostApi => "host_api",
            Source::Proxy => "proxy",
            Source::Direct => "direct",
        };
        f.write_str(name)
    }
}

/// Endpoints and credentials for the network sources.
#[derive(Clone)]
pub struct FetcherSettings {
    /// Base URL of the proxy service; `None` skips the proxy source.
    pub proxy_url: Option<String>,
    pub catalog_base_url: String,
    pub store_id: String,
    /// Client credential for the direct source.
    pub public_token: Option<String>,
}

impl fmt::Debug for FetcherSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherSettings")
            .field("proxy_url", &self.proxy_url)
            .field("catalog_base_url", &self.catalog_base_url)
            .field("store_id", &self.store_id)
            .field(
                "public_token",
                &self.public_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl From<&WidgetConfig> for FetcherSettings {
    fn from(config: &WidgetConfig) -> Self {
        Self {
            proxy_url: config.proxy_url.clone(),
            catalog_base_url: config.catalog_base_url.clone(),
            store_id: config.store_id.clone(),
            public_token: config.public_token.clone(),
        }
    }
}

pub struct VariationFetcher {
    cache: Arc<VariationCache>,
    host: HostApiSlot,
    client: CatalogClient,
    settings: FetcherSettings,
    verbosity: Verbosity,
}

impl VariationFetcher {
    #[must_use]
    pub fn new(
        cache: Arc<VariationCache>,
        host: HostApiSlot,
        client: CatalogClient,
        settings: FetcherSettings,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            cache,
            host,
            client,
            settings,
            verbosity,
        }
    }

    /// Wires a fetcher from configuration: file-backed cache under
    /// `cache_dir`, default retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &WidgetConfig,
        host: HostApiSlot,
        verbosity: Verbosity,
    ) -> Result<Self, FetchError> {
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.cache_dir.clone()));
        let ttl = Duration::from_secs(config.cache_ttl_hours.saturating_mul(3600));
        let cache = Arc::new(VariationCache::new(storage, ttl));
        let client = CatalogClient::new(
            config.request_timeout_secs,
            &config.user_agent,
            RetryPolicy::default(),
        )?;
        Ok(Self::new(
            cache,
            host,
            client,
            FetcherSettings::from(config),
            verbosity,
        ))
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<VariationCache> {
        &self.cache
    }

    /// Records for `id` from the first source that has any; empty when none do.
    pub async fn fetch(&self, id: &ProductId) -> Vec<VariationRecord> {
        self.fetch_with_source(id)
            .await
            .map(|(records, _)| records)
            .unwrap_or_default()
    }

    /// Like [`Self::fetch`], also reporting which source answered.
    ///
    /// Results from anything but the cache are written back to the cache
    /// before returning.
    pub async fn fetch_with_source(
        &self,
        id: &ProductId,
    ) -> Option<(Vec<VariationRecord>, Source)> {
        if let Some(records) = self.cache.get(id).filter(|r| !r.is_empty()) {
            self.note(id, Source::Cache, records.len());
            return Some((records, Source::Cache));
        }

        if let Some(records) = self.from_host(id) {
            return Some(self.remember(id, records, Source::HostApi));
        }

        if let Some(proxy) = self.settings.proxy_url.as_deref() {
            let result = self.client.fetch_via_proxy(proxy, id).await;
            if let Some(records) = Self::accept(id, Source::Proxy, result) {
                return Some(self.remember(id, records, Source::Proxy));
            }
        }

        let result = self
            .client
            .fetch_direct(
                &self.settings.catalog_base_url,
                &self.settings.store_id,
                self.settings.public_token.as_deref(),
                id,
            )
            .await;
        if let Some(records) = Self::accept(id, Source::Direct, result) {
            return Some(self.remember(id, records, Source::Direct));
        }

        tracing::debug!(product_id = %id, "no variation source returned data");
        None
    }

    fn from_host(&self, id: &ProductId) -> Option<Vec<VariationRecord>> {
        let api = self.host.get()?;
        let Some(product) = api.product_by_id(id) else {
            if self.verbosity.enabled() {
                tracing::info!(product_id = %id, "host API does not know this product");
            }
            return None;
        };
        let records = records_from_host_product(&product);
        (!records.is_empty()).then_some(records)
    }

    fn accept(
        id: &ProductId,
        source: Source,
        result: Result<Vec<VariationRecord>, FetchError>,
    ) -> Option<Vec<VariationRecord>> {
        match result {
            Ok(records) if !records.is_empty() => Some(records),
            Ok(_) => {
                tracing::debug!(product_id = %id, %source, "source returned no combinations");
                None
            }
            Err(FetchError::Forbidden { url, body }) => {
                tracing::warn!(
                    product_id = %id,
                    %source,
                    url = %url,
                    body = %body,
                    "source refused access"
                );
                None
            }
            Err(e) => {
                tracing::warn!(product_id = %id, %source, error = %e, "source failed");
                None
            }
        }
    }

    fn remember(
        &self,
        id: &ProductId,
        records: Vec<VariationRecord>,
        source: Source,
    ) -> (Vec<VariationRecord>, Source) {
        self.cache.set(id, &records);
        self.note(id, source, records.len());
        (records, source)
    }

    fn note(&self, id: &ProductId, source: Source, count: usize) {
        if self.verbosity.enabled() {
            tracing::info!(product_id = %id, %source, count, "variations resolved");
        }
    }
}
