//! Integration tests for `VariationFetcher` source ordering, retry and
//! cache population.
//!
//! One `wiremock` server stands in for both the proxy and the catalog API;
//! the two are told apart by path.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sizebar_core::{ProductId, Verbosity};
use sizebar_fetch::{
    CatalogClient, FetcherSettings, HostApiSlot, HostOption, HostProduct, MemoryStorage,
    RetryPolicy, Source, StaticStorefront, Storage, VariationCache, VariationFetcher,
    CACHE_STORAGE_KEY, DEFAULT_CACHE_TTL,
};

const STORE_ID: &str = "1234";
const DIRECT_PATH: &str = "/1234/products/42/combinations";
const PROXY_PATH: &str = "/api/combinations";

fn pid() -> ProductId {
    ProductId::parse("42").unwrap()
}

fn combinations_json() -> serde_json::Value {
    json!([
        {
            "id": 9001,
            "options": [{"name": "Talle", "value": "M"}],
            "inStock": true,
            "sku": "TS-M",
            "price": "15000.00"
        },
        {
            "id": 9002,
            "options": [{"name": "Talle", "value": "L"}],
            "inStock": false,
            "unlimited": false
        }
    ])
}

struct Harness {
    fetcher: VariationFetcher,
    storage: Arc<MemoryStorage>,
    host: HostApiSlot,
}

fn harness(server: &MockServer, with_proxy: bool) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let cache = Arc::new(VariationCache::new(
        Arc::clone(&storage) as Arc<dyn Storage>,
        DEFAULT_CACHE_TTL,
    ));
    let client = CatalogClient::new(5, "sizebar-test/0.1", RetryPolicy::immediate())
        .expect("failed to build test CatalogClient");
    let host = HostApiSlot::new();
    let settings = FetcherSettings {
        proxy_url: with_proxy.then(|| server.uri()),
        catalog_base_url: server.uri(),
        store_id: STORE_ID.to_owned(),
        public_token: Some("pub-token".to_owned()),
    };
    let fetcher = VariationFetcher::new(
        cache,
        host.clone(),
        client,
        settings,
        Verbosity::default(),
    );
    Harness {
        fetcher,
        storage,
        host,
    }
}

// ---------------------------------------------------------------------------
// Proxy fallback and cache population
// ---------------------------------------------------------------------------

#[tokio::test]
async fn proxy_result_is_returned_and_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .and(query_param("productId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DIRECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true);

    let (records, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::Proxy);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].sku.as_deref(), Some("TS-M"));

    assert!(
        h.storage.get_item(CACHE_STORAGE_KEY).unwrap().is_some(),
        "expected cache blob after a network hit"
    );
    assert_eq!(h.fetcher.cache().get(&pid()), Some(records.clone()));

    // Second fetch must be served from the cache; `expect(1)` above is
    // verified when the server drops.
    let (again, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::Cache);
    assert_eq!(again, records);
}

#[tokio::test]
async fn host_api_short_circuits_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    h.host.install(Arc::new(StaticStorefront::new(vec![HostProduct {
        id: pid(),
        url: None,
        options: vec![HostOption {
            name: "Size".to_owned(),
            values: vec!["S".to_owned(), "M".to_owned()],
        }],
        combinations: vec![],
    }])));

    let (records, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::HostApi);
    assert_eq!(records.len(), 2);
    assert_eq!(h.fetcher.cache().get(&pid()), Some(records));
}

#[tokio::test]
async fn host_api_without_product_falls_through_to_proxy() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    h.host.install(Arc::new(StaticStorefront::default()));

    let (_, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::Proxy);
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_three_times_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DIRECT_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let (records, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::Proxy);
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn server_errors_exhaust_proxy_then_direct_forbidden_is_not_retried() {
    let server = MockServer::start().await;

    // 1 attempt + 2 transient retries.
    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DIRECT_PATH))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"code": 403, "message": "Forbidden"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    let records = h.fetcher.fetch(&pid()).await;
    assert!(records.is_empty(), "expected empty result, got {records:?}");
    assert!(h.storage.get_item(CACHE_STORAGE_KEY).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Direct source
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_source_sends_bearer_credential() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(DIRECT_PATH))
        .and(header("authorization", "Bearer pub-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(combinations_json()))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, false);
    let (records, source) = h.fetcher.fetch_with_source(&pid()).await.unwrap();
    assert_eq!(source, Source::Direct);
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn empty_or_malformed_proxy_answers_fall_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(PROXY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(DIRECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true);
    assert!(h.fetcher.fetch_with_source(&pid()).await.is_none());
}
