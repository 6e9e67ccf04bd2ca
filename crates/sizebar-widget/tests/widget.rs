//! Widget bootstrap, host events and runtime controls.

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sizebar_core::{ProductId, Verbosity};
use sizebar_fetch::{
    CatalogClient, FetcherSettings, HostApiSlot, HostProduct, MemoryStorage, RetryPolicy,
    StaticStorefront, Storage, VariationCache, VariationFetcher, DEFAULT_CACHE_TTL,
};
use sizebar_widget::{
    rendered_selectors, EngineTuning, HostEvent, InitState, NodeId, Page, PageKind,
    RecordingNavigator, VariationProvider, Widget, WidgetParts,
};

use support::{card, page_with, provider, sizes, StubProvider};

fn memory_cache() -> Arc<VariationCache> {
    Arc::new(VariationCache::new(
        Arc::new(MemoryStorage::new()) as Arc<dyn Storage>,
        DEFAULT_CACHE_TTL,
    ))
}

fn widget(
    page: Page,
    variations: Arc<dyn VariationProvider>,
    host: HostApiSlot,
    navigator: Arc<RecordingNavigator>,
) -> Arc<Widget> {
    Widget::new(WidgetParts {
        page,
        cache: memory_cache(),
        host,
        variations,
        navigator,
        tuning: EngineTuning::default(),
        host_wait: Duration::from_secs(5),
        verbosity: Verbosity::default(),
    })
}

fn first_button(page: &Page, card: NodeId) -> NodeId {
    page.with(|doc| {
        let selector = rendered_selectors(doc, card)[0];
        doc.children(selector)[0]
    })
}

#[tokio::test(start_paused = true)]
async fn becomes_ready_without_host_after_bounded_wait() {
    let (page, grid) = page_with(vec![card("1")]);
    let card_node = page.with(|doc| doc.children(grid)[0]);
    let (stub, variations) =
        provider(StubProvider::new(Duration::ZERO).with("1", sizes(&["M"], &[])));
    let w = widget(
        page.clone(),
        variations,
        HostApiSlot::new(),
        Arc::new(RecordingNavigator::new()),
    );

    let (_tx, rx) = mpsc::channel(8);
    assert_eq!(w.state(), InitState::Uninitialized);
    let task = w.start(rx).unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(w.state(), InitState::WaitingForHost);
    assert_eq!(stub.calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(w.state(), InitState::Ready);
    assert_eq!(stub.calls(), 1);
    assert_eq!(page.with(|doc| rendered_selectors(doc, card_node).len()), 1);

    let (_tx2, rx2) = mpsc::channel(1);
    assert!(w.start(rx2).is_none(), "second start is ignored");

    w.shutdown();
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn card_appended_during_initial_scan_gets_a_selector() {
    let (page, grid) = page_with(vec![card("1")]);
    let first = page.with(|doc| doc.children(grid)[0]);
    let (stub, variations) = provider(
        StubProvider::new(Duration::from_secs(2))
            .with("1", sizes(&["M"], &[]))
            .with("2", sizes(&["S", "L"], &[])),
    );
    let host = HostApiSlot::new();
    host.install(Arc::new(StaticStorefront::new(Vec::new())));
    let w = widget(
        page.clone(),
        variations,
        host,
        Arc::new(RecordingNavigator::new()),
    );

    let (_tx, rx) = mpsc::channel(8);
    let _task = w.start(rx).unwrap();

    // The first scan is still waiting on card 1's fetch.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let second = page.with(|doc| doc.append_spec(grid, &card("2")));

    tokio::time::sleep(Duration::from_secs(30)).await;
    page.with(|doc| {
        assert_eq!(rendered_selectors(doc, first).len(), 1);
        assert_eq!(rendered_selectors(doc, second).len(), 1);
    });
    assert_eq!(stub.calls(), 2);
    let counts = w.counts();
    assert_eq!((counts.processed, counts.total), (2, 2));
}

#[tokio::test(start_paused = true)]
async fn host_api_event_readies_widget_and_supplies_product_url() {
    let bare = sizebar_widget::NodeSpec::element("div")
        .attr("class", "item-product")
        .attr("data-product-id", "3")
        .child(sizebar_widget::NodeSpec::element("span").attr("class", "price"));
    let (page, grid) = page_with(vec![bare]);
    let card_node = page.with(|doc| doc.children(grid)[0]);
    let (_, variations) =
        provider(StubProvider::new(Duration::ZERO).with("3", sizes(&["S"], &[])));
    let host = HostApiSlot::new();
    let navigator = Arc::new(RecordingNavigator::new());
    let w = widget(page.clone(), variations, host.clone(), Arc::clone(&navigator));

    let (tx, rx) = mpsc::channel(8);
    let task = w.start(rx).unwrap();
    tx.send(HostEvent::PageLoaded(PageKind::Category))
        .await
        .unwrap();
    tx.send(HostEvent::ApiLoaded(Arc::new(StaticStorefront::new(vec![
        HostProduct {
            id: ProductId::parse("3").unwrap(),
            url: Some("/productos/campera-3/".to_owned()),
            options: vec![],
            combinations: vec![],
        },
    ]))))
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(w.state(), InitState::Ready);
    assert!(host.is_installed());

    let button = first_button(&page, card_node);
    assert!(w.activate(button));
    assert_eq!(
        navigator.visited(),
        vec!["/productos/campera-3/?variant=1000".to_owned()]
    );

    w.shutdown();
    task.abort();
}

#[tokio::test(start_paused = true)]
async fn listing_page_event_triggers_rescan() {
    let (page, grid) = page_with(vec![card("1")]);
    let (stub, variations) = provider(
        StubProvider::new(Duration::ZERO)
            .with("1", sizes(&["M"], &[]))
            .with("2", sizes(&["M"], &[]))
            .with("3", sizes(&["M"], &[])),
    );
    let host = HostApiSlot::new();
    host.install(Arc::new(StaticStorefront::default()));
    let w = widget(
        page.clone(),
        variations,
        host,
        Arc::new(RecordingNavigator::new()),
    );

    let (tx, rx) = mpsc::channel(8);
    let task = w.start(rx).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(w.state(), InitState::Ready, "installed host skips the wait");
    assert_eq!(stub.calls(), 1);

    // Stop the observer so only host events can trigger processing.
    w.shutdown();

    page.with(|doc| doc.append_spec(grid, &card("2")));
    tx.send(HostEvent::PageLoaded(PageKind::Product))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(stub.calls(), 1, "product pages do not rescan");

    tx.send(HostEvent::PageLoaded(PageKind::Search))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(stub.calls(), 2);
    let counts = w.counts();
    assert_eq!((counts.processed, counts.total), (2, 2));

    page.with(|doc| doc.append_spec(grid, &card("3")));
    let report = w.reprocess().await.unwrap();
    assert_eq!(report.discovered, 3);
    assert_eq!(report.inserted, 1);

    drop(tx);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn verbose_toggle_is_shared() {
    let (page, _) = page_with(vec![]);
    let (_, variations) = provider(StubProvider::default());
    let w = widget(
        page,
        variations,
        HostApiSlot::new(),
        Arc::new(RecordingNavigator::new()),
    );
    assert!(!w.verbose());
    w.set_verbose(true);
    assert!(w.verbose());
}

// ---------------------------------------------------------------------------
// End to end through the network fetcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn end_to_end_with_proxy_source_and_cache_controls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/combinations"))
        .and(query_param("productId", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "options": [{"name": "Size", "value": "L"}], "inStock": true},
            {"id": 2, "options": [{"name": "Size", "value": "S"}], "unlimited": true},
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let (page, grid) = page_with(vec![card("42")]);
    let card_node = page.with(|doc| doc.children(grid)[0]);
    let host = HostApiSlot::new();
    let cache = memory_cache();
    let client = CatalogClient::new(5, "sizebar-test/0.1", RetryPolicy::immediate())
        .expect("failed to build test CatalogClient");
    let fetcher = VariationFetcher::new(
        Arc::clone(&cache),
        host.clone(),
        client,
        FetcherSettings {
            proxy_url: Some(server.uri()),
            catalog_base_url: server.uri(),
            store_id: "1234".to_owned(),
            public_token: None,
        },
        Verbosity::default(),
    );
    let zero = Duration::ZERO;
    let w = Widget::new(WidgetParts {
        page: page.clone(),
        cache,
        host,
        variations: Arc::new(fetcher),
        navigator: Arc::new(RecordingNavigator::new()),
        tuning: EngineTuning {
            settle: zero,
            batch_size: 5,
            batch_pause: zero,
            debounce: zero,
            stagger: zero,
            frame: zero,
        },
        host_wait: zero,
        verbosity: Verbosity::default(),
    });

    let (_tx, rx) = mpsc::channel(1);
    let task = w.start(rx).unwrap();

    let mut inserted = false;
    for _ in 0..100 {
        if page.with(|doc| !rendered_selectors(doc, card_node).is_empty()) {
            inserted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(inserted, "selector was never inserted");

    let labels: Vec<String> = page.with(|doc| {
        let selector = rendered_selectors(doc, card_node)[0];
        doc.children(selector)
            .iter()
            .filter_map(|&b| doc.text(b).map(str::to_owned))
            .collect()
    });
    assert_eq!(labels, ["S", "L"]);

    assert_eq!(w.cache_stats().count, 1);
    w.clear_cache();
    assert_eq!(w.cache_stats().count, 0);

    w.shutdown();
    task.abort();
}
