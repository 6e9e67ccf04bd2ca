//! Bootstrap and runtime controls.
//!
//! The host storefront announces itself over a [`HostEvent`] channel. The
//! widget waits a bounded time for the host API to appear, then becomes
//! ready either way: without a host API the network sources still work.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sizebar_core::{Verbosity, WidgetConfig};
use sizebar_fetch::{
    CacheStats, FetchError, HostApiSlot, StorefrontApi, VariationCache, VariationFetcher,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::builder::{activate, Navigator};
use crate::dom::{NodeId, Page};
use crate::engine::{Engine, EngineTuning, ProcessingCounts, ScanReport, VariationProvider};

/// How long to wait for the host API before continuing without it.
pub const DEFAULT_HOST_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    WaitingForHost,
    Ready,
}

/// Storefront page templates, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Category,
    Search,
    Product,
    Other,
}

impl PageKind {
    /// Pages that show a grid of product cards.
    #[must_use]
    pub fn is_listing(self) -> bool {
        matches!(self, Self::Home | Self::Category | Self::Search)
    }
}

/// Lifecycle notifications from the host storefront.
pub enum HostEvent {
    ApiLoaded(Arc<dyn StorefrontApi>),
    PageLoaded(PageKind),
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiLoaded(_) => f.write_str("ApiLoaded"),
            Self::PageLoaded(kind) => f.debug_tuple("PageLoaded").field(kind).finish(),
        }
    }
}

/// Everything a [`Widget`] is assembled from.
pub struct WidgetParts {
    pub page: Page,
    pub cache: Arc<VariationCache>,
    pub host: HostApiSlot,
    pub variations: Arc<dyn VariationProvider>,
    pub navigator: Arc<dyn Navigator>,
    pub tuning: EngineTuning,
    pub host_wait: Duration,
    pub verbosity: Verbosity,
}

pub struct Widget {
    cache: Arc<VariationCache>,
    host: HostApiSlot,
    engine: Arc<Engine>,
    navigator: Arc<dyn Navigator>,
    host_wait: Duration,
    verbosity: Verbosity,
    state: Mutex<InitState>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl Widget {
    #[must_use]
    pub fn new(parts: WidgetParts) -> Arc<Self> {
        let engine = Engine::new(
            parts.page,
            parts.variations,
            parts.host.clone(),
            parts.tuning,
            parts.verbosity.clone(),
        );
        Arc::new(Self {
            cache: parts.cache,
            host: parts.host,
            engine,
            navigator: parts.navigator,
            host_wait: parts.host_wait,
            verbosity: parts.verbosity,
            state: Mutex::new(InitState::Uninitialized),
            observer: Mutex::new(None),
        })
    }

    /// Builds a widget backed by the file cache and the catalog sources
    /// named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the HTTP client cannot be built.
    pub fn from_config(
        config: &WidgetConfig,
        page: Page,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Arc<Self>, FetchError> {
        let verbosity = Verbosity::new(config.verbose);
        let host = HostApiSlot::new();
        let fetcher = VariationFetcher::from_config(config, host.clone(), verbosity.clone())?;
        let cache = Arc::clone(fetcher.cache());
        Ok(Self::new(WidgetParts {
            page,
            cache,
            host,
            variations: Arc::new(fetcher),
            navigator,
            tuning: EngineTuning::default(),
            host_wait: DEFAULT_HOST_WAIT,
            verbosity,
        }))
    }

    #[must_use]
    pub fn state(&self) -> InitState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: InitState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        tracing::debug!(state = ?next, "widget state changed");
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Starts the widget on the host event stream.
    ///
    /// Returns `None` if the widget was already started.
    pub fn start(self: &Arc<Self>, events: mpsc::Receiver<HostEvent>) -> Option<JoinHandle<()>> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state != InitState::Uninitialized {
                tracing::debug!("widget already started; ignoring");
                return None;
            }
            *state = InitState::WaitingForHost;
        }
        let widget = Arc::clone(self);
        Some(tokio::spawn(async move { widget.run(events).await }))
    }

    async fn run(self: Arc<Self>, mut events: mpsc::Receiver<HostEvent>) {
        if !self.host.is_installed() {
            self.wait_for_host(&mut events).await;
        }

        self.set_state(InitState::Ready);
        tracing::info!(host_api = self.host.is_installed(), "size selector ready");
        // Subscribe before the first scan so cards appended while it runs
        // are queued instead of missed.
        let observer = self.engine.observe();
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(observer);
        self.engine.process_all().await;

        while let Some(event) = events.recv().await {
            match event {
                HostEvent::ApiLoaded(api) => {
                    tracing::debug!("host API installed after ready");
                    self.host.install(api);
                }
                HostEvent::PageLoaded(kind) if kind.is_listing() => {
                    tracing::debug!(?kind, "listing page loaded; rescanning");
                    self.engine.process_all().await;
                }
                HostEvent::PageLoaded(kind) => {
                    tracing::debug!(?kind, "non-listing page loaded");
                }
            }
        }
        tracing::debug!("host event stream closed");
    }

    async fn wait_for_host(&self, events: &mut mpsc::Receiver<HostEvent>) {
        let wait = async {
            while let Some(event) = events.recv().await {
                match event {
                    HostEvent::ApiLoaded(api) => {
                        self.host.install(api);
                        return;
                    }
                    HostEvent::PageLoaded(kind) => {
                        tracing::debug!(?kind, "page loaded before host API");
                    }
                }
            }
        };
        if tokio::time::timeout(self.host_wait, wait).await.is_err() {
            tracing::info!(
                waited_ms = u64::try_from(self.host_wait.as_millis()).unwrap_or(u64::MAX),
                "host API not available; using network sources only"
            );
        }
    }

    /// Stops the mutation observer, if running.
    pub fn shutdown(&self) {
        if let Some(task) = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        tracing::info!("variation cache cleared");
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Forgets all processed flags and scans again.
    pub async fn reprocess(&self) -> Option<ScanReport> {
        self.engine.reset();
        self.engine.process_all().await
    }

    #[must_use]
    pub fn counts(&self) -> ProcessingCounts {
        self.engine.counts()
    }

    pub fn dedupe_selectors(&self) -> usize {
        self.engine.dedupe_selectors()
    }

    pub fn set_verbose(&self, enabled: bool) {
        self.verbosity.set(enabled);
        tracing::info!(enabled, "verbose logging toggled");
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbosity.enabled()
    }

    /// Activates the size button at `button`. Returns `false` when nothing
    /// happened (disabled or not a size button).
    pub fn activate(&self, button: NodeId) -> bool {
        let navigator = Arc::clone(&self.navigator);
        self.engine
            .page()
            .with(|doc| activate(doc, button, navigator.as_ref()))
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        self.shutdown();
    }
}
