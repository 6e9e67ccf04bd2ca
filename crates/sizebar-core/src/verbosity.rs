use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared switch for per-product diagnostic logging.
///
/// Cloned into every component that emits per-node detail. Off by default;
/// flipping it on any clone affects all of them.
#[derive(Debug, Clone, Default)]
pub struct Verbosity(Arc<AtomicBool>);

impl Verbosity {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}
