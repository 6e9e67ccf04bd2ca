use futures::future::BoxFuture;
use sizebar_core::{ProductId, VariationRecord};
use sizebar_fetch::VariationFetcher;

/// Source of variation records for the engine.
///
/// Implementations never fail: a product without reachable data yields an
/// empty vec.
pub trait VariationProvider: Send + Sync {
    fn variations<'a>(&'a self, id: &'a ProductId) -> BoxFuture<'a, Vec<VariationRecord>>;
}

impl VariationProvider for VariationFetcher {
    fn variations<'a>(&'a self, id: &'a ProductId) -> BoxFuture<'a, Vec<VariationRecord>> {
        Box::pin(self.fetch(id))
    }
}
