//! Embedded storefront API exposed by the host page.
//!
//! The host may publish its own product data client-side. When it does,
//! variation records are built from that data without any network call.
//! The API becomes available at an arbitrary point after page load, so it
//! is held in a [`HostApiSlot`] that the bootstrap fills in later.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use sizebar_core::{is_size_option, OptionValue, ProductId, VariationId, VariationRecord};

/// Product as described by the host storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostProduct {
    pub id: ProductId,
    /// Canonical product page URL, if the host knows it.
    #[serde(default)]
    pub url: Option<String>,
    /// Selectable options in declaration order, e.g. `Color`, `Talle`.
    #[serde(default)]
    pub options: Vec<HostOption>,
    /// Explicit combinations; each `values` entry lines up with `options`.
    #[serde(default)]
    pub combinations: Vec<HostCombination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostOption {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCombination {
    #[serde(default)]
    pub id: Option<VariationId>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub unlimited: Option<bool>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
}

/// Client-side product lookups offered by the host storefront.
pub trait StorefrontApi: Send + Sync {
    fn product_by_id(&self, id: &ProductId) -> Option<HostProduct>;

    fn product_url(&self, id: &ProductId) -> Option<String> {
        self.product_by_id(id).and_then(|p| p.url)
    }
}

/// Late-bound handle to the host API, shared by the fetcher and the engine.
#[derive(Clone, Default)]
pub struct HostApiSlot(Arc<RwLock<Option<Arc<dyn StorefrontApi>>>>);

impl HostApiSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, api: Arc<dyn StorefrontApi>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(api);
    }

    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn StorefrontApi>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for HostApiSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HostApiSlot")
            .field(&self.is_installed())
            .finish()
    }
}

/// Storefront API backed by a fixed product table. Used by the CLI's
/// `--host-catalog` flag and by tests.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticStorefront {
    products: Vec<HostProduct>,
}

impl StaticStorefront {
    #[must_use]
    pub fn new(products: Vec<HostProduct>) -> Self {
        Self { products }
    }

    fn index(&self) -> HashMap<&ProductId, &HostProduct> {
        self.products.iter().map(|p| (&p.id, p)).collect()
    }
}

impl StorefrontApi for StaticStorefront {
    fn product_by_id(&self, id: &ProductId) -> Option<HostProduct> {
        self.index().get(id).map(|p| (*p).clone())
    }
}

/// Builds variation records from host product data.
///
/// Returns an empty vec when the product has no size-like option. Explicit
/// combinations are carried over with their stock flags; without them, one
/// record per size value is synthesized as in stock with unlimited stock
/// and no SKU.
#[must_use]
pub fn records_from_host_product(product: &HostProduct) -> Vec<VariationRecord> {
    let Some(size_idx) = product.options.iter().position(|o| is_size_option(&o.name)) else {
        return Vec::new();
    };

    if product.combinations.is_empty() {
        let name = &product.options[size_idx].name;
        return product.options[size_idx]
            .values
            .iter()
            .map(|value| VariationRecord {
                id: None,
                options: vec![OptionValue {
                    name: name.clone(),
                    value: value.clone(),
                }],
                in_stock: Some(true),
                unlimited: Some(true),
                sku: None,
                price: None,
            })
            .collect();
    }

    product
        .combinations
        .iter()
        .map(|combo| VariationRecord {
            id: combo.id.clone(),
            options: product
                .options
                .iter()
                .zip(&combo.values)
                .map(|(option, value)| OptionValue {
                    name: option.name.clone(),
                    value: value.clone(),
                })
                .collect(),
            in_stock: combo.in_stock,
            unlimited: combo.unlimited,
            sku: combo.sku.clone().filter(|s| !s.is_empty()),
            price: combo.price.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: &str) -> ProductId {
        ProductId::parse(raw).unwrap()
    }

    fn product(options: Vec<HostOption>, combinations: Vec<HostCombination>) -> HostProduct {
        HostProduct {
            id: pid("77"),
            url: Some("/productos/remera-77/".to_owned()),
            options,
            combinations,
        }
    }

    fn option(name: &str, values: &[&str]) -> HostOption {
        HostOption {
            name: name.to_owned(),
            values: values.iter().map(|v| (*v).to_owned()).collect(),
        }
    }

    #[test]
    fn no_size_option_yields_nothing() {
        let p = product(vec![option("Color", &["Rojo"])], vec![]);
        assert!(records_from_host_product(&p).is_empty());
    }

    #[test]
    fn synthesizes_one_record_per_size_without_combinations() {
        let p = product(vec![option("TALLE", &["S", "M"])], vec![]);
        let records = records_from_host_product(&p);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].size_value(), Some("M"));
        assert!(records.iter().all(VariationRecord::is_in_stock));
        assert!(records.iter().all(|r| r.sku.is_none()));
    }

    #[test]
    fn maps_combinations_onto_option_names() {
        let p = product(
            vec![option("Color", &["Rojo"]), option("Talle", &["S", "M"])],
            vec![
                HostCombination {
                    id: Some(VariationId::new("501")),
                    values: vec!["Rojo".to_owned(), "S".to_owned()],
                    in_stock: Some(false),
                    unlimited: Some(false),
                    sku: Some(String::new()),
                    price: None,
                },
                HostCombination {
                    id: Some(VariationId::new("502")),
                    values: vec!["Rojo".to_owned(), "M".to_owned()],
                    in_stock: Some(true),
                    unlimited: None,
                    sku: Some("RM".to_owned()),
                    price: Some("10".to_owned()),
                },
            ],
        );
        let records = records_from_host_product(&p);
        assert_eq!(records[0].size_value(), Some("S"));
        assert!(!records[0].is_in_stock());
        assert!(records[0].sku.is_none());
        assert_eq!(records[1].id, Some(VariationId::new("502")));
        assert!(records[1].is_in_stock());
    }

    #[test]
    fn slot_starts_empty_and_installs() {
        let slot = HostApiSlot::new();
        assert!(!slot.is_installed());
        let store = StaticStorefront::new(vec![product(vec![], vec![])]);
        slot.install(Arc::new(store));
        let api = slot.get().unwrap();
        assert_eq!(
            api.product_url(&pid("77")).as_deref(),
            Some("/productos/remera-77/")
        );
        assert!(api.product_by_id(&pid("78")).is_none());
    }
}
