//! Size entries → selector fragment, plus button activation.

use std::sync::{Mutex, PoisonError};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sizebar_core::{ProductId, SizeEntry, VariationId};
use sizebar_fetch::HostApiSlot;

use crate::dom::{Document, NodeId, NodeSpec};
use crate::locator::{card_link, SELECTOR_CLASS, SELECTOR_PRODUCT_ATTR};

pub const BUTTON_CLASS: &str = "sizebar-size";
pub const UNAVAILABLE_CLASS: &str = "sizebar-size--unavailable";

/// Everything but RFC 3986 unreserved characters is escaped in query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Navigation side effect of activating an in-stock size button.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Navigator that only records targets. Used headless and in tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) {
        tracing::info!(url, "navigating to variant");
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_owned());
    }
}

/// Product page URL for `id`: a link inside the card, then the host API,
/// then the storefront's generic product route.
#[must_use]
pub fn resolve_product_url(
    doc: &Document,
    card: NodeId,
    id: &ProductId,
    host: &HostApiSlot,
) -> String {
    card_link(doc, card)
        .or_else(|| host.get().and_then(|api| api.product_url(id)))
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "/productos/?product_id={}",
                utf8_percent_encode(id.as_str(), QUERY_VALUE)
            )
        })
}

/// `base` with `variant=<variation>` added to its query string.
#[must_use]
pub fn variant_url(base: &str, variation: &VariationId) -> String {
    let (head, fragment) = match base.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (base, None),
    };
    let separator = match head.chars().last() {
        _ if !head.contains('?') => "?",
        Some('?' | '&') => "",
        _ => "&",
    };
    let mut url = format!(
        "{head}{separator}variant={}",
        utf8_percent_encode(variation.as_str(), QUERY_VALUE)
    );
    if let Some(frag) = fragment {
        url.push('#');
        url.push_str(frag);
    }
    url
}

/// Builds the selector fragment for `entries`, or `None` when there is
/// nothing to show.
///
/// In-stock buttons carry their navigation target in `data-href`; the
/// variant parameter is added only when the entry has a variation id.
/// Out-of-stock buttons are disabled and carry no target.
#[must_use]
pub fn build_selector(entries: &[SizeEntry], id: &ProductId, product_url: &str) -> Option<NodeSpec> {
    if entries.is_empty() {
        return None;
    }

    let container = NodeSpec::element("div")
        .attr("class", SELECTOR_CLASS)
        .attr(SELECTOR_PRODUCT_ATTR, id.as_str())
        .attr("role", "group")
        .attr("aria-label", "Sizes");

    Some(entries.iter().fold(container, |container, entry| {
        container.child(size_button(entry, product_url))
    }))
}

fn size_button(entry: &SizeEntry, product_url: &str) -> NodeSpec {
    let mut button = NodeSpec::element("button")
        .attr("type", "button")
        .attr("data-size", &entry.value)
        .text(&entry.value);

    if let Some(variation) = &entry.variation_id {
        button = button.attr("data-variant-id", variation.as_str());
    }
    if let Some(sku) = &entry.sku {
        button = button.attr("data-sku", sku);
    }

    if entry.in_stock {
        let href = entry.variation_id.as_ref().map_or_else(
            || product_url.to_owned(),
            |variation| variant_url(product_url, variation),
        );
        button.attr("class", BUTTON_CLASS).attr("data-href", &href)
    } else {
        button
            .attr("class", &format!("{BUTTON_CLASS} {UNAVAILABLE_CLASS}"))
            .attr("disabled", "")
            .attr("aria-disabled", "true")
    }
}

/// Follows a size button's target. Returns `false` (and does nothing) for
/// disabled buttons and anything that is not a size button.
pub fn activate(doc: &Document, button: NodeId, navigator: &dyn Navigator) -> bool {
    if !doc.has_class(button, BUTTON_CLASS) || doc.has_attr(button, "disabled") {
        return false;
    }
    let Some(href) = doc.attr(button, "data-href") else {
        return false;
    };
    navigator.navigate(href);
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use sizebar_fetch::{HostProduct, StaticStorefront};

    fn pid() -> ProductId {
        ProductId::parse("42").unwrap()
    }

    fn entry(value: &str, in_stock: bool, variation: Option<&str>) -> SizeEntry {
        SizeEntry {
            value: value.to_owned(),
            in_stock,
            variation_id: variation.map(VariationId::new),
            sku: None,
            price: None,
        }
    }

    #[test]
    fn empty_entries_build_nothing() {
        assert!(build_selector(&[], &pid(), "/p").is_none());
    }

    #[test]
    fn in_stock_and_out_of_stock_buttons() {
        let spec = build_selector(
            &[entry("S", true, Some("901")), entry("M", false, Some("902"))],
            &pid(),
            "/productos/remera/",
        )
        .unwrap();
        assert_eq!(spec.attrs["class"], SELECTOR_CLASS);
        assert_eq!(spec.attrs[SELECTOR_PRODUCT_ATTR], "42");

        let s = &spec.children[0];
        assert_eq!(s.text.as_deref(), Some("S"));
        assert_eq!(s.attrs["data-href"], "/productos/remera/?variant=901");
        assert!(!s.attrs.contains_key("disabled"));

        let m = &spec.children[1];
        assert!(m.attrs["class"].contains(UNAVAILABLE_CLASS));
        assert!(m.attrs.contains_key("disabled"));
        assert_eq!(m.attrs["aria-disabled"], "true");
        assert!(!m.attrs.contains_key("data-href"));
    }

    #[test]
    fn variant_is_appended_to_existing_query_and_before_fragment() {
        let v = VariationId::new("7");
        assert_eq!(variant_url("/p?color=red", &v), "/p?color=red&variant=7");
        assert_eq!(variant_url("/p?", &v), "/p?variant=7");
        assert_eq!(variant_url("/p#reviews", &v), "/p?variant=7#reviews");
        assert_eq!(
            variant_url("/p", &VariationId::new("a b")),
            "/p?variant=a%20b"
        );
    }

    #[test]
    fn variant_value_keeps_unreserved_and_escapes_the_rest() {
        assert_eq!(
            variant_url("/p", &VariationId::new("a-b_c.d~e")),
            "/p?variant=a-b_c.d~e"
        );
        assert_eq!(
            variant_url("/p", &VariationId::new("x&y=ñ")),
            "/p?variant=x%26y%3D%C3%B1"
        );
    }

    #[test]
    fn product_url_resolution_order() {
        let card_spec = NodeSpec::element("div").attr("class", "item-product");
        let doc = Document::from_specs(&[card_spec.clone()]);
        let card = doc.children(doc.root())[0];
        let host = HostApiSlot::new();

        assert_eq!(
            resolve_product_url(&doc, card, &pid(), &host),
            "/productos/?product_id=42"
        );

        host.install(Arc::new(StaticStorefront::new(vec![HostProduct {
            id: pid(),
            url: Some("/productos/desde-host/".to_owned()),
            options: vec![],
            combinations: vec![],
        }])));
        assert_eq!(
            resolve_product_url(&doc, card, &pid(), &host),
            "/productos/desde-host/"
        );

        let linked = Document::from_specs(&[card_spec
            .child(NodeSpec::element("a").attr("href", "/productos/remera-42/"))]);
        let card = linked.children(linked.root())[0];
        assert_eq!(
            resolve_product_url(&linked, card, &pid(), &host),
            "/productos/remera-42/"
        );
    }

    #[test]
    fn activation_respects_disabled_state() {
        let spec = build_selector(
            &[entry("S", true, Some("1")), entry("M", false, None)],
            &pid(),
            "/p",
        )
        .unwrap();
        let doc = Document::from_specs(&[spec]);
        let container = doc.children(doc.root())[0];
        let buttons = doc.children(container).to_vec();
        let nav = RecordingNavigator::new();

        assert!(!activate(&doc, buttons[1], &nav));
        assert!(!activate(&doc, container, &nav));
        assert!(activate(&doc, buttons[0], &nav));
        assert_eq!(nav.visited(), vec!["/p?variant=1".to_owned()]);
    }
}
