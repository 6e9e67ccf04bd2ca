//! Product-card discovery and lookup of the product id and insertion point.
//!
//! Storefront themes disagree on markup, so each lookup walks an ordered
//! list of conventions and takes the first hit.

use std::sync::LazyLock;

use regex::Regex;
use sizebar_core::ProductId;

use crate::dom::{Document, NodeId, SelectorList};

/// Card markup used by the supported storefront themes.
pub const CARD_SELECTORS: &str =
    ".js-item-product, .item-product, .product-item, [data-product-card]";

/// Class carried by every rendered size selector.
pub const SELECTOR_CLASS: &str = "sizebar-selector";

/// Attribute holding the product id on a rendered selector.
pub const SELECTOR_PRODUCT_ATTR: &str = "data-sizebar-product";

fn selector_list(source: &str) -> SelectorList {
    SelectorList::parse(source).expect("valid selector")
}

pub(crate) static CARDS: LazyLock<SelectorList> = LazyLock::new(|| selector_list(CARD_SELECTORS));

pub(crate) static RENDERED: LazyLock<SelectorList> =
    LazyLock::new(|| selector_list(&format!(".{SELECTOR_CLASS}")));

static PRODUCT_CONTAINER: LazyLock<SelectorList> =
    LazyLock::new(|| selector_list(".js-product-container[data-product-id]"));

static WITH_PRODUCT_ID: LazyLock<SelectorList> =
    LazyLock::new(|| selector_list("[data-product-id]"));

static WITH_DATA_ID: LazyLock<SelectorList> = LazyLock::new(|| selector_list("[data-id]"));

static LINKS: LazyLock<SelectorList> = LazyLock::new(|| selector_list("a[href]"));

/// Price selectors in priority order.
static PRICE_ANCHORS: LazyLock<Vec<SelectorList>> = LazyLock::new(|| {
    [
        ".js-price-display",
        ".item-price",
        ".price",
        "[data-price]",
        ".product-price",
        "[class*=\"price\"]",
    ]
    .into_iter()
    .map(selector_list)
    .collect()
});

/// Content wrappers tried when a card has no price element.
static FALLBACK_WRAPPERS: LazyLock<Vec<SelectorList>> = LazyLock::new(|| {
    [".item-info", ".js-item-info", ".item-description"]
        .into_iter()
        .map(selector_list)
        .collect()
});

static LEGACY_DOM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:item-)?product-(\d+)$").expect("valid regex"));

static PRODUCT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/productos/[^/?#]*-(\d+)(?:[/?#]|$)|/products/(\d+)(?:[/?#]|$)")
        .expect("valid regex")
});

static PRODUCT_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&](?:product_id|productId|id)=(\d+)(?:[&#]|$)").expect("valid regex")
});

/// Where a selector goes inside a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Immediately after the price element.
    After(NodeId),
    /// As the last child of a content wrapper (or the card itself).
    Append(NodeId),
}

/// Attached product cards in document order, outermost only.
///
/// Themes often nest a `.js-item-product` inside a `.item-product`; the
/// inner match would otherwise be processed as a second card.
#[must_use]
pub fn find_cards(doc: &Document) -> Vec<NodeId> {
    doc.query_all(doc.root(), &CARDS)
        .into_iter()
        .filter(|&card| doc.closest_ancestor(card, &CARDS).is_none())
        .collect()
}

/// Product id for the card at `node`, or `None` if no convention yields one.
#[must_use]
pub fn locate_id(doc: &Document, node: NodeId) -> Option<ProductId> {
    own_id(doc, node)
        .or_else(|| {
            doc.query(node, &PRODUCT_CONTAINER)
                .and_then(|c| attr_id(doc, c, "data-product-id"))
        })
        .or_else(|| {
            doc.query_all(node, &WITH_PRODUCT_ID)
                .into_iter()
                .find_map(|d| attr_id(doc, d, "data-product-id"))
        })
        .or_else(|| legacy_dom_id(doc, node))
        .or_else(|| attr_id(doc, node, "data-id"))
        .or_else(|| {
            doc.query_all(node, &WITH_DATA_ID)
                .into_iter()
                .find_map(|d| attr_id(doc, d, "data-id"))
        })
        .or_else(|| link_id(doc, node))
        .or_else(|| {
            doc.ancestors(node).find_map(|a| {
                own_id(doc, a)
                    .or_else(|| legacy_dom_id(doc, a))
                    .or_else(|| attr_id(doc, a, "data-id"))
            })
        })
}

fn own_id(doc: &Document, node: NodeId) -> Option<ProductId> {
    attr_id(doc, node, "data-product-id")
}

fn attr_id(doc: &Document, node: NodeId, name: &str) -> Option<ProductId> {
    doc.attr(node, name).and_then(ProductId::parse)
}

fn legacy_dom_id(doc: &Document, node: NodeId) -> Option<ProductId> {
    let raw = doc.attr(node, "id")?;
    let caps = LEGACY_DOM_ID.captures(raw.trim())?;
    ProductId::parse(caps.get(1)?.as_str())
}

fn link_id(doc: &Document, node: NodeId) -> Option<ProductId> {
    let own = doc.matches(node, &LINKS).then_some(node);
    own.into_iter()
        .chain(doc.query_all(node, &LINKS))
        .filter_map(|a| doc.attr(a, "href"))
        .find_map(id_from_href)
}

/// Numeric product id embedded in a product-detail link.
#[must_use]
pub fn id_from_href(href: &str) -> Option<ProductId> {
    let from_path = PRODUCT_PATH.captures(href).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_owned())
    });
    let digits = from_path.or_else(|| {
        PRODUCT_QUERY
            .captures(href)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    })?;
    ProductId::parse(&digits)
}

/// First link in the card that points at a product page.
#[must_use]
pub fn card_link(doc: &Document, card: NodeId) -> Option<String> {
    let hrefs: Vec<&str> = doc
        .query_all(card, &LINKS)
        .into_iter()
        .filter_map(|a| doc.attr(a, "href"))
        .map(str::trim)
        .filter(|h| !h.is_empty() && *h != "#" && !h.starts_with("javascript:"))
        .collect();
    hrefs
        .iter()
        .find(|h| h.contains("/productos/") || h.contains("/products/"))
        .or_else(|| hrefs.first())
        .map(|h| (*h).to_owned())
}

/// Price element of the card, if any.
#[must_use]
pub fn locate_price_anchor(doc: &Document, card: NodeId) -> Option<NodeId> {
    PRICE_ANCHORS.iter().find_map(|list| {
        doc.query_all(card, list)
            .into_iter()
            .find(|&n| doc.closest_ancestor(n, &RENDERED).is_none())
    })
}

/// Where the selector for `card` should be inserted.
#[must_use]
pub fn locate_insertion_point(doc: &Document, card: NodeId) -> InsertionPoint {
    if let Some(price) = locate_price_anchor(doc, card) {
        return InsertionPoint::After(price);
    }
    let wrapper = FALLBACK_WRAPPERS
        .iter()
        .find_map(|list| doc.query(card, list))
        .unwrap_or(card);
    InsertionPoint::Append(wrapper)
}

/// Rendered selectors inside `card`, in document order.
#[must_use]
pub fn rendered_selectors(doc: &Document, card: NodeId) -> Vec<NodeId> {
    doc.query_all(card, &RENDERED)
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod tests;
