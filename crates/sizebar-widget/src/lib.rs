//! Size selectors for storefront product cards.
//!
//! Locates product cards in a [`dom::Document`], fetches their size
//! variations and inserts a row of size buttons next to each card's price.

pub mod builder;
pub mod dom;
pub mod engine;
pub mod extract;
pub mod locator;
pub mod widget;

pub use builder::{
    activate, build_selector, resolve_product_url, variant_url, Navigator, RecordingNavigator,
};
pub use dom::{Document, Mutation, NodeId, NodeSpec, Page, SelectorError, SelectorList};
pub use engine::{
    Engine, EngineTuning, ProcessOutcome, ProcessingCounts, ScanReport, VariationProvider,
};
pub use extract::extract_sizes;
pub use locator::{
    card_link, find_cards, id_from_href, locate_id, locate_insertion_point, locate_price_anchor,
    rendered_selectors, InsertionPoint, CARD_SELECTORS, SELECTOR_CLASS, SELECTOR_PRODUCT_ATTR,
};
pub use widget::{
    HostEvent, InitState, PageKind, Widget, WidgetParts, DEFAULT_HOST_WAIT,
};
