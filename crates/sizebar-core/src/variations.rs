//! Catalog variation records and the normalized size view derived from them.
//!
//! ## Observed shape from the combinations endpoint
//!
//! ### Identifiers
//! Product and combination ids arrive as JSON numbers from the catalog API
//! but as strings from storefront markup (`data-product-id="123"`). Both are
//! accepted and stored as strings so ids round-trip through the local cache
//! without precision loss.
//!
//! ### Stock flags
//! `inStock` and `unlimited` are independently optional. A record counts as
//! purchasable only when it is not explicitly out of stock and either has
//! unlimited stock or is explicitly in stock. See
//! [`VariationRecord::is_in_stock`].
//!
//! ### Price
//! May be a decimal string (`"12990.00"`) or a bare number; kept as the
//! string the catalog sent.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Option names (lowercase) that identify the size-like option of a product.
pub const SIZE_OPTION_NAMES: &[&str] = &[
    "size", "sizes", "talla", "tallas", "talle", "talles", "tamaño", "tamanho", "taille",
    "größe", "grösse",
];

/// Returns `true` if `name` is one of the [`SIZE_OPTION_NAMES`], ignoring
/// case and surrounding whitespace.
#[must_use]
pub fn is_size_option(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    SIZE_OPTION_NAMES.contains(&lowered.as_str())
}

/// JSON scalar accepted wherever the catalog is loose about string vs number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Token {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Token {
    fn into_string(self) -> String {
        match self {
            Token::Str(s) => s,
            Token::Int(n) => n.to_string(),
            Token::UInt(n) => n.to_string(),
            Token::Float(n) => n.to_string(),
        }
    }
}

fn deserialize_opt_token<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Token>::deserialize(deserializer)?.map(Token::into_string))
}

/// Opaque catalog product identifier, discovered from markup or API payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Builds an id from a raw token, trimming whitespace. Returns `None`
    /// for an empty token.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Token::deserialize(deserializer)?.into_string();
        Self::parse(&raw).ok_or_else(|| serde::de::Error::custom("empty product id"))
    }
}

/// Catalog identifier of one option combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VariationId(String);

impl VariationId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VariationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self(Token::deserialize(deserializer)?.into_string()))
    }
}

/// One `name: value` pair of a combination, e.g. `Talle: M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionValue {
    pub name: String,
    pub value: String,
}

/// One purchasable combination of a product's options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<VariationId>,

    #[serde(default)]
    pub options: Vec<OptionValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlimited: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_token",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<String>,
}

impl VariationRecord {
    /// Not explicitly out of stock, and either unlimited or explicitly in stock.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.in_stock != Some(false)
            && (self.unlimited == Some(true) || self.in_stock == Some(true))
    }

    /// Value of the size-like option, if this combination has one.
    #[must_use]
    pub fn size_value(&self) -> Option<&str> {
        self.options
            .iter()
            .find(|o| is_size_option(&o.name))
            .map(|o| o.value.as_str())
    }
}

/// Normalized, render-ready view of one size of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeEntry {
    pub value: String,
    pub in_stock: bool,
    pub variation_id: Option<VariationId>,
    pub sku: Option<String>,
    pub price: Option<String>,
}
