//! URL construction for catalog and proxy requests.

use reqwest::Url;
use sizebar_core::ProductId;

use crate::error::FetchError;

fn parse_base(base: &str) -> Result<Url, FetchError> {
    Url::parse(base.trim()).map_err(|e| FetchError::InvalidUrl {
        url: base.to_owned(),
        reason: e.to_string(),
    })
}

fn cannot_be_base(base: &str) -> FetchError {
    FetchError::InvalidUrl {
        url: base.to_owned(),
        reason: "URL cannot be used as a base".to_owned(),
    }
}

/// Builds `{base}/{store_id}/products/{product_id}/combinations`.
///
/// Path segments are percent-encoded, so an id containing `/` cannot walk
/// out of the endpoint.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if `base` is not an absolute URL.
pub fn combinations_url(
    base: &str,
    store_id: &str,
    product_id: &ProductId,
) -> Result<String, FetchError> {
    let mut url = parse_base(base)?;
    url.path_segments_mut()
        .map_err(|()| cannot_be_base(base))?
        .pop_if_empty()
        .push(store_id)
        .push("products")
        .push(product_id.as_str())
        .push("combinations");
    Ok(url.to_string())
}

/// Builds `{base}/api/combinations?productId={product_id}`.
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] if `base` is not an absolute URL.
pub fn proxy_url(base: &str, product_id: &ProductId) -> Result<String, FetchError> {
    let mut url = parse_base(base)?;
    url.path_segments_mut()
        .map_err(|()| cannot_be_base(base))?
        .pop_if_empty()
        .push("api")
        .push("combinations");
    url.query_pairs_mut()
        .append_pair("productId", product_id.as_str());
    Ok(url.to_string())
}
