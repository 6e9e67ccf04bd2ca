//! HTTP client for the catalog `combinations` endpoint and the proxy that
//! fronts it.

mod urls;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use sizebar_core::{ProductId, VariationRecord};

use crate::error::FetchError;
use crate::rate_limit::{retry_with_policy, RetryPolicy};

pub use urls::{combinations_url, proxy_url};

/// Fetches variation records over HTTP.
///
/// Maps 429 to [`FetchError::RateLimited`], 403 to [`FetchError::Forbidden`]
/// and any other non-2xx to [`FetchError::UnexpectedStatus`], carrying the
/// response body for logging. Each call is retried under the client's
/// [`RetryPolicy`].
pub struct CatalogClient {
    client: Client,
    policy: RetryPolicy,
}

impl CatalogClient {
    /// Creates a client with the given request timeout, `User-Agent` and
    /// retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, policy })
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches records through the credential-holding proxy.
    ///
    /// # Errors
    ///
    /// Propagates the last error once the retry policy is exhausted, or the
    /// first non-retriable one.
    pub async fn fetch_via_proxy(
        &self,
        proxy_base: &str,
        product_id: &ProductId,
    ) -> Result<Vec<VariationRecord>, FetchError> {
        let url = proxy_url(proxy_base, product_id)?;
        self.get_records("proxy", url, None).await
    }

    /// Fetches records straight from the catalog API with a client credential.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Forbidden`]: the credential lacks access (not retried).
    /// - [`FetchError::RateLimited`]: HTTP 429 after all retries.
    /// - [`FetchError::UnexpectedStatus`] / [`FetchError::Http`]: after retries
    ///   for 5xx and network errors, immediately otherwise.
    /// - [`FetchError::Deserialize`]: body is not a JSON array of records.
    pub async fn fetch_direct(
        &self,
        catalog_base: &str,
        store_id: &str,
        token: Option<&str>,
        product_id: &ProductId,
    ) -> Result<Vec<VariationRecord>, FetchError> {
        let url = combinations_url(catalog_base, store_id, product_id)?;
        self.get_records("direct", url, token).await
    }

    async fn get_records(
        &self,
        source: &str,
        url: String,
        bearer: Option<&str>,
    ) -> Result<Vec<VariationRecord>, FetchError> {
        retry_with_policy(&self.policy, source, || {
            let url = url.clone();
            async move {
                let mut request = self
                    .client
                    .get(&url)
                    .header(reqwest::header::ACCEPT, "application/json");
                if let Some(token) = bearer {
                    request = request.bearer_auth(token);
                }

                let response = request.send().await?;
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS {
                    return Err(FetchError::RateLimited { url });
                }

                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    if status == StatusCode::FORBIDDEN {
                        return Err(FetchError::Forbidden { url, body });
                    }
                    return Err(FetchError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                        body,
                    });
                }

                let body = response.text().await?;
                serde_json::from_str::<Vec<VariationRecord>>(&body).map_err(|e| {
                    FetchError::Deserialize {
                        context: format!("combinations from {url}"),
                        source: e,
                    }
                })
            }
        })
        .await
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
