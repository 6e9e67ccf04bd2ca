//! Credentialed client for the catalog combinations endpoint.

use std::time::Duration;

use anyhow::Context;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use sizebar_core::{ProductId, ProxyConfig};
use sizebar_fetch::client::combinations_url;

/// Raw upstream answer, forwarded as-is.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

pub struct Upstream {
    client: reqwest::Client,
    base_url: String,
    store_id: String,
    token: String,
}

impl Upstream {
    pub fn from_config(config: &ProxyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            client,
            base_url: config.catalog_base_url.clone(),
            store_id: config.store_id.clone(),
            token: config.catalog_token.clone(),
        })
    }

    /// Fetches combinations for `product_id` with the server-held credential.
    ///
    /// Any HTTP status is a successful reply; only transport and URL errors
    /// fail.
    pub async fn combinations(&self, product_id: &ProductId) -> anyhow::Result<UpstreamReply> {
        let url = combinations_url(&self.base_url, &self.store_id, product_id)?;
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading body from {url} failed"))?;

        if !(200..300).contains(&status) {
            tracing::warn!(
                status,
                url = %url,
                body = %String::from_utf8_lossy(&body),
                "upstream returned non-success status"
            );
        }

        Ok(UpstreamReply {
            status,
            content_type,
            body,
        })
    }
}
