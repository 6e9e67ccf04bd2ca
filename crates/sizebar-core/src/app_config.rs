use std::net::SocketAddr;
use std::path::PathBuf;

/// Settings for the storefront-side widget and the operator CLI.
#[derive(Clone)]
pub struct WidgetConfig {
    pub store_id: String,
    pub proxy_url: Option<String>,
    pub catalog_base_url: String,
    pub public_token: Option<String>,
    pub cache_dir: PathBuf,
    pub cache_ttl_hours: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub log_level: String,
    pub verbose: bool,
}

impl std::fmt::Debug for WidgetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetConfig")
            .field("store_id", &self.store_id)
            .field("proxy_url", &self.proxy_url)
            .field("catalog_base_url", &self.catalog_base_url)
            .field(
                "public_token",
                &self.public_token.as_ref().map(|_| "[redacted]"),
            )
            .field("cache_dir", &self.cache_dir)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("log_level", &self.log_level)
            .field("verbose", &self.verbose)
            .finish()
    }
}

/// Settings for the credential-holding combinations proxy.
#[derive(Clone)]
pub struct ProxyConfig {
    pub store_id: String,
    pub catalog_token: String,
    pub catalog_base_url: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("store_id", &self.store_id)
            .field("catalog_token", &"[redacted]")
            .field("catalog_base_url", &self.catalog_base_url)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
