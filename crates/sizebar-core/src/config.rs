use std::env::VarError;

use crate::app_config::{ProxyConfig, WidgetConfig};
use crate::ConfigError;

const DEFAULT_CATALOG_BASE_URL: &str = "https://api.tiendanube.com/v1";
const DEFAULT_USER_AGENT: &str = "sizebar/0.1 (size-selector)";

/// Load widget configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_widget_config() -> Result<WidgetConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_widget_config_from_env()
}

/// Load widget configuration from environment variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_widget_config_from_env() -> Result<WidgetConfig, ConfigError> {
    build_widget_config(|key| std::env::var(key))
}

/// Load proxy configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_proxy_config() -> Result<ProxyConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_proxy_config_from_env()
}

/// Load proxy configuration from environment variables already in the process.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_proxy_config_from_env() -> Result<ProxyConfig, ConfigError> {
    build_proxy_config(|key| std::env::var(key))
}

/// Small accessor bundle over an env-var lookup function, so the parsing
/// rules are shared between the widget and proxy configs.
struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    fn require(&self, var: &str) -> Result<String, ConfigError> {
        match (self.lookup)(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    }

    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var).ok().filter(|v| !v.trim().is_empty())
    }

    fn or_default(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.or_default(var, default);
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    }
}

fn build_widget_config<F>(lookup: F) -> Result<WidgetConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    use std::path::PathBuf;

    let env = Env { lookup };

    let store_id = env.require("SIZEBAR_STORE_ID")?;
    let proxy_url = env.optional("SIZEBAR_PROXY_URL");
    let catalog_base_url = env.or_default("SIZEBAR_CATALOG_BASE_URL", DEFAULT_CATALOG_BASE_URL);
    let public_token = env.optional("SIZEBAR_PUBLIC_TOKEN");
    let cache_dir = PathBuf::from(env.or_default("SIZEBAR_CACHE_DIR", "./.sizebar-cache"));
    let cache_ttl_hours = env.parse::<u64>("SIZEBAR_CACHE_TTL_HOURS", "12")?;
    let request_timeout_secs = env.parse::<u64>("SIZEBAR_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = env.or_default("SIZEBAR_USER_AGENT", DEFAULT_USER_AGENT);
    let log_level = env.or_default("SIZEBAR_LOG_LEVEL", "info");
    let verbose = env.parse::<bool>("SIZEBAR_VERBOSE", "false")?;

    if cache_ttl_hours == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "SIZEBAR_CACHE_TTL_HOURS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(WidgetConfig {
        store_id,
        proxy_url,
        catalog_base_url,
        public_token,
        cache_dir,
        cache_ttl_hours,
        request_timeout_secs,
        user_agent,
        log_level,
        verbose,
    })
}

fn build_proxy_config<F>(lookup: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    use std::net::SocketAddr;

    let env = Env { lookup };

    let store_id = env.require("SIZEBAR_STORE_ID")?;
    let catalog_token = env.require("SIZEBAR_CATALOG_TOKEN")?;
    let catalog_base_url = env.or_default("SIZEBAR_CATALOG_BASE_URL", DEFAULT_CATALOG_BASE_URL);
    let bind_addr = env.parse::<SocketAddr>("SIZEBAR_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = env.or_default("SIZEBAR_LOG_LEVEL", "info");
    let request_timeout_secs = env.parse::<u64>("SIZEBAR_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = env.or_default("SIZEBAR_USER_AGENT", DEFAULT_USER_AGENT);

    Ok(ProxyConfig {
        store_id,
        catalog_token,
        catalog_base_url,
        bind_addr,
        log_level,
        request_timeout_secs,
        user_agent,
    })
}
