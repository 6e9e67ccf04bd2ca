mod app_config;
mod config;
pub mod variations;
mod verbosity;

pub use app_config::{ProxyConfig, WidgetConfig};
pub use config::{
    load_proxy_config, load_proxy_config_from_env, load_widget_config,
    load_widget_config_from_env,
};
pub use variations::{
    is_size_option, OptionValue, ProductId, SizeEntry, VariationId, VariationRecord,
    SIZE_OPTION_NAMES,
};
pub use verbosity::Verbosity;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
