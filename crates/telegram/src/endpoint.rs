//! Which Bot API server to talk to.
//!
//! Read once at startup from a small JSON file:
//!
//! ```json
//! { "use_local_api": true, "local_api_url": "http://localhost:8081",
//!   "official_api_url": "https://api.telegram.org" }
//! ```
//!
//! A missing file selects the official endpoint. A local Bot API server
//! lifts the official upload limit, but the relay keeps its own ceiling.

use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_LOCAL_URL: &str = "http://localhost:8081";
const DEFAULT_OFFICIAL_URL: &str = "https://api.telegram.org";

/// Errors from loading the endpoint config.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed endpoint config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: `{value}`")]
    InvalidUrl { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpointConfig {
    pub use_local_api: bool,
    pub local_api_url: String,
    pub official_api_url: String,
}

impl Default for ApiEndpointConfig {
    fn default() -> Self {
        Self {
            use_local_api: false,
            local_api_url: DEFAULT_LOCAL_URL.to_string(),
            official_api_url: DEFAULT_OFFICIAL_URL.to_string(),
        }
    }
}

impl ApiEndpointConfig {
    /// Loads and validates the config at `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no endpoint config, using official API");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;

        info!(
            path = %path.display(),
            local = config.use_local_api,
            endpoint = config.endpoint(),
            "endpoint config loaded"
        );
        Ok(config)
    }

    /// Both URLs must be absolute http(s) URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("local_api_url", &self.local_api_url)?;
        check_url("official_api_url", &self.official_api_url)
    }

    /// Selected endpoint, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        let url = if self.use_local_api {
            &self.local_api_url
        } else {
            &self.official_api_url
        };
        url.trim_end_matches('/')
    }

    /// Base URL for bot methods: `{endpoint}/bot{token}`.
    pub fn bot_base_url(&self, token: &str) -> String {
        format!("{}/bot{token}", self.endpoint())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(())
}
