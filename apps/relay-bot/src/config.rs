//! Bot configuration from the environment.
//!
//! | Variable                 | Default           |
//! |--------------------------|-------------------|
//! | `BOT_TOKEN`              | required          |
//! | `RELAY_DOWNLOAD_DIR`     | `downloads`       |
//! | `RELAY_API_CONFIG`       | `api_config.json` |
//! | `RELAY_MAX_UPLOAD_BYTES` | 2 GiB             |

use std::path::PathBuf;

use anyhow::{Context, bail};
use linkrelay_pipeline::PipelineSettings;
use linkrelay_pipeline::types::DEFAULT_MAX_UPLOAD_SIZE;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub token: String,
    /// Staging root for downloaded artifacts.
    pub download_dir: PathBuf,
    /// Endpoint selection file; may be absent.
    pub api_config_path: PathBuf,
    pub max_upload_bytes: u64,
}

impl BotConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let token = get("BOT_TOKEN").map(|t| t.trim().to_string()).unwrap_or_default();
        if token.is_empty() {
            bail!("BOT_TOKEN is not set");
        }

        let max_upload_bytes = match get("RELAY_MAX_UPLOAD_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("RELAY_MAX_UPLOAD_BYTES is not a byte count: {raw}"))?,
            None => DEFAULT_MAX_UPLOAD_SIZE,
        };

        Ok(Self {
            token,
            download_dir: get("RELAY_DOWNLOAD_DIR")
                .map_or_else(|| PathBuf::from("downloads"), PathBuf::from),
            api_config_path: get("RELAY_API_CONFIG")
                .map_or_else(|| PathBuf::from("api_config.json"), PathBuf::from),
            max_upload_bytes,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            download_dir: self.download_dir.clone(),
            max_upload_size: self.max_upload_bytes,
            ..PipelineSettings::default()
        }
    }
}
