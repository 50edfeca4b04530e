use std::path::PathBuf;

use anyhow::{Context, Result};
use xm_bucket::S3Config;

pub const XM_HOURLY_URL: &str = "http://servapibi.xm.com.co/hourly";
pub const DEFAULT_METRIC_ID: &str = "DemaComeNoReg";
pub const DEFAULT_ENTITY: &str = "CIIU";
pub const DEFAULT_MINIO_ENDPOINT: &str = "http://minio:9000";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub metric_id: String,
    pub entity: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: XM_HOURLY_URL.to_string(),
            metric_id: DEFAULT_METRIC_ID.to_string(),
            entity: DEFAULT_ENTITY.to_string(),
        }
    }
}

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub upstream: UpstreamConfig,
    pub storage: S3Config,
    pub scratch_dir: PathBuf,
    pub port: u16,
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let upstream = UpstreamConfig {
            base_url: get("XM_API_URL").unwrap_or_else(|| XM_HOURLY_URL.to_string()),
            metric_id: get("XM_METRIC_ID").unwrap_or_else(|| DEFAULT_METRIC_ID.to_string()),
            entity: get("XM_ENTITY").unwrap_or_else(|| DEFAULT_ENTITY.to_string()),
        };

        let storage = S3Config {
            region: get("MINIO_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: Some(
                get("MINIO_ENDPOINT").unwrap_or_else(|| DEFAULT_MINIO_ENDPOINT.to_string()),
            ),
            access_key_id: get("MINIO_USER"),
            secret_access_key: get("MINIO_PASSWORD"),
            force_path_style: true,
        };

        let scratch_dir = get("XM_SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"));

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            upstream,
            storage,
            scratch_dir,
            port,
        })
    }
}
