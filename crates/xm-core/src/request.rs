//! Client for the XM hourly metrics endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::RequestError;
use crate::model::{DateKey, RawApiResponse};

/// Body of the hourly query. The window is a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricRequest {
    pub metric_id: String,
    pub start_date: String,
    pub end_date: String,
    pub entity: String,
}

impl MetricRequest {
    pub fn for_date(config: &UpstreamConfig, date: &DateKey) -> Self {
        Self {
            metric_id: config.metric_id.clone(),
            start_date: date.to_string(),
            end_date: date.to_string(),
            entity: config.entity.clone(),
        }
    }
}

#[async_trait]
pub trait MetricSource: Send + Sync {
    /// One upstream call; the status is returned as-is in `status_code`.
    async fn fetch(&self, date: &DateKey) -> Result<RawApiResponse, RequestError>;
}

pub struct XmApiClient {
    client: Client,
    config: UpstreamConfig,
}

impl XmApiClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, RequestError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl MetricSource for XmApiClient {
    async fn fetch(&self, date: &DateKey) -> Result<RawApiResponse, RequestError> {
        let body = MetricRequest::for_date(&self.config, date);
        let response = self
            .client
            .post(&self.config.base_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let mut payload: RawApiResponse = serde_json::from_slice(&bytes)
            .map_err(|source| RequestError::Decode { status, source })?;
        payload.status_code = status;

        debug!(
            date = %date,
            status,
            items = payload.items.len(),
            "upstream response decoded"
        );
        Ok(payload)
    }
}
