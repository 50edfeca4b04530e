use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use xm_bucket::S3BucketStore;

use crate::config::ScraperConfig;
use crate::error::{PipelineError, RequestError, Result};
use crate::model::{DateKey, ResultSummary};
use crate::persistence::PersistenceClient;
use crate::request::{MetricSource, XmApiClient};
use crate::transform::TransformEngine;

/// Fetch -> transform -> upload for a single date.
pub struct Pipeline {
    source: Arc<dyn MetricSource>,
    transform: TransformEngine,
    persistence: PersistenceClient,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn MetricSource>,
        transform: TransformEngine,
        persistence: PersistenceClient,
    ) -> Self {
        Self {
            source,
            transform,
            persistence,
        }
    }

    /// Wires the production components: XM over HTTP and MinIO over S3.
    pub async fn from_config(config: &ScraperConfig) -> anyhow::Result<Self> {
        let source = XmApiClient::new(config.upstream.clone())
            .context("failed to build the upstream HTTP client")?;
        let store = S3BucketStore::new(config.storage.clone())
            .await
            .context("failed to configure the object store")?;

        Ok(Self::new(
            Arc::new(source),
            TransformEngine::new(config.scratch_dir.clone()),
            PersistenceClient::new(Arc::new(store)),
        ))
    }

    /// Transform and upload failures are soft: they show up as a missing file or
    /// `success = false` in the summary. Only upstream failures abort the run.
    pub async fn run(&self, date: &DateKey, bucket: &str) -> Result<ResultSummary> {
        info!(date = %date, bucket, "starting extraction");

        let response = self
            .source
            .fetch(date)
            .await
            .map_err(|source| request_failed(date, source))?;

        if response.status_code != 200 {
            return Err(request_failed(
                date,
                RequestError::UnexpectedStatus {
                    status: response.status_code,
                },
            ));
        }

        let scratch = self.transform.transform(&response, date).ok();
        let success = self
            .persistence
            .upload(bucket, date, scratch.as_ref())
            .await
            .is_ok();

        let summary = ResultSummary::new(bucket, date, scratch.as_ref(), success);
        info!(
            date = %date,
            bucket,
            success,
            remote_path = %summary.remote_path,
            "extraction finished"
        );
        Ok(summary)
    }
}

fn request_failed(date: &DateKey, source: RequestError) -> PipelineError {
    warn!(date = %date, "error retrieving upstream data: {source}");
    PipelineError::Request {
        date: *date,
        source,
    }
}
