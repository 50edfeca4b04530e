use std::sync::Arc;

use tokio::sync::Mutex;
use xm_core::{Pipeline, ScraperConfig};

/// Shared handler state. The mutex keeps at most one run in flight, so two requests for
/// the same date never race on the scratch file or the remote object.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Mutex<Pipeline>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
        }
    }

    pub async fn from_config(config: &ScraperConfig) -> anyhow::Result<Self> {
        Ok(Self::new(Pipeline::from_config(config).await?))
    }

    pub(crate) fn pipeline(&self) -> Arc<Mutex<Pipeline>> {
        self.pipeline.clone()
    }
}
