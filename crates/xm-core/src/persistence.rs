use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use xm_bucket::BucketStore;

use crate::error::PersistenceFailure;
use crate::model::DateKey;
use crate::transform::ScratchFile;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Publishes scratch files to the object store, one object per date.
#[derive(Clone)]
pub struct PersistenceClient {
    store: Arc<dyn BucketStore>,
}

impl PersistenceClient {
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self { store }
    }

    /// Uploads `scratch` as `{date}.csv`, creating `bucket` when it does not exist yet.
    /// A missing scratch file is reported as a failure before any bucket is touched.
    pub async fn upload(
        &self,
        bucket: &str,
        date: &DateKey,
        scratch: Option<&ScratchFile>,
    ) -> Result<(), PersistenceFailure> {
        let result = self.try_upload(bucket, date, scratch).await;
        match &result {
            Ok(()) => info!(date = %date, bucket, object = %date.file_name(), "scratch file uploaded"),
            Err(failure) => warn!(
                date = %date,
                bucket,
                failure = failure.kind(),
                "could not upload the scratch file: {failure}"
            ),
        }
        result
    }

    async fn try_upload(
        &self,
        bucket: &str,
        date: &DateKey,
        scratch: Option<&ScratchFile>,
    ) -> Result<(), PersistenceFailure> {
        let scratch = scratch.ok_or(PersistenceFailure::MissingScratchFile)?;
        let contents = tokio::fs::read(&scratch.path)
            .await
            .map_err(PersistenceFailure::ReadScratch)?;

        self.ensure_bucket(bucket).await?;
        self.store
            .put_object(bucket, &date.file_name(), Bytes::from(contents), CSV_CONTENT_TYPE)
            .await?;
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), PersistenceFailure> {
        if !self.store.bucket_exists(bucket).await? {
            info!(bucket, "creating missing bucket");
            self.store.create_bucket(bucket).await?;
        }
        Ok(())
    }
}
