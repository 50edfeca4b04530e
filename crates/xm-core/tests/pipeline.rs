use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use xm_bucket::{BucketStore, MemoryBucketStore};
use xm_core::persistence::PersistenceClient;
use xm_core::request::MetricSource;
use xm_core::transform::TransformEngine;
use xm_core::{DateKey, Pipeline, PipelineError, RawApiResponse, RequestError, ResultSummary};

/// Serves a canned payload and counts calls.
struct CannedSource {
    status: u16,
    body: Value,
    calls: AtomicUsize,
}

impl CannedSource {
    fn new(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            status,
            body,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MetricSource for CannedSource {
    async fn fetch(&self, _date: &DateKey) -> Result<RawApiResponse, RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut payload: RawApiResponse = serde_json::from_value(self.body.clone())
            .map_err(|source| RequestError::Decode {
                status: self.status,
                source,
            })?;
        payload.status_code = self.status;
        Ok(payload)
    }
}

fn item(subactivity: &str, hour: Value) -> Value {
    let mut values = Map::new();
    values.insert("Activity".into(), json!("INDUSTRIAS MANUFACTURERAS"));
    values.insert("Subactivity".into(), json!(subactivity));
    for hour_index in 1..=24 {
        values.insert(format!("Hour{hour_index:02}"), hour.clone());
    }
    json!({ "HourlyEntities": [{ "Values": values }] })
}

fn date() -> DateKey {
    DateKey::parse("2024-11-25").expect("valid date")
}

struct Harness {
    scratch: TempDir,
    store: Arc<MemoryBucketStore>,
    pipeline: Pipeline,
}

fn harness(source: Arc<CannedSource>, store: MemoryBucketStore) -> Harness {
    let scratch = TempDir::new().expect("temp dir");
    let store = Arc::new(store);
    let pipeline = Pipeline::new(
        source,
        TransformEngine::new(scratch.path()),
        PersistenceClient::new(store.clone()),
    );
    Harness {
        scratch,
        store,
        pipeline,
    }
}

#[tokio::test]
async fn absent_bucket_is_created_and_upload_succeeds() -> Result<()> {
    let source = CannedSource::new(
        200,
        json!({ "Items": [item("ELABORACIÓN DE PRODUCTOS LACTEOS", json!(1.0))] }),
    );
    let h = harness(source, MemoryBucketStore::new());

    let summary = h.pipeline.run(&date(), "xm-data").await?;

    let local_path = h.scratch.path().join("2024-11-25.csv");
    assert_eq!(
        summary,
        ResultSummary {
            file_name: Some("2024-11-25.csv".to_string()),
            local_path: Some(local_path.display().to_string()),
            remote_path: "xm-data/2024-11-25".to_string(),
            success: true,
        }
    );
    assert!(h.store.has_bucket("xm-data"));

    let uploaded = h.store.get_object("xm-data", "2024-11-25.csv").await?;
    let local = std::fs::read(&local_path)?;
    assert_eq!(&uploaded[..], &local[..]);
    Ok(())
}

#[tokio::test]
async fn running_twice_overwrites_the_same_object() -> Result<()> {
    let source = CannedSource::new(
        200,
        json!({ "Items": [item("ELABORACIÓN DE PRODUCTOS LACTEOS", json!(2))] }),
    );
    let h = harness(source.clone(), MemoryBucketStore::with_bucket("xm-data"));

    let first = h.pipeline.run(&date(), "xm-data").await?;
    let second = h.pipeline.run(&date(), "xm-data").await?;

    assert_eq!(first, second);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.store.object_keys("xm-data"), vec!["2024-11-25.csv".to_string()]);
    Ok(())
}

#[tokio::test]
async fn non_200_status_aborts_before_transform() {
    let source = CannedSource::new(
        503,
        json!({ "Items": [item("ELABORACIÓN DE PRODUCTOS LACTEOS", json!(1))] }),
    );
    let h = harness(source, MemoryBucketStore::new());

    let err = h
        .pipeline
        .run(&date(), "xm-data")
        .await
        .expect_err("upstream failure is a hard error");

    let PipelineError::Request { date: failed_date, source } = err;
    assert_eq!(failed_date, date());
    assert!(matches!(source, RequestError::UnexpectedStatus { status: 503 }));
    assert!(!h.scratch.path().join("2024-11-25.csv").exists());
    assert!(!h.store.has_bucket("xm-data"));
}

#[tokio::test]
async fn zero_matches_still_uploads_header_only_file() -> Result<()> {
    let source = CannedSource::new(
        200,
        json!({ "Items": [item("ELABORACIÓN DE PRODUCTOS DE TABACO", json!(1))] }),
    );
    let h = harness(source, MemoryBucketStore::new());

    let summary = h.pipeline.run(&date(), "xm-data").await?;

    assert!(summary.success);
    assert_eq!(summary.file_name.as_deref(), Some("2024-11-25.csv"));
    let uploaded = h.store.get_object("xm-data", "2024-11-25.csv").await?;
    assert_eq!(String::from_utf8(uploaded.to_vec())?.trim_end(), "sum,date");
    Ok(())
}

#[tokio::test]
async fn transform_failure_is_reported_in_the_summary() -> Result<()> {
    let source = CannedSource::new(
        200,
        json!({ "Items": [item("ELABORACIÓN DE PRODUCTOS LACTEOS", json!("twelve"))] }),
    );
    let h = harness(source, MemoryBucketStore::new());

    let summary = h.pipeline.run(&date(), "xm-data").await?;

    assert_eq!(
        summary,
        ResultSummary {
            file_name: None,
            local_path: None,
            remote_path: "xm-data/2024-11-25".to_string(),
            success: false,
        }
    );
    assert!(!h.store.has_bucket("xm-data"));
    Ok(())
}

#[tokio::test]
async fn undecodable_payload_is_a_request_error() {
    let source = CannedSource::new(200, json!({ "Items": "not a list" }));
    let h = harness(source, MemoryBucketStore::new());

    let err = h
        .pipeline
        .run(&date(), "xm-data")
        .await
        .expect_err("decode failure is a hard error");
    assert!(err.to_string().starts_with("error retrieving data for 2024-11-25"));
}

#[tokio::test]
async fn body_without_items_is_a_request_error() {
    for body in [json!({}), json!({ "Message": "service unavailable" })] {
        let source = CannedSource::new(200, body);
        let h = harness(source, MemoryBucketStore::new());

        let err = h
            .pipeline
            .run(&date(), "xm-data")
            .await
            .expect_err("missing Items is a hard error");

        let PipelineError::Request { source, .. } = err;
        assert!(matches!(source, RequestError::Decode { status: 200, .. }));
        assert!(!h.scratch.path().join("2024-11-25.csv").exists());
        assert!(!h.store.has_bucket("xm-data"));
    }
}
