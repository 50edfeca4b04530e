// crates/xm-core/src/error.rs

use thiserror::Error;
use xm_bucket::BucketError;

use crate::model::DateKey;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateKeyError {
    #[error("'{0}' is not a calendar date in YYYY-MM-DD form")]
    Invalid(String),
}

/// Failures of the upstream call. These abort the run.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned an unreadable body (status {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    #[error("upstream returned status {status}")]
    UnexpectedStatus { status: u16 },
}

/// Soft failures of the transform stage. Messages name positions and fields only,
/// never payload values.
#[derive(Error, Debug)]
pub enum TransformFailure {
    #[error("item {index} has no hourly entities")]
    MissingHourlyEntity { index: usize },

    #[error("item {index} has no Values map")]
    MissingValues { index: usize },

    #[error("item {index} is missing string field {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("row {row} has a non-numeric value in {field}")]
    NonNumericHour { row: usize, field: String },

    #[error("Polars operation failed: {0}")]
    Frame(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHourlyEntity { .. } => "missing_hourly_entity",
            Self::MissingValues { .. } => "missing_values",
            Self::MissingField { .. } => "missing_field",
            Self::NonNumericHour { .. } => "non_numeric_hour",
            Self::Frame(_) => "frame",
            Self::Io(_) => "io",
        }
    }
}

/// Soft failures of the upload stage.
#[derive(Error, Debug)]
pub enum PersistenceFailure {
    #[error("no scratch file was produced for this run")]
    MissingScratchFile,

    #[error("could not read scratch file: {0}")]
    ReadScratch(#[source] std::io::Error),

    #[error("bucket operation failed: {0}")]
    Bucket(#[from] BucketError),
}

impl PersistenceFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingScratchFile => "missing_scratch_file",
            Self::ReadScratch(_) => "read_scratch",
            Self::Bucket(err) => err.kind(),
        }
    }
}

/// The only error that aborts a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("error retrieving data for {date}: {source}")]
    Request {
        date: DateKey,
        #[source]
        source: RequestError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
