pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod pipeline;
pub mod request;
pub mod transform;

pub use config::{ScraperConfig, UpstreamConfig};
pub use error::{PersistenceFailure, PipelineError, RequestError, TransformFailure};
pub use model::{DateKey, RawApiResponse, ResultSummary};
pub use pipeline::Pipeline;
