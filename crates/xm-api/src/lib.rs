//! HTTP trigger for the daily extraction: `POST /xm-data` and `GET /health`.

mod routes;
mod state;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

pub use routes::{ApiError, MessageBody, TriggerRequest, TriggerResponse};
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/xm-data", post(routes::extract))
        .route("/health", get(routes::health))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::UNSPECIFIED, port)).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}
