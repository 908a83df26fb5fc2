//! HTTP API

mod alerts;
mod error;
mod events;

use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use muster_app::dispatch::Dispatcher;
use muster_app::event_service::EventService;
use muster_ports::outbound::{AlertStore, EventStore};

pub use error::ApiError;

pub type Events = EventService<Arc<dyn EventStore>, Arc<dyn AlertStore>>;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub alerts: Arc<dyn AlertStore>,
    pub events: Arc<Events>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/alerts", post(alerts::post_alerts))
        .route("/api/v1/alerts/groups", get(alerts::get_groups))
        .route(
            "/api/v1/events",
            get(events::list_events).post(events::add_event),
        )
        .route("/api/v1/events/{eid}/alerts", get(events::event_alerts))
        .with_state(state)
}

/// Serves the API until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
