use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::json;

use muster_core::event::Event;

use super::{ApiError, ApiState};

pub async fn list_events(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let events = state.events.list_events().await?;
    Ok((StatusCode::OK, Json(events)))
}

pub async fn add_event(
    State(state): State<ApiState>,
    Json(event): Json<Event>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.events.add_event(event, Utc::now()).await?;
    Ok((StatusCode::OK, Json(json!({ "eventId": id }))))
}

/// Alerts referenced by the event.
pub async fn event_alerts(
    State(state): State<ApiState>,
    Path(eid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: u64 = eid
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid event id: {eid}")))?;
    let alerts = state.events.event_alerts(id).await?;
    Ok((StatusCode::OK, Json(alerts)))
}
