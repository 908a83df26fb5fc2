use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde_json::json;

use muster_ports::types::RawAlert;

use super::{ApiError, ApiState};

/// Accepts a batch of alerts and hands them to the dispatcher.
pub async fn post_alerts(
    State(state): State<ApiState>,
    Json(raw): Json<Vec<RawAlert>>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let mut alerts = Vec::with_capacity(raw.len());
    for (i, raw) in raw.into_iter().enumerate() {
        if raw.labels.is_empty() {
            return Err(ApiError::BadRequest(format!("alert {i}: no labels")));
        }
        let alert = raw.into_alert(now);
        if alert.ends_at().is_some_and(|ends_at| ends_at < alert.starts_at()) {
            return Err(ApiError::BadRequest(format!(
                "alert {i}: end time before start time"
            )));
        }
        alerts.push(alert);
    }

    tracing::debug!(alerts = alerts.len(), "alerts received");
    state.alerts.put(alerts).await?;
    Ok((StatusCode::OK, Json(json!({ "status": "success" }))))
}

/// Current aggregation groups, sorted by their labels.
pub async fn get_groups(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.dispatcher.groups().await)
}
