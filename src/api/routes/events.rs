//! Event Routes
//!
//! - POST /events - Record a reading, stamped with the server time

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{EventRequest, EventResponse};
use crate::api::error::ApiResult;
use crate::api::extract::ApiJson;
use crate::api::state::AppState;
use crate::directory::validate_serial_number;

/// POST /events
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<EventRequest>,
) -> ApiResult<(StatusCode, Json<EventResponse>)> {
    validate_serial_number(&req.sensor_serial_number)?;

    let deadline = state.deadline();
    let event = state
        .ingestor
        .receive(
            &req.sensor_serial_number,
            req.payload,
            Utc::now(),
            deadline.token(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(event.into())))
}
