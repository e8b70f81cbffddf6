//! Sensor Routes
//!
//! - GET /sensors - List registered sensors
//! - POST /sensors - Register a sensor
//! - GET /sensors/:sensor_id - Get one sensor
//! - GET /sensors/:sensor_id/history - Events in a time window
//!
//! The live stream at `GET /sensors/:sensor_id/events` is served by the relay.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use crate::api::dto::{HistoryEvent, HistoryParams, SensorResponse, SensorToCreate};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::{AcceptsJson, ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::directory::{Sensor, SensorType};
use crate::storage::SensorId;

/// GET /sensors
pub async fn list_sensors(
    _: AcceptsJson,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<SensorResponse>>> {
    let deadline = state.deadline();
    let sensors = state.sensors.list(deadline.token()).await?;
    Ok(Json(sensors.into_iter().map(SensorResponse::from).collect()))
}

/// POST /sensors
///
/// Registering a serial number twice returns the existing sensor.
pub async fn create_sensor(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SensorToCreate>,
) -> ApiResult<Json<SensorResponse>> {
    let sensor_type: SensorType = req.sensor_type.parse()?;
    let sensor = Sensor::new(req.serial_number, sensor_type)
        .description(req.description)
        .active(req.is_active);

    let deadline = state.deadline();
    let sensor = state.sensors.register(sensor, deadline.token()).await?;
    Ok(Json(sensor.into()))
}

/// GET /sensors/:sensor_id
pub async fn get_sensor(
    _: AcceptsJson,
    State(state): State<Arc<AppState>>,
    ApiPath(sensor_id): ApiPath<SensorId>,
) -> ApiResult<Json<SensorResponse>> {
    let deadline = state.deadline();
    let sensor = state.sensors.get_by_id(sensor_id, deadline.token()).await?;
    Ok(Json(sensor.into()))
}

/// GET /sensors/:sensor_id/history?start_date=<unix s>&end_date=<unix s>
///
/// Both bounds are inclusive. 404 when the sensor never reported an event.
pub async fn get_history(
    _: AcceptsJson,
    State(state): State<Arc<AppState>>,
    ApiPath(sensor_id): ApiPath<SensorId>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<HistoryEvent>>> {
    let from = parse_unix_seconds("start_date", params.start_date.as_deref())?;
    let to = parse_unix_seconds("end_date", params.end_date.as_deref())?;

    let deadline = state.deadline();
    let events = state
        .store
        .range(sensor_id, from, to, deadline.token())
        .await?;

    Ok(Json(events.iter().map(HistoryEvent::from).collect()))
}

/// Non-negative Unix seconds from a query parameter
fn parse_unix_seconds(name: &str, raw: Option<&str>) -> ApiResult<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| ApiError::BadRequest(format!("missing {}", name)))?;
    raw.parse::<i64>()
        .ok()
        .filter(|secs| *secs >= 0)
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {}: {:?}", name, raw)))
}
