//! User Routes
//!
//! - POST /users - Register a user
//! - POST /users/:user_id/sensors - Attach a sensor to a user
//! - GET /users/:user_id/sensors - Sensors attached to a user

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{SensorResponse, SensorToUserBinding, UserResponse, UserToCreate};
use crate::api::error::ApiResult;
use crate::api::extract::{AcceptsJson, ApiJson, ApiPath};
use crate::api::state::AppState;
use crate::directory::UserId;

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<UserToCreate>,
) -> ApiResult<Json<UserResponse>> {
    let deadline = state.deadline();
    let user = state.users.register_user(&req.name, deadline.token()).await?;
    Ok(Json(user.into()))
}

/// POST /users/:user_id/sensors
pub async fn attach_sensor(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<UserId>,
    ApiJson(req): ApiJson<SensorToUserBinding>,
) -> ApiResult<StatusCode> {
    let deadline = state.deadline();
    state
        .users
        .attach_sensor(user_id, req.sensor_id, deadline.token())
        .await?;
    Ok(StatusCode::CREATED)
}

/// GET /users/:user_id/sensors
pub async fn list_user_sensors(
    _: AcceptsJson,
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<UserId>,
) -> ApiResult<Json<Vec<SensorResponse>>> {
    let deadline = state.deadline();
    let sensors = state.users.user_sensors(user_id, deadline.token()).await?;
    Ok(Json(sensors.into_iter().map(SensorResponse::from).collect()))
}
