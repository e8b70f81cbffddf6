//! WebSocket upgrade handler
//!
//! `GET /sensors/:sensor_id/events`

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

use super::connection::Connection;
use super::ws::WsConnection;
use crate::api::extract::ApiPath;
use crate::api::{ApiError, ApiResult, AppState};
use crate::storage::SensorId;

/// Upgrade to a live subscription for one sensor
///
/// The sensor is looked up before the upgrade: unknown sensors get a 404,
/// non-integer ids a 422, and no connection is opened.
pub async fn sensor_events_handler(
    ApiPath(sensor_id): ApiPath<SensorId>,
    State(state): State<Arc<AppState>>,
    ws: Option<WebSocketUpgrade>,
) -> ApiResult<Response> {
    let deadline = state.deadline();
    state.relay.authorize(sensor_id, deadline.token()).await?;

    let ws = ws.ok_or_else(|| ApiError::BadRequest("expected a WebSocket upgrade".to_string()))?;

    let relay = Arc::clone(&state.relay);
    Ok(ws.on_upgrade(move |socket| async move {
        let conn: Arc<dyn Connection> = WsConnection::new(socket);
        match relay.attach(sensor_id, conn).await {
            Ok(task) => {
                if let Ok(end) = task.await {
                    tracing::debug!(sensor_id, reason = ?end, "WebSocket subscription finished");
                }
            }
            Err(e) => {
                tracing::warn!(sensor_id, error = %e, "Failed to attach WebSocket subscription");
            }
        }
    }))
}
