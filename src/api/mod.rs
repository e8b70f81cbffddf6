//! Sensorlog HTTP API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Events
//! - `POST /events` - Record a reading for a sensor serial number
//!
//! ## Sensors
//! - `GET /sensors` - List sensors
//! - `POST /sensors` - Register a sensor
//! - `GET /sensors/:sensor_id` - Get a sensor
//! - `GET /sensors/:sensor_id/history` - Events between `start_date` and `end_date`
//! - `GET /sensors/:sensor_id/events` - Live WebSocket stream of the latest event
//!
//! ## Users
//! - `POST /users` - Register a user
//! - `POST /users/:user_id/sensors` - Attach a sensor
//! - `GET /users/:user_id/sensors` - List attached sensors
//!
//! `GET` routes also answer `HEAD` with an empty body, and the resources
//! above answer `OPTIONS` with `204` and an `Allow` header. JSON routes
//! return `406` unless `Accept` allows `application/json`, take bodies only
//! as `application/json` (`415` otherwise), and return `422` for ids that
//! are not integers.
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use sensorlog::api::{serve, ApiConfig, AppState};
//! use sensorlog::relay::RelayConfig;
//! use sensorlog::storage::MemoryEventStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::default();
//!     let state = AppState::new(
//!         Arc::new(MemoryEventStore::new()),
//!         config.clone(),
//!         RelayConfig::default(),
//!     );
//!     serve(state, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::relay::sensor_events_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/events",
            post(routes::events::post_event).options(|| routes::allow("OPTIONS,POST")),
        )
        .route(
            "/sensors",
            get(routes::sensors::list_sensors)
                .post(routes::sensors::create_sensor)
                .options(|| routes::allow("OPTIONS,POST,GET,HEAD")),
        )
        .route(
            "/sensors/:sensor_id",
            get(routes::sensors::get_sensor).options(|| routes::allow("OPTIONS,GET,HEAD")),
        )
        .route("/sensors/:sensor_id/history", get(routes::sensors::get_history))
        .route("/sensors/:sensor_id/events", get(sensor_events_handler))
        .route(
            "/users",
            post(routes::users::create_user).options(|| routes::allow("OPTIONS,POST")),
        )
        .route(
            "/users/:user_id/sensors",
            get(routes::users::list_user_sensors)
                .post(routes::users::attach_sensor)
                .options(|| routes::allow("OPTIONS,POST,GET,HEAD")),
        );

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .merge(api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server
///
/// On Ctrl+C or SIGTERM the live relay closes its subscriptions first,
/// then the HTTP server drains.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let relay = Arc::clone(&state.relay);
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Sensorlog API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            if let Err(e) = relay.shutdown().await {
                tracing::warn!(error = %e, "Live relay shut down with errors");
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Sensorlog API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayConfig;
    use crate::storage::{MemoryEventStore, SqliteEventStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tempfile::tempdir;
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryEventStore::new()),
            ApiConfig::default(),
            RelayConfig::default(),
        );
        build_router(state)
    }

    async fn request(
        app: &Router,
        method: &str,
        uri: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    /// Request as a JSON client sends it
    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> Response {
        let headers: &[(&str, &str)] = match body {
            Some(_) => &[("Accept", "application/json"), ("Content-Type", "application/json")],
            None => &[("Accept", "application/json")],
        };
        request(app, method, uri, headers, body).await
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register_sensor(app: &Router, serial: &str) -> i64 {
        let body = format!(r#"{{"serial_number": "{}", "type": "adc"}}"#, serial);
        let response = send(app, "POST", "/sensors", Some(&body)).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app();
        let response = send(&app, "GET", "/health/live", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app();
        let response = send(&app, "GET", "/health/ready", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app();
        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["live_connections"], 0);
    }

    #[tokio::test]
    async fn test_register_and_get_sensor() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;

        let response = send(&app, "GET", &format!("/sensors/{}", id), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["serial_number"], "0123456789");
        assert_eq!(body["type"], "adc");
        assert_eq!(body["is_active"], true);

        let response = send(&app, "GET", "/sensors", None).await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_sensor_validation() {
        let app = create_test_app();

        let response = send(
            &app,
            "POST",
            "/sensors",
            Some(r#"{"serial_number": "123", "type": "cc"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = send(
            &app,
            "POST",
            "/sensors",
            Some(r#"{"serial_number": "0123456789", "type": "thermo"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_sensor() {
        let app = create_test_app();
        let response = send(&app, "GET", "/sensors/42", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_post_event_and_history() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;

        let response = send(
            &app,
            "POST",
            "/events",
            Some(r#"{"sensor_serial_number": "0123456789", "payload": 17}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let now = chrono::Utc::now().timestamp();
        let uri = format!(
            "/sensors/{}/history?start_date={}&end_date={}",
            id,
            now - 60,
            now + 60
        );
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let events = body.as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["payload"], 17);

        // Sensor state follows the last event
        let response = send(&app, "GET", &format!("/sensors/{}", id), None).await;
        assert_eq!(json_body(response).await["current_state"], 17);
    }

    #[tokio::test]
    async fn test_post_event_unknown_serial() {
        let app = create_test_app();
        let response = send(
            &app,
            "POST",
            "/events",
            Some(r#"{"sensor_serial_number": "9999999999", "payload": 1}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            "POST",
            "/events",
            Some(r#"{"sensor_serial_number": "99", "payload": 1}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_history_errors() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;

        // No events recorded yet
        let uri = format!("/sensors/{}/history?start_date=0&end_date=10", id);
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let uri = format!("/sensors/{}/history?start_date=0", id);
        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_live_events_unknown_sensor() {
        let app = create_test_app();
        let response = send(&app, "GET", "/sensors/7/events", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_events_requires_upgrade() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;

        let response = send(&app, "GET", &format!("/sensors/{}/events", id), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_users_and_attachments() {
        let app = create_test_app();
        let sensor_id = register_sensor(&app, "0123456789").await;

        let response = send(&app, "POST", "/users", Some(r#"{"name": "alice"}"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let user_id = json_body(response).await["id"].as_i64().unwrap();

        let body = format!(r#"{{"sensor_id": {}}}"#, sensor_id);
        let uri = format!("/users/{}/sensors", user_id);
        let response = send(&app, "POST", &uri, Some(&body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(&app, "GET", &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let sensors = json_body(response).await;
        assert_eq!(sensors[0]["id"], sensor_id);

        let response = send(&app, "POST", "/users/99/sensors", Some(&body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, "POST", "/users", Some(r#"{"name": ""}"#)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_json_routes_require_accept() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;
        let history = format!("/sensors/{}/history?start_date=0&end_date=10", id);
        let uris = [
            "/sensors".to_string(),
            format!("/sensors/{}", id),
            history,
            "/users/1/sensors".to_string(),
        ];

        for uri in &uris {
            let response = request(&app, "GET", uri, &[], None).await;
            assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE, "{}", uri);

            let response = request(&app, "GET", uri, &[("Accept", "text/html")], None).await;
            assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE, "{}", uri);
        }

        let response = request(&app, "GET", "/sensors", &[("Accept", "*/*")], None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = request(&app, "GET", "/sensors", &[], None).await;
        assert_eq!(json_body(response).await["error"]["code"], "NOT_ACCEPTABLE");

        // Health checks answer any client
        let response = request(&app, "GET", "/health/live", &[], None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_bodies_must_be_json() {
        let app = create_test_app();
        let sensor = r#"{"serial_number": "0123456789", "type": "adc"}"#;

        let response = request(
            &app,
            "POST",
            "/sensors",
            &[("Content-Type", "text/plain")],
            Some(sensor),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(json_body(response).await["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");

        let event = r#"{"sensor_serial_number": "0123456789", "payload": 1}"#;
        let response = request(&app, "POST", "/events", &[], Some(event)).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let response = send(&app, "POST", "/users", Some(r#"{"name": "#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, "POST", "/sensors", Some(r#"{"serial_number": 5}"#)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_non_integer_ids_are_unprocessable() {
        let app = create_test_app();
        let binding = r#"{"sensor_id": 1}"#;

        for (method, uri, body) in [
            ("GET", "/sensors/abc", None),
            ("GET", "/sensors/abc/history?start_date=0&end_date=10", None),
            ("GET", "/sensors/abc/events", None),
            ("GET", "/users/abc/sensors", None),
            ("POST", "/users/abc/sensors", Some(binding)),
        ] {
            let response = send(&app, method, uri, body).await;
            assert_eq!(
                response.status(),
                StatusCode::UNPROCESSABLE_ENTITY,
                "{} {}",
                method,
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_options_lists_allowed_methods() {
        let app = create_test_app();

        for (uri, allowed) in [
            ("/events", "OPTIONS,POST"),
            ("/sensors", "OPTIONS,POST,GET,HEAD"),
            ("/sensors/1", "OPTIONS,GET,HEAD"),
            ("/users", "OPTIONS,POST"),
            ("/users/1/sensors", "OPTIONS,POST,GET,HEAD"),
        ] {
            let response = request(&app, "OPTIONS", uri, &[], None).await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT, "{}", uri);
            assert_eq!(response.headers()["allow"], allowed, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_head_mirrors_get_without_body() {
        let app = create_test_app();
        let id = register_sensor(&app, "0123456789").await;

        for uri in ["/sensors".to_string(), format!("/sensors/{}", id)] {
            let get = send(&app, "GET", &uri, None).await;
            let get_len = axum::body::to_bytes(get.into_body(), usize::MAX)
                .await
                .unwrap()
                .len();

            let head = send(&app, "HEAD", &uri, None).await;
            assert_eq!(head.status(), StatusCode::OK, "{}", uri);
            assert_eq!(
                head.headers()["content-length"],
                get_len.to_string().as_str(),
                "{}",
                uri
            );
            let body = axum::body::to_bytes(head.into_body(), usize::MAX).await.unwrap();
            assert!(body.is_empty());
        }

        let response = send(&app, "HEAD", "/sensors/99", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = request(&app, "HEAD", "/sensors", &[], None).await;
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }

    #[tokio::test]
    async fn test_sqlite_backend() {
        let dir = tempdir().unwrap();
        let store = SqliteEventStore::open(dir.path()).unwrap();
        let app = build_router(AppState::new(
            Arc::new(store),
            ApiConfig::default(),
            RelayConfig::default(),
        ));

        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(json_body(response).await["backend"], "sqlite");
    }
}
