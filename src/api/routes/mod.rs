//! API Routes
//!
//! Route handlers organized by functionality.

pub mod events;
pub mod health;
pub mod sensors;
pub mod users;

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

/// OPTIONS answer: 204 listing the methods the resource supports
pub async fn allow(methods: &'static str) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, [(header::ALLOW, methods)])
}
