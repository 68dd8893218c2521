use axum::{routing::get, Router};

use crate::state::AppState;

pub mod booking;
pub mod health;
pub mod pricing;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .merge(booking::router())
        .merge(pricing::router())
}
