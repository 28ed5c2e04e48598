use crate::{handlers, AppState};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(handlers::run_code))
        .route("/health", get(handlers::health_check))
        .route("/languages", get(handlers::list_languages))
}
