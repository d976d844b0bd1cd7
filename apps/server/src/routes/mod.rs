//! HTTP route handlers

mod health;
mod model;
mod ops;
mod views;

use archihub_core_types::Handle;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use tower_http::cors::CorsLayer;

use crate::config::MAX_BODY_BYTES;
use crate::state::AppState;

/// Assemble the full route table
pub fn build_router(state: Handle<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // model
        .route("/model/query", post(model::query))
        .route("/model/search", post(model::search))
        .route("/model/plan", post(model::plan))
        .route("/model/apply", post(model::apply))
        .route("/model/element/{id}", get(model::element_detail))
        .route("/model/relationship/{id}", get(model::relationship_detail))
        .route("/model/stats", get(model::stats))
        .route("/model/diagnostics", get(model::diagnostics))
        .route("/model/folders", get(model::folders))
        .route("/model/save", post(model::save))
        // views
        .route("/views", get(views::list).post(views::create))
        .route("/views/{id}", get(views::detail).delete(views::remove))
        .route("/views/{id}/layout", post(views::layout))
        .route("/views/{id}/export", post(views::export))
        .route("/views/{id}/router", put(views::router))
        // ops
        .route("/ops/status", get(ops::status))
        .route("/ops/list", get(ops::list))
        .route("/ops/wait", get(ops::wait))
        .route("/ops/gc", post(ops::gc))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
