pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod events;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod util;
pub mod validation;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::AppState;

/// Assemble the full application router: the public license protocol at the
/// root and the admin API under /admin.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router(state.clone()))
        .nest("/admin", handlers::admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
