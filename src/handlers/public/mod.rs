mod activate;
mod renew;
mod update;
mod verify;

pub use activate::*;
pub use renew::*;
pub use update::*;
pub use verify::*;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::middleware::owner_auth;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router<AppState> {
    let owner_routes = Router::new()
        .route("/renew", post(renew_license))
        .route("/licenses", get(list_owner_licenses))
        .route_layer(axum::middleware::from_fn_with_state(state, owner_auth));

    Router::new()
        .route("/health", get(health))
        .route("/verify", post(verify_license))
        .route("/activate", post(activate_domain))
        .route("/deactivate", post(deactivate_domain))
        .route("/check-update", post(check_update))
        .route("/download", get(download_plugin))
        .merge(owner_routes)
}
