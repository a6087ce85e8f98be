mod licenses;
mod logs;
mod versions;

pub use licenses::*;
pub use logs::*;
pub use versions::*;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/owners", post(create_owner))
        .route("/licenses", post(create_license))
        .route("/licenses/{key}", get(get_license))
        .route("/licenses/{key}/suspend", post(suspend_license))
        .route("/licenses/{key}/cancel", post(cancel_license))
        .route("/licenses/{key}/renew", post(renew_license))
        .route("/licenses/{key}/plugins", post(assign_plugin))
        .route("/licenses/{key}/plugins/{slug}", delete(remove_plugin))
        .route("/licenses/{key}/logs", get(list_activation_logs))
        .route("/licenses/{key}/history", get(list_history))
        .route("/versions", post(publish_version))
        .route("/versions/{slug}", get(list_versions))
        .route("/stale-installs", get(list_stale_installs))
        .route_layer(axum::middleware::from_fn_with_state(state, admin_auth))
}
