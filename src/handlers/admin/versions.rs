use axum::extract::{Path, State};
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{CreatePluginVersion, PluginVersion};
use crate::validation;

/// POST /admin/versions - publish version metadata for the update-check and
/// download read model. The artifact itself lives wherever download_url
/// points; this server never stores builds.
pub async fn publish_version(
    State(state): State<AppState>,
    Json(body): Json<CreatePluginVersion>,
) -> Result<Json<PluginVersion>> {
    if !validation::is_valid_plugin_slug(&body.plugin_slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }
    if !validation::is_valid_version(&body.version) {
        return Err(AppError::InvalidInput("Invalid version".into()));
    }
    if body.download_url.trim().is_empty() {
        return Err(AppError::InvalidInput("download_url is required".into()));
    }

    let conn = state.db.get()?;

    if queries::get_version(&conn, &body.plugin_slug, &body.version)?.is_some() {
        return Err(AppError::InvalidInput(format!(
            "Version {} of {} is already published",
            body.version, body.plugin_slug
        )));
    }

    let version = queries::create_plugin_version(&conn, &body)?;

    tracing::info!(
        plugin = %version.plugin_slug,
        version = %version.version,
        "plugin version published"
    );

    Ok(Json(version))
}

#[derive(Debug, Deserialize)]
pub struct VersionsPath {
    pub slug: String,
}

/// GET /admin/versions/{slug}
pub async fn list_versions(
    State(state): State<AppState>,
    Path(path): Path<VersionsPath>,
) -> Result<Json<Vec<PluginVersion>>> {
    if !validation::is_valid_plugin_slug(&path.slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }

    let conn = state.db.get()?;
    let versions = queries::list_versions(&conn, &path.slug)?;
    Ok(Json(versions))
}
