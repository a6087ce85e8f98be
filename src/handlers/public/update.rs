use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Redirect;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json, Query};
use crate::models::{ActivationAction, ActivationOutcome};
use crate::util::user_agent;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct CheckUpdateRequest {
    pub license_key: String,
    pub plugin_slug: String,
    pub current_version: String,
}

#[derive(Debug, Serialize)]
pub struct CheckUpdateResponse {
    pub success: bool,
    pub has_update: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_php: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_wp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /check-update - report the latest published version when it is
/// strictly newer than what the client runs.
pub async fn check_update(
    State(state): State<AppState>,
    ClientIp(client_id): ClientIp,
    headers: HeaderMap,
    Json(request): Json<CheckUpdateRequest>,
) -> Result<Json<CheckUpdateResponse>> {
    let license_key = request.license_key.trim();
    let plugin_slug = request.plugin_slug.trim();
    let current_version = request.current_version.trim();

    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::InvalidInput("Invalid license key format".into()));
    }
    if !validation::is_valid_plugin_slug(plugin_slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }
    if !validation::is_valid_version(current_version) {
        return Err(AppError::InvalidInput("Invalid version".into()));
    }

    if !state
        .rate_limiter
        .check(&client_id, "update_check", state.config.update_check_budget)
    {
        return Err(AppError::RateLimited);
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if !license.is_valid() {
        return Err(AppError::LicenseInvalid);
    }

    let latest = match queries::get_latest_version(&conn, plugin_slug)? {
        Some(latest) => latest,
        None => {
            return Ok(Json(CheckUpdateResponse {
                success: true,
                has_update: false,
                new_version: None,
                download_url: None,
                changelog: None,
                requires_php: None,
                requires_wp: None,
                message: Some("No versions found".into()),
            }));
        }
    };

    let has_update = validation::is_newer_version(&latest.version, current_version);

    queries::log_activation(
        &conn,
        &license.id,
        plugin_slug,
        "",
        ActivationAction::UpdateCheck,
        ActivationOutcome::Success,
        None,
        Some(&client_id),
        user_agent(&headers).as_deref(),
    )?;

    Ok(Json(CheckUpdateResponse {
        success: true,
        has_update,
        new_version: Some(latest.version),
        download_url: has_update.then_some(latest.download_url),
        changelog: if has_update { latest.changelog } else { None },
        requires_php: latest.requires_php,
        requires_wp: latest.requires_wp,
        message: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub key: String,
    pub plugin: String,
    pub version: String,
}

/// GET /download - redirect a licensed client to the stored artifact URL.
pub async fn download_plugin(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Redirect> {
    let license_key = query.key.trim();
    let plugin_slug = query.plugin.trim();
    let version = query.version.trim();

    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::Unauthorized("Invalid license key".into()));
    }
    if !validation::is_valid_plugin_slug(plugin_slug) || !validation::is_valid_version(version) {
        return Err(AppError::InvalidInput("Invalid parameters".into()));
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if !license.is_valid() {
        return Err(AppError::LicenseInvalid);
    }

    let plugin_version = queries::get_version(&conn, plugin_slug, version)?
        .ok_or_else(|| AppError::NotFound("Version not found".into()))?;

    Ok(Redirect::temporary(&plugin_version.download_url))
}
