use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{ClientIp, Json};
use crate::models::{ActivationAction, ActivationOutcome, LicenseStatus, PlanType};
use crate::util::user_agent;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub license_key: String,
    pub plugin_slug: String,
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub license_id: String,
    pub status: LicenseStatus,
    pub plan_type: PlanType,
    pub expires_at: Option<i64>,
    pub max_domains: i64,
    pub active_domains: i64,
    pub plugins: Vec<String>,
}

/// POST /verify - periodic check-in. Read-only: only /activate consumes a
/// seat. Authenticated by possession of the license key.
pub async fn verify_license(
    State(state): State<AppState>,
    ClientIp(client_id): ClientIp,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let license_key = request.license_key.trim();
    let plugin_slug = request.plugin_slug.trim();

    // Malformed input never reaches the rate limiter or the store
    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::InvalidInput("Invalid license key format".into()));
    }
    if !validation::is_valid_plugin_slug(plugin_slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }
    let domain = validation::sanitize_domain(&request.domain)
        .ok_or_else(|| AppError::InvalidInput("Invalid domain".into()))?;

    // Counted on every outcome so failed key guesses still burn budget
    if !state
        .rate_limiter
        .check(&client_id, "verify", state.config.verify_budget)
    {
        tracing::warn!(client = %client_id, "verify rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if !license.is_valid() {
        return Err(AppError::LicenseInvalid);
    }

    let plugins = queries::plugins_for_license(&conn, &license.id)?;
    if !plugins.iter().any(|slug| slug == plugin_slug) {
        return Err(AppError::PluginNotAssigned);
    }

    let active_domains = queries::count_active_domains(&conn, &license.id)?;

    // Stamp the install's check-in if this domain is activated; a verify
    // from a not-yet-activated domain is still a valid read
    queries::touch_check_in(&conn, &license.id, plugin_slug, &domain)?;
    queries::log_activation(
        &conn,
        &license.id,
        plugin_slug,
        &domain,
        ActivationAction::CheckIn,
        ActivationOutcome::Success,
        None,
        Some(&client_id),
        user_agent(&headers).as_deref(),
    )?;

    Ok(Json(VerifyResponse {
        success: true,
        license_id: license.id,
        status: license.status,
        plan_type: license.plan_type,
        expires_at: license.expires_at,
        max_domains: license.max_domains,
        active_domains,
        plugins,
    }))
}
