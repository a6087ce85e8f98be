use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::events::LifecycleEvent;
use crate::extractors::Json;
use crate::middleware::OwnerContext;
use crate::models::License;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct RenewRequest {
    pub license_key: String,
}

#[derive(Debug, Serialize)]
pub struct RenewResponse {
    pub success: bool,
    pub expires_at: i64,
}

/// POST /renew - push the expiry out and reactivate a suspended, expired,
/// or cancelled license. Requires the caller to be the recorded owner
/// (session-authenticated), so it is not gated by the IP rate limiter.
pub async fn renew_license(
    State(state): State<AppState>,
    Extension(ctx): Extension<OwnerContext>,
    Json(request): Json<RenewRequest>,
) -> Result<Json<RenewResponse>> {
    let license_key = request.license_key.trim();

    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::InvalidInput("Invalid license key format".into()));
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    if license.owner_id != ctx.owner.id {
        return Err(AppError::Forbidden("Not the license owner".into()));
    }

    let expires_at = queries::renew_license(
        &conn,
        &license.id,
        state.config.license_validity_days,
        Some(&ctx.owner.id),
        None,
    )?;

    state.events.publish(LifecycleEvent::LicenseRenewed {
        license_id: license.id.clone(),
        expires_at,
    });

    tracing::info!(license_id = %license.id, expires_at, "license renewed");

    Ok(Json(RenewResponse {
        success: true,
        expires_at,
    }))
}

#[derive(Debug, Serialize)]
pub struct OwnerLicense {
    #[serde(flatten)]
    pub license: License,
    pub valid: bool,
    pub plugins: Vec<String>,
    pub active_domains: i64,
}

/// GET /licenses - the authenticated owner's licenses with seat usage,
/// the data behind an account dashboard.
pub async fn list_owner_licenses(
    State(state): State<AppState>,
    Extension(ctx): Extension<OwnerContext>,
) -> Result<Json<Vec<OwnerLicense>>> {
    let conn = state.db.get()?;

    let licenses = queries::list_licenses_for_owner(&conn, &ctx.owner.id)?;

    let mut out = Vec::with_capacity(licenses.len());
    for license in licenses {
        let plugins = queries::plugins_for_license(&conn, &license.id)?;
        let active_domains = queries::count_active_domains(&conn, &license.id)?;
        let valid = license.is_valid();
        out.push(OwnerLicense {
            license,
            valid,
            plugins,
            active_domains,
        });
    }

    Ok(Json(out))
}
