use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::events::LifecycleEvent;
use crate::extractors::{ClientIp, Json};
use crate::models::{ActivatedDomain, AssignedPlugin, CreateLicense, License, PlanType};
use crate::util::{client_identity, timestamp_after_days};
use crate::{crypto, validation};

#[derive(Debug, Serialize)]
pub struct CreatedOwner {
    pub id: String,
    pub name: String,
    /// Shown once; only the hash is stored
    pub api_token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOwnerBody {
    pub name: String,
}

/// POST /admin/owners - create an owner account and hand back its API token.
pub async fn create_owner(
    State(state): State<AppState>,
    Json(body): Json<CreateOwnerBody>,
) -> Result<Json<CreatedOwner>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Owner name is required".into()));
    }

    let conn = state.db.get()?;
    let (owner, api_token) = queries::create_owner(&conn, name)?;

    tracing::info!(owner_id = %owner.id, "owner created");

    Ok(Json(CreatedOwner {
        id: owner.id,
        name: owner.name,
        api_token,
    }))
}

#[derive(Debug, Serialize)]
pub struct CreatedLicense {
    #[serde(flatten)]
    pub license: License,
    pub plugins: Vec<String>,
}

/// POST /admin/licenses - issue a license. The raw key appears in this
/// response and nowhere else.
pub async fn create_license(
    State(state): State<AppState>,
    ClientIp(created_ip): ClientIp,
    Json(body): Json<CreateLicense>,
) -> Result<Json<CreatedLicense>> {
    let max_domains = body.max_domains.unwrap_or(state.config.default_max_domains);
    if max_domains < 1 {
        return Err(AppError::InvalidInput("max_domains must be at least 1".into()));
    }

    for slug in &body.plugins {
        if !validation::is_valid_plugin_slug(slug) {
            return Err(AppError::InvalidInput(format!("Invalid plugin slug: {slug}")));
        }
    }

    // Lifetime plans never expire; everything else gets the configured
    // validity unless overridden
    let expires_at = match body.plan_type {
        PlanType::Lifetime => None,
        _ => {
            let days = body.validity_days.unwrap_or(state.config.license_validity_days);
            if days < 1 {
                return Err(AppError::InvalidInput("validity_days must be at least 1".into()));
            }
            Some(timestamp_after_days(chrono::Utc::now().timestamp(), days))
        }
    };

    let meta = match &body.meta {
        Some(value) => Some(crypto::encrypt_meta(&value.to_string(), &state.site_secret)?),
        None => None,
    };

    let conn = state.db.get()?;

    let license = queries::create_license(
        &conn,
        &queries::NewLicense {
            owner_id: body.owner_id.clone(),
            plan_type: body.plan_type,
            max_domains,
            expires_at,
            meta,
            created_ip: Some(created_ip),
        },
        &state.site_secret,
    )?;

    for slug in &body.plugins {
        queries::assign_plugin(&conn, &license.id, slug)?;
    }

    state.events.publish(LifecycleEvent::LicenseCreated {
        license_id: license.id.clone(),
        owner_id: license.owner_id.clone(),
        plan_type: license.plan_type.as_ref().to_string(),
    });

    tracing::info!(license_id = %license.id, owner_id = %license.owner_id, "license created");

    Ok(Json(CreatedLicense {
        license,
        plugins: body.plugins,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LicensePath {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct LicenseDetail {
    #[serde(flatten)]
    pub license: License,
    pub valid: bool,
    pub plugins: Vec<String>,
    pub active_domains: Vec<ActivatedDomain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// GET /admin/licenses/{key}
pub async fn get_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<LicenseDetail>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let plugins = queries::plugins_for_license(&conn, &license.id)?;
    let active_domains = queries::list_active_domains(&conn, &license.id)?;

    let meta = match &license.meta {
        Some(blob) => {
            let plaintext = crypto::decrypt_meta(blob, &state.site_secret)?;
            Some(serde_json::from_str(&plaintext)?)
        }
        None => None,
    };

    let valid = license.is_valid();

    Ok(Json(LicenseDetail {
        license,
        valid,
        plugins,
        active_domains,
        meta,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SuspendBody {
    pub reason: String,
}

/// POST /admin/licenses/{key}/suspend - block new verification success.
/// Existing installs are untouched; they learn on their next check-in.
pub async fn suspend_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    headers: HeaderMap,
    Json(body): Json<SuspendBody>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let ip = client_identity(&headers, None);
    let suspended = queries::suspend_license(&conn, &license.id, &body.reason, None, Some(&ip))?;

    if suspended {
        state.events.publish(LifecycleEvent::LicenseSuspended {
            license_id: license.id.clone(),
            reason: body.reason.clone(),
        });
        tracing::info!(license_id = %license.id, reason = %body.reason, "license suspended");
    }

    Ok(Json(serde_json::json!({ "success": suspended })))
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /admin/licenses/{key}/cancel - terminal transition; the record and
/// its audit trail stay. Only renew can bring the license back.
pub async fn cancel_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Json(body): Json<CancelBody>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let cancelled = queries::cancel_license(&conn, &license.id, body.reason.as_deref(), None, None)?;

    if cancelled {
        state.events.publish(LifecycleEvent::LicenseCancelled {
            license_id: license.id.clone(),
        });
        tracing::info!(license_id = %license.id, "license cancelled");
    }

    Ok(Json(serde_json::json!({ "success": cancelled })))
}

#[derive(Debug, Deserialize)]
pub struct AssignPluginBody {
    pub plugin_slug: String,
}

/// POST /admin/licenses/{key}/plugins
pub async fn assign_plugin(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Json(body): Json<AssignPluginBody>,
) -> Result<Json<AssignedPlugin>> {
    let slug = body.plugin_slug.trim();
    if !validation::is_valid_plugin_slug(slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let assignment = queries::assign_plugin(&conn, &license.id, slug)?;

    Ok(Json(assignment))
}

#[derive(Debug, Deserialize)]
pub struct PluginPath {
    pub key: String,
    pub slug: String,
}

/// DELETE /admin/licenses/{key}/plugins/{slug} - soft removal. Existing
/// activations for the plugin keep their seats until deactivated.
pub async fn remove_plugin(
    State(state): State<AppState>,
    Path(path): Path<PluginPath>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let removed = queries::remove_plugin(&conn, &license.id, &path.slug)?;

    Ok(Json(serde_json::json!({ "success": removed })))
}

/// POST /admin/licenses/{key}/renew - support-desk renewal on behalf of the
/// owner. Same recovery semantics as the owner-facing endpoint.
pub async fn renew_license(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let ip = client_identity(&headers, None);
    let expires_at = queries::renew_license(
        &conn,
        &license.id,
        state.config.license_validity_days,
        None,
        Some(&ip),
    )?;

    state.events.publish(LifecycleEvent::LicenseRenewed {
        license_id: license.id.clone(),
        expires_at,
    });

    Ok(Json(serde_json::json!({ "success": true, "expires_at": expires_at })))
}
