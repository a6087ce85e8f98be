use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::events::LifecycleEvent;
use crate::extractors::{ClientIp, Json};
use crate::models::{ActivationAction, ActivationOutcome};
use crate::util::user_agent;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub plugin_slug: String,
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub success: bool,
    pub activation_token: String,
    pub install_uuid: String,
    pub domains_remaining: i64,
}

/// POST /activate - bind a domain to the license, consuming one seat of the
/// license-wide pool. Retried calls for the same (plugin, domain) are
/// idempotent: the existing activation is refreshed and no seat is consumed.
pub async fn activate_domain(
    State(state): State<AppState>,
    ClientIp(client_id): ClientIp,
    headers: HeaderMap,
    Json(request): Json<ActivateRequest>,
) -> Result<Json<ActivateResponse>> {
    let license_key = request.license_key.trim();
    let plugin_slug = request.plugin_slug.trim();

    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::InvalidInput("Invalid license key format".into()));
    }
    if !validation::is_valid_plugin_slug(plugin_slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }
    let domain = validation::sanitize_domain(&request.domain)
        .ok_or_else(|| AppError::InvalidInput("Invalid domain".into()))?;

    if !state
        .rate_limiter
        .check(&client_id, "activate", state.config.activate_budget)
    {
        tracing::warn!(client = %client_id, "activate rate limit exceeded");
        return Err(AppError::RateLimited);
    }

    let mut conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let grant =
        match queries::activate_domain_atomic(&mut conn, &license.id, plugin_slug, &domain, Some(&client_id)) {
            Ok(grant) => grant,
            Err(err) => {
                // Typed refusals go to the ledger; storage failures do not,
                // the activation failed closed and nothing was granted
                if matches!(
                    err,
                    AppError::LicenseInvalid
                        | AppError::PluginNotAssigned
                        | AppError::SeatLimitReached { .. }
                ) {
                    queries::log_activation(
                        &conn,
                        &license.id,
                        plugin_slug,
                        &domain,
                        ActivationAction::Activate,
                        ActivationOutcome::Failed,
                        Some(&err.to_string()),
                        Some(&client_id),
                        user_agent(&headers).as_deref(),
                    )?;
                }
                return Err(err);
            }
        };

    queries::log_activation(
        &conn,
        &license.id,
        plugin_slug,
        &domain,
        ActivationAction::Activate,
        ActivationOutcome::Success,
        None,
        Some(&client_id),
        user_agent(&headers).as_deref(),
    )?;

    if grant.created {
        state.events.publish(LifecycleEvent::DomainActivated {
            license_id: license.id.clone(),
            plugin_slug: plugin_slug.to_string(),
            domain: domain.clone(),
        });
    }

    tracing::info!(
        license_id = %license.id,
        plugin = plugin_slug,
        domain = %domain,
        created = grant.created,
        remaining = grant.domains_remaining,
        "domain activated"
    );

    Ok(Json(ActivateResponse {
        success: true,
        activation_token: grant.domain.activation_token,
        install_uuid: grant.domain.install_uuid,
        domains_remaining: grant.domains_remaining,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub license_key: String,
    pub plugin_slug: String,
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
    pub message: String,
}

/// POST /deactivate - free a seat. Deactivating a domain that was never
/// activated (or already deactivated) is a no-op, not an error.
pub async fn deactivate_domain(
    State(state): State<AppState>,
    ClientIp(client_id): ClientIp,
    headers: HeaderMap,
    Json(request): Json<DeactivateRequest>,
) -> Result<Json<DeactivateResponse>> {
    let license_key = request.license_key.trim();
    let plugin_slug = request.plugin_slug.trim();

    if !validation::is_valid_license_key(license_key) {
        return Err(AppError::InvalidInput("Invalid license key format".into()));
    }
    if !validation::is_valid_plugin_slug(plugin_slug) {
        return Err(AppError::InvalidInput("Invalid plugin slug".into()));
    }
    let domain = validation::sanitize_domain(&request.domain)
        .ok_or_else(|| AppError::InvalidInput("Invalid domain".into()))?;

    if !state
        .rate_limiter
        .check(&client_id, "deactivate", state.config.deactivate_budget)
    {
        return Err(AppError::RateLimited);
    }

    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, license_key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let deactivated = queries::deactivate_domain(&conn, &license.id, plugin_slug, &domain)?;

    if deactivated {
        queries::log_activation(
            &conn,
            &license.id,
            plugin_slug,
            &domain,
            ActivationAction::Deactivate,
            ActivationOutcome::Success,
            None,
            Some(&client_id),
            user_agent(&headers).as_deref(),
        )?;
        state.events.publish(LifecycleEvent::DomainDeactivated {
            license_id: license.id.clone(),
            plugin_slug: plugin_slug.to_string(),
            domain: domain.clone(),
        });
    }

    Ok(Json(DeactivateResponse {
        success: true,
        message: if deactivated {
            "Domain deactivated successfully".into()
        } else {
            "No matching active domain".into()
        },
    }))
}
