use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::models::{ActivatedDomain, ActivationLogEntry, LicenseHistoryEntry};
use crate::util::SECONDS_PER_DAY;

use super::licenses::LicensePath;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<ActivationLogEntry>,
    pub total: i64,
}

/// GET /admin/licenses/{key}/logs - the append-only activation ledger.
pub async fn list_activation_logs(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let (logs, total) =
        queries::list_activation_logs_paginated(&conn, &license.id, query.limit, query.offset)?;

    Ok(Json(LogsResponse { logs, total }))
}

/// GET /admin/licenses/{key}/history - lifecycle transitions.
pub async fn list_history(
    State(state): State<AppState>,
    Path(path): Path<LicensePath>,
) -> Result<Json<Vec<LicenseHistoryEntry>>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_key(&conn, &path.key, &state.site_secret)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let history = queries::list_history(&conn, &license.id)?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct StaleQuery {
    #[serde(default = "default_stale_days")]
    pub days: i64,
}

fn default_stale_days() -> i64 {
    30
}

/// GET /admin/stale-installs - active seats whose install has not checked
/// in for the given number of days. Candidates for support follow-up or
/// admin deactivation.
pub async fn list_stale_installs(
    State(state): State<AppState>,
    Query(query): Query<StaleQuery>,
) -> Result<Json<Vec<ActivatedDomain>>> {
    if query.days < 1 {
        return Err(AppError::InvalidInput("days must be at least 1".into()));
    }

    let conn = state.db.get()?;
    let cutoff = chrono::Utc::now().timestamp() - query.days * SECONDS_PER_DAY;
    let stale = queries::list_stale_activations(&conn, cutoff)?;
    Ok(Json(stale))
}
