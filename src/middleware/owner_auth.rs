use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::models::Owner;
use crate::util::extract_bearer_token;

/// Authenticated owner context for account-scoped operations (renew).
#[derive(Clone)]
pub struct OwnerContext {
    pub owner: Owner,
}

/// Resolve the bearer token to an owner account. Unattended plugin clients
/// never pass through here; they authenticate by license key possession.
pub async fn owner_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer_token(request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let conn = state
        .db
        .get()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let owner = queries::get_owner_by_token(&conn, token)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(OwnerContext { owner });

    Ok(next.run(request).await)
}
