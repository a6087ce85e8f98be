use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// Application error. Every failure a request can hit maps to exactly one
/// variant; no handler panics.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed key/domain/slug/version. Rejected before the rate limiter
    /// or the store are touched.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    NotFound(String),

    /// License exists but is suspended, expired, or cancelled.
    #[error("License is not active")]
    LicenseInvalid,

    #[error("Plugin not assigned to license")]
    PluginNotAssigned,

    #[error("Domain limit reached ({active}/{max}). Deactivate a domain first.")]
    SeatLimitReached { active: i64, max: i64 },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::LicenseInvalid | Self::PluginNotAssigned | Self::SeatLimitReached { .. } => {
                StatusCode::FORBIDDEN
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage failures are logged server-side and never leak details
        let message = match &self {
            Self::Database(err) => {
                tracing::error!("Database error: {}", err);
                "Internal server error".to_string()
            }
            Self::Pool(err) => {
                tracing::error!("Connection pool error: {}", err);
                "Internal server error".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = axum::Json(serde_json::json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
