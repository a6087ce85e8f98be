//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use license_server::config::{Config, RateBudget};
use license_server::crypto::SiteSecret;
use license_server::db::{AppState, create_pool, queries};
use license_server::events::TracingSink;
use license_server::models::{License, Owner, PlanType};
use license_server::rate_limit::RateLimiter;

pub const TEST_SECRET: &str = "test-site-secret";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_path: String::new(),
        site_secret: TEST_SECRET.to_string(),
        admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
        dev_mode: true,
        license_validity_days: 365,
        default_max_domains: 1,
        expiry_sweep_interval_secs: 3600,
        verify_budget: RateBudget {
            limit: 1000,
            window_secs: 3600,
        },
        activate_budget: RateBudget {
            limit: 1000,
            window_secs: 3600,
        },
        deactivate_budget: RateBudget {
            limit: 1000,
            window_secs: 3600,
        },
        update_check_budget: RateBudget {
            limit: 1000,
            window_secs: 3600,
        },
    }
}

/// Build an AppState over a throwaway on-disk database. The tempdir is kept
/// for the life of the test process so pooled connections stay valid.
pub fn create_test_state() -> AppState {
    create_test_state_with_config(test_config())
}

pub fn create_test_state_with_config(mut config: Config) -> AppState {
    let dir = tempfile::tempdir().expect("create tempdir").keep();
    let path = dir.join("license_server_test.db");
    config.database_path = path.to_string_lossy().into_owned();

    let pool = create_pool(&config.database_path).expect("create pool");

    AppState {
        db: pool,
        site_secret: SiteSecret::new(config.site_secret.clone()),
        rate_limiter: RateLimiter::new(),
        events: Arc::new(TracingSink),
        config,
    }
}

pub fn public_app(state: AppState) -> axum::Router {
    license_server::app(state)
}

pub fn test_secret() -> SiteSecret {
    SiteSecret::new(TEST_SECRET)
}

pub fn future_timestamp(days: i64) -> i64 {
    chrono::Utc::now().timestamp() + days * 86400
}

pub fn past_timestamp(days: i64) -> i64 {
    chrono::Utc::now().timestamp() - days * 86400
}

pub fn create_test_owner(conn: &rusqlite::Connection, name: &str) -> (Owner, String) {
    queries::create_owner(conn, name).expect("create owner")
}

/// Create a license with the given seat pool and plugin assignments.
/// `expires_at` of None makes it a lifetime license.
pub fn create_test_license(
    conn: &rusqlite::Connection,
    owner_id: &str,
    max_domains: i64,
    expires_at: Option<i64>,
    plugins: &[&str],
) -> License {
    let license = queries::create_license(
        conn,
        &queries::NewLicense {
            owner_id: owner_id.to_string(),
            plan_type: PlanType::Single,
            max_domains,
            expires_at,
            meta: None,
            created_ip: None,
        },
        &test_secret(),
    )
    .expect("create license");

    for slug in plugins {
        queries::assign_plugin(conn, &license.id, slug).expect("assign plugin");
    }

    license
}

/// Read a JSON response body.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse body as JSON")
}
