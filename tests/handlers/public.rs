//! End-to-end tests for the public protocol surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use license_server::config::RateBudget;
use license_server::db::queries;
use license_server::models::{ActivationAction, CreatePluginVersion};

use crate::common::*;

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_bearer(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = public_app(create_test_state());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn seat_limit_scenario_end_to_end() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        create_test_license(&conn, &owner.id, 1, Some(future_timestamp(365)), &["foo"]).license_key
    };
    let app = public_app(state);

    // First activation consumes the only seat
    let response = app
        .clone()
        .oneshot(post_json(
            "/activate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["domains_remaining"], 0);
    assert_eq!(body["activation_token"].as_str().unwrap().len(), 32);
    assert!(body["install_uuid"].as_str().is_some());

    // A second domain is refused
    let response = app
        .clone()
        .oneshot(post_json(
            "/activate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "other.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Domain limit"));

    // Freeing the seat
    let response = app
        .clone()
        .oneshot(post_json(
            "/deactivate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    // ...lets the other domain in
    let response = app
        .clone()
        .oneshot(post_json(
            "/activate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "other.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["domains_remaining"], 0);
}

#[tokio::test]
async fn repeated_activation_is_idempotent_over_http() {
    let state = create_test_state();
    let (license_id, key) = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license = create_test_license(&conn, &owner.id, 1, None, &["foo"]);
        (license.id, license.license_key)
    };
    let app = public_app(state.clone());

    let request =
        serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "example.com"});
    let first = app.clone().oneshot(post_json("/activate", request.clone())).await.unwrap();
    let second = app.clone().oneshot(post_json("/activate", request)).await.unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    let first = body_json(first).await;
    let second = body_json(second).await;
    assert_eq!(first["install_uuid"], second["install_uuid"]);
    assert_ne!(first["activation_token"], second["activation_token"]);

    let conn = state.db.get().unwrap();
    assert_eq!(queries::count_active_domains(&conn, &license_id).unwrap(), 1);
}

#[tokio::test]
async fn activation_normalizes_the_domain() {
    let state = create_test_state();
    let (license_id, key) = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license = create_test_license(&conn, &owner.id, 1, None, &["foo"]);
        (license.id, license.license_key)
    };
    let app = public_app(state.clone());

    let response = app
        .oneshot(post_json(
            "/activate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "https://Example.COM/wp-admin/"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conn = state.db.get().unwrap();
    let domains = queries::list_active_domains(&conn, &license_id).unwrap();
    assert_eq!(domains[0].domain, "example.com");
}

#[tokio::test]
async fn verify_returns_license_details_and_logs_a_check_in() {
    let state = create_test_state();
    let (license_id, key) = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license =
            create_test_license(&conn, &owner.id, 5, Some(future_timestamp(30)), &["foo", "bar"]);
        (license.id, license.license_key)
    };
    let app = public_app(state.clone());

    let response = app
        .oneshot(post_json(
            "/verify",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["license_id"], license_id.as_str());
    assert_eq!(body["status"], "active");
    assert_eq!(body["plan_type"], "single");
    assert_eq!(body["max_domains"], 5);
    assert_eq!(body["active_domains"], 0);
    let plugins = body["plugins"].as_array().unwrap();
    assert_eq!(plugins.len(), 2);

    // Verification is read-only: no seat consumed, but a check_in is logged
    let conn = state.db.get().unwrap();
    assert_eq!(queries::count_active_domains(&conn, &license_id).unwrap(), 0);
    let (logs, total) =
        queries::list_activation_logs_paginated(&conn, &license_id, 10, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(logs[0].action, ActivationAction::CheckIn);
}

#[tokio::test]
async fn verify_rejects_invalid_suspended_and_unassigned() {
    let state = create_test_state();
    let (suspended_key, expired_key, valid_key) = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");

        let suspended = create_test_license(&conn, &owner.id, 1, None, &["foo"]);
        queries::suspend_license(&conn, &suspended.id, "abuse", None, None).unwrap();

        let expired =
            create_test_license(&conn, &owner.id, 1, Some(past_timestamp(1)), &["foo"]);

        let valid = create_test_license(&conn, &owner.id, 1, None, &["foo"]);

        (suspended.license_key, expired.license_key, valid.license_key)
    };
    let app = public_app(state);

    for key in [&suspended_key, &expired_key] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/verify",
                serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "a.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // Valid license, but the plugin is not assigned
    let response = app
        .clone()
        .oneshot(post_json(
            "/verify",
            serde_json::json!({"license_key": valid_key, "plugin_slug": "bar", "domain": "a.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("not assigned"));
}

#[tokio::test]
async fn verify_unknown_key_is_404() {
    let app = public_app(create_test_state());

    let response = app
        .oneshot(post_json(
            "/verify",
            serde_json::json!({"license_key": "AAAA-BBBB-CCCC-DDDD", "plugin_slug": "foo", "domain": "a.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_input_is_rejected_before_the_rate_limiter() {
    let state = create_test_state();
    let app = public_app(state.clone());

    for bad in [
        serde_json::json!({"license_key": "lowercase-key-0000", "plugin_slug": "foo", "domain": "a.com"}),
        serde_json::json!({"license_key": "AAAA-BBBB-CCCC-DDDD", "plugin_slug": "Bad_Slug", "domain": "a.com"}),
        serde_json::json!({"license_key": "AAAA-BBBB-CCCC-DDDD", "plugin_slug": "foo", "domain": "not a domain"}),
    ] {
        let response = app.clone().oneshot(post_json("/verify", bad)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // None of those touched the verify budget for this client
    let budget = state.config.verify_budget;
    assert_eq!(
        state.rate_limiter.remaining("unknown", "verify", budget.limit),
        budget.limit
    );
}

#[tokio::test]
async fn verify_rate_limit_returns_429_after_budget() {
    let mut config = test_config();
    config.verify_budget = RateBudget {
        limit: 2,
        window_secs: 3600,
    };
    let state = create_test_state_with_config(config);
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        create_test_license(&conn, &owner.id, 1, None, &["foo"]).license_key
    };
    let app = public_app(state);

    let request =
        serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "a.com"});

    for _ in 0..2 {
        let response = app.clone().oneshot(post_json("/verify", request.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(post_json("/verify", request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn failed_key_guesses_still_burn_budget() {
    let mut config = test_config();
    config.verify_budget = RateBudget {
        limit: 2,
        window_secs: 3600,
    };
    let state = create_test_state_with_config(config);
    let app = public_app(state);

    // Well-formed but unknown keys: 404s that still count
    let request = serde_json::json!({"license_key": "AAAA-BBBB-CCCC-DDDD", "plugin_slug": "foo", "domain": "a.com"});
    for _ in 0..2 {
        let response = app.clone().oneshot(post_json("/verify", request.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    let response = app.clone().oneshot(post_json("/verify", request)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn deactivate_is_successful_even_when_nothing_matches() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        create_test_license(&conn, &owner.id, 1, None, &["foo"]).license_key
    };
    let app = public_app(state);

    let response = app
        .oneshot(post_json(
            "/deactivate",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "never.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().unwrap().contains("No matching"));
}

#[tokio::test]
async fn check_update_reports_strictly_newer_versions() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license = create_test_license(&conn, &owner.id, 1, None, &["foo"]);

        queries::create_plugin_version(
            &conn,
            &CreatePluginVersion {
                plugin_slug: "foo".into(),
                version: "2.1.0".into(),
                download_url: "https://downloads.example.com/foo-2.1.0.zip".into(),
                changelog: Some("Fixes".into()),
                requires_php: Some("8.0".into()),
                requires_wp: Some("6.2".into()),
                tested_up_to: None,
                file_hash: None,
                file_size: None,
            },
        )
        .unwrap();

        license.license_key
    };
    let app = public_app(state);

    // Older install: update offered with download metadata
    let response = app
        .clone()
        .oneshot(post_json(
            "/check-update",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "current_version": "2.0.3"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["has_update"], true);
    assert_eq!(body["new_version"], "2.1.0");
    assert!(body["download_url"].as_str().unwrap().contains("foo-2.1.0"));

    // Same version: nothing offered, no download URL leaked
    let response = app
        .clone()
        .oneshot(post_json(
            "/check-update",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "current_version": "2.1.0"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["has_update"], false);
    assert!(body.get("download_url").is_none());

    // Pre-release install of the same number: the release is newer
    let response = app
        .clone()
        .oneshot(post_json(
            "/check-update",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "current_version": "2.1.0-rc1"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["has_update"], true);
}

#[tokio::test]
async fn check_update_without_versions_is_a_clean_miss() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        create_test_license(&conn, &owner.id, 1, None, &["foo"]).license_key
    };
    let app = public_app(state);

    let response = app
        .oneshot(post_json(
            "/check-update",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "current_version": "1.0"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["has_update"], false);
    assert_eq!(body["message"], "No versions found");
}

#[tokio::test]
async fn check_update_requires_a_valid_license() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license = create_test_license(&conn, &owner.id, 1, Some(past_timestamp(1)), &["foo"]);
        license.license_key
    };
    let app = public_app(state);

    let response = app
        .oneshot(post_json(
            "/check-update",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "current_version": "1.0"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_redirects_licensed_clients() {
    let state = create_test_state();
    let key = {
        let conn = state.db.get().unwrap();
        let (owner, _) = create_test_owner(&conn, "Acme");
        let license = create_test_license(&conn, &owner.id, 1, None, &["foo"]);

        queries::create_plugin_version(
            &conn,
            &CreatePluginVersion {
                plugin_slug: "foo".into(),
                version: "2.1.0".into(),
                download_url: "https://downloads.example.com/foo-2.1.0.zip".into(),
                changelog: None,
                requires_php: None,
                requires_wp: None,
                tested_up_to: None,
                file_hash: None,
                file_size: None,
            },
        )
        .unwrap();

        license.license_key
    };
    let app = public_app(state);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/download?key={key}&plugin=foo&version=2.1.0"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://downloads.example.com/foo-2.1.0.zip"
    );

    // Unknown version
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/download?key={key}&plugin=foo&version=9.9.9"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Malformed key never reaches the store
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/download?key=bogus&plugin=foo&version=2.1.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn renew_requires_the_recorded_owner() {
    let state = create_test_state();
    let (key, owner_token, other_token) = {
        let conn = state.db.get().unwrap();
        let (owner, owner_token) = create_test_owner(&conn, "Acme");
        let (_other, other_token) = create_test_owner(&conn, "Globex");
        let license = create_test_license(&conn, &owner.id, 1, Some(past_timestamp(5)), &["foo"]);
        (license.license_key, owner_token, other_token)
    };
    let app = public_app(state.clone());

    let body = serde_json::json!({"license_key": key});

    // No credentials
    let response = app.clone().oneshot(post_json("/renew", body.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Authenticated, but not the recorded owner
    let response = app
        .clone()
        .oneshot(post_json_bearer("/renew", &other_token, body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner resurrects the clock-expired license
    let before = chrono::Utc::now().timestamp();
    let response = app
        .clone()
        .oneshot(post_json_bearer("/renew", &owner_token, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;
    assert_eq!(payload["success"], true);
    let expires_at = payload["expires_at"].as_i64().unwrap();
    assert!(expires_at >= before + 365 * 86400);

    // And verification works again
    let response = app
        .oneshot(post_json(
            "/verify",
            serde_json::json!({"license_key": key, "plugin_slug": "foo", "domain": "a.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn owners_can_list_their_licenses() {
    let state = create_test_state();
    let (owner_token, license_id) = {
        let conn = state.db.get().unwrap();
        let (owner, token) = create_test_owner(&conn, "Acme");
        let (_other, _) = create_test_owner(&conn, "Globex");
        let license = create_test_license(&conn, &owner.id, 2, None, &["foo"]);
        (token, license.id)
    };
    let app = public_app(state.clone());

    // Consume one seat so usage shows up
    {
        let mut conn = state.db.get().unwrap();
        queries::activate_domain_atomic(&mut conn, &license_id, "foo", "a.com", None).unwrap();
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/licenses")
                .header("authorization", format!("Bearer {owner_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let licenses = body.as_array().unwrap();
    assert_eq!(licenses.len(), 1);
    assert_eq!(licenses[0]["valid"], true);
    assert_eq!(licenses[0]["active_domains"], 1);
    assert_eq!(licenses[0]["plugins"][0], "foo");

    // No credentials, no listing
    let response = app
        .oneshot(Request::builder().uri("/licenses").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
