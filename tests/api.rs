mod common;

use axum::http::{Method, StatusCode};
use better_marketing::config::RateLimitOptions;
use common::{create_user, instance, options, send};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn ok_and_version() {
    let app = instance(options()).await.router();
    let res = send(&app, Method::GET, "/ok", None, &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({ "ok": true }));

    let res = send(&app, Method::GET, "/version", None, &[]).await;
    assert_eq!(res.body["name"], "better-marketing");
    assert_eq!(res.body["app"], "Better Marketing");
}

#[tokio::test]
async fn user_lifecycle() {
    let app = instance(options()).await.router();
    let user = create_user(&app, "Jane@Example.com").await;
    let id = user["id"].as_str().unwrap().to_string();
    assert_eq!(user["email"], "jane@example.com");
    assert_eq!(user["emailVerified"], false);

    let res = send(&app, Method::GET, &format!("/user/get/{}", id), None, &[]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["firstName"], "Test");

    let res = send(
        &app,
        Method::PUT,
        &format!("/user/update/{}", id),
        Some(json!({ "lastName": "Doe" })),
        &[],
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["lastName"], "Doe");

    let res = send(&app, Method::GET, "/user/list?email=JANE%40example.com", None, &[]).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);

    let res = send(&app, Method::DELETE, &format!("/user/delete/{}", id), None, &[]).await;
    assert_eq!(res.body, json!({ "success": true }));
    let res = send(&app, Method::GET, &format!("/user/get/{}", id), None, &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"]["message"], "User not found");
}

#[tokio::test]
async fn invalid_and_duplicate_users_are_rejected() {
    let app = instance(options()).await.router();
    let res = send(&app, Method::POST, "/user/create", Some(json!({ "firstName": "X" })), &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["code"], "VALIDATION_ERROR");

    let res = send(&app, Method::POST, "/user/create", Some(json!({ "email": "not-an-email" })), &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = send(
        &app,
        Method::POST,
        "/user/create",
        Some(json!({ "email": "phone@example.com", "phone": "call me" })),
        &[],
    )
    .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["error"]["details"][0]["field"], "phone");
    let res = send(
        &app,
        Method::POST,
        "/user/create",
        Some(json!({ "email": "phone@example.com", "phone": "+1 (555) 010-2030" })),
        &[],
    )
    .await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);

    create_user(&app, "dup@example.com").await;
    let res = send(&app, Method::POST, "/user/create", Some(json!({ "email": "DUP@example.com" })), &[]).await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn campaign_requires_existing_owner() {
    let app = instance(options()).await.router();
    let res = send(
        &app,
        Method::POST,
        "/campaign/create",
        Some(json!({ "name": "Launch", "createdBy": "missing" })),
        &[],
    )
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let user = create_user(&app, "owner@example.com").await;
    let res = send(
        &app,
        Method::POST,
        "/campaign/create",
        Some(json!({ "name": "Launch", "channel": "email", "createdBy": user["id"] })),
        &[],
    )
    .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "draft");

    let res = send(&app, Method::GET, "/campaign/list?channel=email", None, &[]).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);
    let res = send(&app, Method::GET, "/campaign/list?channel=fax", None, &[]).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_methods_and_bodies() {
    let app = instance(options()).await.router();
    assert_eq!(send(&app, Method::GET, "/nope", None, &[]).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        send(&app, Method::POST, "/ok", None, &[]).await.status,
        StatusCode::METHOD_NOT_ALLOWED
    );

    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/marketing/user/create")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let res = tower::ServiceExt::oneshot(app.clone(), req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preflight_and_trusted_origins() {
    let app = instance(options().trusted_origin("https://app.example.com")).await.router();
    let res = send(&app, Method::OPTIONS, "/user/create", None, &[("origin", "https://app.example.com")]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers["access-control-allow-origin"], "https://app.example.com");
    assert_eq!(res.headers["access-control-allow-methods"], "GET, POST, PUT, DELETE, OPTIONS");

    let res = send(&app, Method::OPTIONS, "/user/create", None, &[("origin", "https://evil.example")]).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.headers.get("access-control-allow-origin").is_none());

    let res = send(&app, Method::GET, "/ok", None, &[("origin", "https://app.example.com")]).await;
    assert_eq!(res.headers["access-control-allow-origin"], "https://app.example.com");
}

#[tokio::test]
async fn disabled_paths_are_not_found() {
    let app = instance(options().disable_path("/user/list")).await.router();
    let res = send(&app, Method::GET, "/user/list", None, &[]).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, Method::GET, "/ok", None, &[]).await.status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_per_client_and_path() {
    let limited = options().rate_limit(RateLimitOptions {
        enabled: true,
        window: Duration::from_secs(60),
        max: 2,
    });
    let app = instance(limited).await.router();
    let client = [("x-forwarded-for", "203.0.113.9")];
    for _ in 0..2 {
        assert_eq!(send(&app, Method::GET, "/ok", None, &client).await.status, StatusCode::OK);
    }
    let res = send(&app, Method::GET, "/ok", None, &client).await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers.contains_key("x-retry-after"));

    let other = [("x-forwarded-for", "198.51.100.1")];
    assert_eq!(send(&app, Method::GET, "/ok", None, &other).await.status, StatusCode::OK);
    assert_eq!(send(&app, Method::GET, "/version", None, &client).await.status, StatusCode::OK);
}

#[tokio::test]
async fn framework_preset_mounts_under_its_base_path() {
    let marketing = instance(
        better_marketing::MarketingOptions::framework().secret("integration-test-secret-0123456789abcdef"),
    )
    .await;
    let req = axum::http::Request::builder()
        .uri("/api/framework/ok")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = tower::ServiceExt::oneshot(marketing.router(), req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
