//! API integration tests over the in-memory SQLite store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use sc_api::{create_router, AppState};
use sc_common::{EngineConfig, NewDeliveryAttempt};
use sc_engine::{Broadcaster, Dispatcher, HealthMonitor};
use sc_store::sqlite::SqliteStore;
use sc_store::{DeliveryLog, SubscriptionStore};

async fn test_app() -> (Router, Arc<SqliteStore>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory sqlite");
    let store = Arc::new(SqliteStore::new(pool));
    store.init_schema().await.expect("schema init failed");

    let config = EngineConfig::default();
    let subscriptions: Arc<dyn SubscriptionStore> = store.clone();
    let log: Arc<dyn DeliveryLog> = store.clone();
    let health = HealthMonitor::new(subscriptions.clone(), log.clone(), &config);
    let dispatcher =
        Arc::new(Dispatcher::new(&config, log.clone(), health).expect("dispatcher build"));
    let broadcaster = Arc::new(Broadcaster::new(subscriptions.clone(), dispatcher));

    let state = AppState {
        store: subscriptions,
        log,
        broadcaster,
        config,
    };
    (create_router(state), store)
}

fn request(
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("X-User-Id", user);
    }
    match body {
        Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn register_body(events: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "targetUrl": "https://receiver.example.com/hooks",
        "events": events,
        "companyId": "c1",
    })
}

#[tokio::test]
async fn test_health_requires_no_auth() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "UP");
}

#[tokio::test]
async fn test_requests_without_principal_are_rejected() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(request("GET", "/webhooks", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_register_returns_secret_once_and_list_never() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(register_body(&["invoice.paid", "task.created"])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["ownerUserId"], "user-1");
    assert_eq!(created["companyId"], "c1");
    assert_eq!(created["active"], true);
    assert_eq!(created["secret"].as_str().unwrap().len(), 64);

    let response = app
        .oneshot(request("GET", "/webhooks", Some("user-1"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], created["id"]);
    assert!(listed[0].get("secret").is_none());
}

#[tokio::test]
async fn test_register_validation_failures() {
    let (app, store) = test_app().await;

    // Empty event list
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(register_body(&[])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "VALIDATION");

    // Event name outside the catalog
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(register_body(&["invoice.exploded"])),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["details"]["invalidEvents"][0], "invoice.exploded");

    // Not an absolute http(s) URL
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(serde_json::json!({
                "targetUrl": "ftp://example.com/hook",
                "events": ["invoice.paid"],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was persisted by any of the rejected requests
    let listed = store.list_for_owner("user-1").await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_owner_lifecycle_and_foreign_access() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(register_body(&["invoice.paid"])),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Another user cannot see or touch it.
    let response = app
        .clone()
        .oneshot(request("GET", "/webhooks", Some("user-2"), None))
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert!(listed.as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/webhooks/{}/deactivate", id),
            Some("user-2"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner can deactivate (idempotently) and re-activate.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/webhooks/{}/deactivate", id),
                Some("user-1"),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request("GET", "/webhooks", Some("user-1"), None))
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert_eq!(listed[0]["active"], false);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/webhooks/{}/activate", id),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Delete, then the webhook is gone.
    let response = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/webhooks/{}", id),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(request(
            "DELETE",
            &format!("/webhooks/{}", id),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deliveries_endpoint_returns_recent_attempts() {
    let (app, store) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/webhooks",
            Some("user-1"),
            Some(register_body(&["invoice.paid"])),
        ))
        .await
        .unwrap();
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();

    for status in [Some(200), Some(500)] {
        store
            .record(NewDeliveryAttempt {
                webhook_id: id.clone(),
                event_type: "invoice.paid".to_string(),
                payload: "{}".to_string(),
                response_status: status,
                error_message: None,
            })
            .await
            .unwrap();
    }

    let response = app
        .oneshot(request(
            "GET",
            &format!("/webhooks/{}/deliveries", id),
            Some("user-1"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let attempts = json_body(response).await;
    let attempts = attempts.as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["responseStatus"], 500);
    assert_eq!(attempts[1]["responseStatus"], 200);
}

#[tokio::test]
async fn test_publish_event_is_accepted() {
    let (app, _) = test_app().await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/events",
            Some("svc-projects"),
            Some(serde_json::json!({
                "eventType": "project.created",
                "data": {"projectId": "p-1"},
                "companyId": "c1",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    assert_eq!(body["accepted"], true);
    assert_eq!(body["eventType"], "project.created");

    let response = app
        .oneshot(request(
            "POST",
            "/events",
            Some("svc-projects"),
            Some(serde_json::json!({ "eventType": " ", "data": {} })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
