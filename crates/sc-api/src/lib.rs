//! Signalcast administrative API
//!
//! HTTP endpoints for:
//! - Webhook registration and lifecycle (owner-scoped)
//! - Delivery log inspection
//! - Event publishing from business handlers
//! - Health checks

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use sc_common::{is_known_event, EngineConfig, EngineError, NewWebhook, Webhook};
use sc_engine::Broadcaster;
use sc_store::{DeliveryLog, SubscriptionStore};

pub mod auth;
pub mod model;

pub use auth::AuthPrincipal;
use model::{
    ApiError, DeliveriesQuery, DeliveryAttemptResponse, HealthResponse, PublishEventRequest,
    PublishEventResponse, RegisterWebhookRequest, WebhookResponse, WebhookSummaryResponse,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub log: Arc<dyn DeliveryLog>,
    pub broadcaster: Arc<Broadcaster>,
    pub config: EngineConfig,
}

/// OpenAPI document for the DTO schemas exposed by this API.
#[derive(OpenApi)]
#[openapi(
    info(title = "Signalcast API", description = "Webhook registration and event broadcast"),
    components(schemas(
        ApiError,
        RegisterWebhookRequest,
        WebhookResponse,
        WebhookSummaryResponse,
        DeliveryAttemptResponse,
        PublishEventRequest,
        PublishEventResponse,
        HealthResponse,
    ))
)]
pub struct ApiDoc;

/// Build the full router. Everything except `/health` requires a principal
/// resolved by the identity gateway (see [`auth::gateway_auth`]).
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/webhooks", post(register_webhook).get(list_webhooks))
        .route("/webhooks/:id", delete(delete_webhook))
        .route("/webhooks/:id/deliveries", get(list_deliveries))
        .route("/webhooks/:id/activate", post(activate_webhook))
        .route("/webhooks/:id/deactivate", post(deactivate_webhook))
        .route("/events", post(publish_event))
        .route_layer(middleware::from_fn(auth::gateway_auth));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let error = ApiError {
        error: code.to_string(),
        message: message.into(),
        details: None,
    };
    (status, Json(error)).into_response()
}

fn engine_error_response(e: EngineError) -> Response {
    match e {
        EngineError::Validation { message } => {
            api_error(StatusCode::BAD_REQUEST, "VALIDATION", message)
        }
        EngineError::NotFound { .. } => {
            api_error(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
        }
        other => {
            tracing::error!(error = %other, "Request failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal error",
            )
        }
    }
}

fn validate_registration(req: &RegisterWebhookRequest) -> Result<(), Response> {
    if req.events.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "at least one event must be specified",
        ));
    }

    let unknown: Vec<&String> = req.events.iter().filter(|e| !is_known_event(e)).collect();
    if !unknown.is_empty() {
        let error = ApiError {
            error: "VALIDATION".to_string(),
            message: "unknown event types".to_string(),
            details: Some(serde_json::json!({ "invalidEvents": unknown })),
        };
        return Err((StatusCode::BAD_REQUEST, Json(error)).into_response());
    }

    let valid_url = req
        .target_url
        .parse::<reqwest::Url>()
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !valid_url {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "targetUrl must be an absolute http(s) URL",
        ));
    }

    Ok(())
}

/// Fetch a webhook if and only if the principal owns it. Foreign or missing
/// webhooks are indistinguishable to the caller.
async fn owned_webhook(
    state: &AppState,
    principal: &AuthPrincipal,
    id: &str,
) -> Result<Webhook, Response> {
    match state.store.find_by_id(id).await {
        Ok(Some(webhook)) if webhook.owner_user_id == principal.user_id => Ok(webhook),
        Ok(_) => Err(api_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Webhook not found",
        )),
        Err(e) => Err(engine_error_response(e)),
    }
}

// ============================================================================
// Webhook Lifecycle
// ============================================================================

async fn register_webhook(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Json(req): Json<RegisterWebhookRequest>,
) -> Response {
    if let Err(response) = validate_registration(&req) {
        return response;
    }

    let input = NewWebhook {
        owner_user_id: principal.user_id,
        company_id: req.company_id,
        target_url: req.target_url,
        events: req.events.into_iter().collect(),
    };

    match state.store.create(input).await {
        Ok(webhook) => {
            tracing::info!(
                webhook_id = %webhook.id,
                owner = %webhook.owner_user_id,
                "Webhook registered"
            );
            (StatusCode::CREATED, Json(WebhookResponse::from(webhook))).into_response()
        }
        Err(e) => engine_error_response(e),
    }
}

async fn list_webhooks(State(state): State<AppState>, principal: AuthPrincipal) -> Response {
    match state.store.list_for_owner(&principal.user_id).await {
        Ok(webhooks) => Json(
            webhooks
                .into_iter()
                .map(WebhookSummaryResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn deactivate_webhook(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(id): Path<String>,
) -> Response {
    let webhook = match owned_webhook(&state, &principal, &id).await {
        Ok(webhook) => webhook,
        Err(response) => return response,
    };

    match state.store.deactivate(&webhook.id).await {
        Ok(()) => Json(serde_json::json!({ "active": false })).into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn activate_webhook(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(id): Path<String>,
) -> Response {
    let webhook = match owned_webhook(&state, &principal, &id).await {
        Ok(webhook) => webhook,
        Err(response) => return response,
    };

    match state.store.activate(&webhook.id).await {
        Ok(()) => Json(serde_json::json!({ "active": true })).into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn delete_webhook(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(id): Path<String>,
) -> Response {
    let webhook = match owned_webhook(&state, &principal, &id).await {
        Ok(webhook) => webhook,
        Err(response) => return response,
    };

    match state.store.delete(&webhook.id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => engine_error_response(e),
    }
}

async fn list_deliveries(
    State(state): State<AppState>,
    principal: AuthPrincipal,
    Path(id): Path<String>,
    Query(query): Query<DeliveriesQuery>,
) -> Response {
    let webhook = match owned_webhook(&state, &principal, &id).await {
        Ok(webhook) => webhook,
        Err(response) => return response,
    };

    let limit = query
        .limit
        .unwrap_or(state.config.default_recent_limit)
        .min(100);

    match state.log.recent_attempts(&webhook.id, limit).await {
        Ok(attempts) => Json(
            attempts
                .into_iter()
                .map(DeliveryAttemptResponse::from)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => engine_error_response(e),
    }
}

// ============================================================================
// Event Publishing
// ============================================================================

async fn publish_event(
    State(state): State<AppState>,
    _principal: AuthPrincipal,
    Json(req): Json<PublishEventRequest>,
) -> Response {
    if req.event_type.trim().is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION",
            "eventType must not be empty",
        );
    }

    state
        .broadcaster
        .publish(&req.event_type, req.data, req.company_id.as_deref())
        .await;

    (
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            accepted: true,
            event_type: req.event_type,
        }),
    )
        .into_response()
}

// ============================================================================
// Health
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
