//! Request and response DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use sc_common::{DeliveryAttempt, Webhook, WebhookSummary};

/// Standard error body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Stable error code: VALIDATION, UNAUTHORIZED, NOT_FOUND, INTERNAL_ERROR
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWebhookRequest {
    /// Absolute http(s) destination endpoint
    pub target_url: String,
    /// Event names to subscribe to; must be non-empty and from the catalog
    pub events: Vec<String>,
    /// Optional tenant scope; omitted means platform-level
    #[serde(default)]
    pub company_id: Option<String>,
}

/// Full webhook view returned only from registration; the secret appears
/// here and nowhere else.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub id: String,
    pub owner_user_id: String,
    pub company_id: Option<String>,
    pub target_url: String,
    pub events: Vec<String>,
    pub secret: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Webhook> for WebhookResponse {
    fn from(w: Webhook) -> Self {
        Self {
            id: w.id,
            owner_user_id: w.owner_user_id,
            company_id: w.company_id,
            target_url: w.target_url,
            events: w.events.into_iter().collect(),
            secret: w.secret,
            active: w.active,
            created_at: w.created_at.to_rfc3339(),
            updated_at: w.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSummaryResponse {
    pub id: String,
    pub owner_user_id: String,
    pub company_id: Option<String>,
    pub target_url: String,
    pub events: Vec<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WebhookSummary> for WebhookSummaryResponse {
    fn from(w: WebhookSummary) -> Self {
        Self {
            id: w.id,
            owner_user_id: w.owner_user_id,
            company_id: w.company_id,
            target_url: w.target_url,
            events: w.events.into_iter().collect(),
            active: w.active,
            created_at: w.created_at.to_rfc3339(),
            updated_at: w.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAttemptResponse {
    pub id: String,
    pub webhook_id: String,
    pub event_type: String,
    pub payload: String,
    pub response_status: Option<u16>,
    pub error_message: Option<String>,
    pub created_at: String,
}

impl From<DeliveryAttempt> for DeliveryAttemptResponse {
    fn from(a: DeliveryAttempt) -> Self {
        Self {
            id: a.id,
            webhook_id: a.webhook_id,
            event_type: a.event_type,
            payload: a.payload,
            response_status: a.response_status,
            error_message: a.error_message,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventRequest {
    pub event_type: String,
    pub data: serde_json::Value,
    #[serde(default)]
    pub company_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventResponse {
    pub accepted: bool,
    pub event_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// UP when serving traffic
    pub status: String,
    pub version: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeliveriesQuery {
    /// Max attempts to return, newest first
    pub limit: Option<u32>,
}
