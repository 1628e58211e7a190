use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;

pub use config::EngineConfig;

// ============================================================================
// Core Webhook Types
// ============================================================================

/// A registered webhook subscription: an external endpoint plus the set of
/// event types it wants to receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: String,
    pub owner_user_id: String,
    /// Tenant scope; `None` means the subscription is platform-level.
    pub company_id: Option<String>,
    pub target_url: String,
    /// Subscribed event names. Duplicates collapse; never empty once persisted.
    pub events: BTreeSet<String>,
    /// Signing secret (64 hex chars). Generated once at creation, shown to the
    /// owner only in the registration response.
    pub secret: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn subscribes_to(&self, event_type: &str) -> bool {
        self.events.contains(event_type)
    }
}

/// Input for registering a new webhook. Id and secret are generated by the
/// store, not supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub owner_user_id: String,
    pub company_id: Option<String>,
    pub target_url: String,
    pub events: BTreeSet<String>,
}

/// Owner-facing projection of a webhook. The secret is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSummary {
    pub id: String,
    pub owner_user_id: String,
    pub company_id: Option<String>,
    pub target_url: String,
    pub events: BTreeSet<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Webhook> for WebhookSummary {
    fn from(w: Webhook) -> Self {
        Self {
            id: w.id,
            owner_user_id: w.owner_user_id,
            company_id: w.company_id,
            target_url: w.target_url,
            events: w.events,
            active: w.active,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

// ============================================================================
// Delivery Types
// ============================================================================

/// One logged outcome of trying to deliver one envelope to one webhook.
/// Rows are append-only: created exactly once per attempt, never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub id: String,
    pub webhook_id: String,
    pub event_type: String,
    /// The exact serialized envelope body that was sent, kept for audit.
    pub payload: String,
    /// HTTP status of the response, or `None` if the request never completed.
    pub response_status: Option<u16>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryAttempt {
    /// A failure for health purposes: no response at all, or a 4xx/5xx status.
    pub fn is_failure(&self) -> bool {
        match self.response_status {
            None => true,
            Some(status) => status >= 400,
        }
    }
}

/// Input for appending one delivery attempt to the log.
#[derive(Debug, Clone)]
pub struct NewDeliveryAttempt {
    pub webhook_id: String,
    pub event_type: String,
    pub payload: String,
    pub response_status: Option<u16>,
    pub error_message: Option<String>,
}

/// Result of a single delivery attempt, returned by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn success(status: u16) -> Self {
        Self {
            success: true,
            status: Some(status),
            error: None,
        }
    }

    /// A completed request with a non-2xx status. The status is preserved for
    /// audit even though the receiver reported an error.
    pub fn receiver_error(status: u16) -> Self {
        Self {
            success: false,
            status: Some(status),
            error: Some(format!("HTTP {}", status)),
        }
    }

    /// A request that never completed (connection error or timeout).
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// Event Catalog
// ============================================================================

/// Domain event names emitted by the platform's business handlers.
///
/// Registration validates subscriptions against this catalog so that a
/// webhook cannot be registered for an event that will never fire. The
/// broadcaster itself accepts any event name, since producers are numerous
/// and uncoordinated.
pub const KNOWN_EVENTS: &[&str] = &[
    "project.created",
    "project.updated",
    "task.created",
    "task.completed",
    "invoice.created",
    "invoice.paid",
    "rfi.created",
    "document.uploaded",
];

pub fn is_known_event(event_type: &str) -> bool {
    KNOWN_EVENTS.contains(&event_type)
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
