//! Repository traits for the two tables this engine owns.

use async_trait::async_trait;
use sc_common::{
    DeliveryAttempt, NewDeliveryAttempt, NewWebhook, Result, Webhook, WebhookSummary,
};

/// CRUD over webhook registrations, scoped to owners and tenants.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Register a new webhook. Generates the id and signing secret and
    /// persists with `active = true`.
    ///
    /// Fails with `EngineError::Validation` when the event set is empty;
    /// nothing is persisted in that case.
    async fn create(&self, input: NewWebhook) -> Result<Webhook>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Webhook>>;

    /// All active webhooks whose event set contains `event_type`.
    ///
    /// With `company_id` given, only subscriptions scoped to exactly that
    /// company match. With it omitted, all active matches are returned
    /// regardless of tenant scope.
    async fn find_active_matching(
        &self,
        event_type: &str,
        company_id: Option<&str>,
    ) -> Result<Vec<Webhook>>;

    /// Disable a webhook. Idempotent: already-inactive webhooks are a no-op,
    /// and concurrent deactivations resolve last-write-wins.
    async fn deactivate(&self, id: &str) -> Result<()>;

    /// Re-enable a webhook. Only ever called on explicit owner action.
    async fn activate(&self, id: &str) -> Result<()>;

    /// The owner's webhooks, newest first, with secrets excluded.
    async fn list_for_owner(&self, owner_user_id: &str) -> Result<Vec<WebhookSummary>>;

    /// Remove a registration. Delivery attempts are retained for audit.
    /// Returns false when no such webhook existed.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Append-only log of delivery attempts.
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    /// Append one immutable attempt row.
    async fn record(&self, input: NewDeliveryAttempt) -> Result<DeliveryAttempt>;

    /// The `limit` most recent attempts for a webhook, newest first.
    async fn recent_attempts(&self, webhook_id: &str, limit: u32) -> Result<Vec<DeliveryAttempt>>;
}
