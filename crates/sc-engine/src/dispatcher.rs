//! Single-attempt HTTP dispatch.
//!
//! One call to [`Dispatcher::deliver`] performs exactly one authenticated
//! POST to one webhook, logs the outcome, and feeds the health monitor.
//! Failed attempts are not retried here; they only accumulate toward
//! auto-disable.

use std::sync::Arc;

use dashmap::DashMap;
use reqwest::header;
use sc_common::{DeliveryOutcome, EngineConfig, EngineError, NewDeliveryAttempt, Result, Webhook};
use sc_store::DeliveryLog;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::health::HealthMonitor;
use crate::signer;

pub const HEADER_EVENT: &str = "X-Signalcast-Event";
pub const HEADER_SIGNATURE: &str = "X-Signalcast-Signature";
pub const HEADER_TIMESTAMP: &str = "X-Signalcast-Timestamp";
pub const HEADER_WEBHOOK_ID: &str = "X-Signalcast-Webhook-Id";

/// The signed message sent to a receiver for one event. The serialized form
/// of this struct is both the request body and the signature input.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    event: &'a str,
    /// Server-side send time, epoch milliseconds.
    timestamp: i64,
    data: &'a serde_json::Value,
    #[serde(rename = "webhookId")]
    webhook_id: &'a str,
}

pub struct Dispatcher {
    client: reqwest::Client,
    log: Arc<dyn DeliveryLog>,
    health: HealthMonitor,
    /// Per-webhook delivery locks. Attempts to one webhook never pipeline:
    /// an in-flight attempt fully resolves before the next one starts.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Dispatcher {
    pub fn new(
        config: &EngineConfig,
        log: Arc<dyn DeliveryLog>,
        health: HealthMonitor,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("signalcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            log,
            health,
            locks: DashMap::new(),
        })
    }

    /// Deliver one event to one webhook.
    ///
    /// Always records the attempt and re-evaluates the webhook's health,
    /// whatever the outcome. Returns the outcome for observability; callers
    /// must not treat a failed outcome as an error to propagate.
    pub async fn deliver(
        &self,
        webhook: &Webhook,
        event_type: &str,
        data: &serde_json::Value,
    ) -> DeliveryOutcome {
        let lock = self
            .locks
            .entry(webhook.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _serialized = lock.lock().await;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let envelope = Envelope {
            event: event_type,
            timestamp,
            data,
            webhook_id: &webhook.id,
        };

        let body = match serde_json::to_string(&envelope) {
            Ok(body) => body,
            Err(e) => {
                let outcome =
                    DeliveryOutcome::transport_error(format!("failed to serialize envelope: {}", e));
                self.finish(webhook, event_type, String::new(), &outcome)
                    .await;
                return outcome;
            }
        };

        let signature = signer::sign(&webhook.secret, body.as_bytes());

        tracing::debug!(
            webhook_id = %webhook.id,
            event_type = %event_type,
            target_url = %webhook.target_url,
            "Dispatching webhook delivery"
        );

        let result = self
            .client
            .post(&webhook.target_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(HEADER_EVENT, event_type)
            .header(HEADER_SIGNATURE, signature.as_str())
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_WEBHOOK_ID, webhook.id.as_str())
            .body(body.clone())
            .send()
            .await;

        let outcome = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    DeliveryOutcome::success(status)
                } else {
                    // A response is a completed attempt even when the receiver
                    // reports an application-level error; keep the status.
                    DeliveryOutcome::receiver_error(status)
                }
            }
            Err(e) => {
                let message = if e.is_timeout() {
                    "request timed out".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    format!("request error: {}", e)
                };
                DeliveryOutcome::transport_error(message)
            }
        };

        self.finish(webhook, event_type, body, &outcome).await;
        outcome
    }

    /// Record the attempt and re-evaluate health. Neither a logging failure
    /// nor a monitor failure may abort the dispatch control flow.
    async fn finish(
        &self,
        webhook: &Webhook,
        event_type: &str,
        payload: String,
        outcome: &DeliveryOutcome,
    ) {
        let outcome_label = if outcome.success {
            "success"
        } else if outcome.status.is_some() {
            "receiver_error"
        } else {
            "transport_error"
        };
        metrics::counter!("sc_deliveries_total", "outcome" => outcome_label).increment(1);

        if outcome.success {
            tracing::debug!(
                webhook_id = %webhook.id,
                event_type = %event_type,
                status = ?outcome.status,
                "Webhook delivery succeeded"
            );
        } else {
            tracing::warn!(
                webhook_id = %webhook.id,
                event_type = %event_type,
                status = ?outcome.status,
                error = ?outcome.error,
                "Webhook delivery failed"
            );
        }

        let record = NewDeliveryAttempt {
            webhook_id: webhook.id.clone(),
            event_type: event_type.to_string(),
            payload,
            response_status: outcome.status,
            error_message: outcome.error.clone(),
        };
        if let Err(e) = self.log.record(record).await {
            tracing::error!(
                webhook_id = %webhook.id,
                error = %e,
                "Failed to record delivery attempt"
            );
        }

        if let Err(e) = self.health.evaluate(&webhook.id).await {
            tracing::error!(
                webhook_id = %webhook.id,
                error = %e,
                "Failed to evaluate webhook health"
            );
        }
    }
}
