//! PostgreSQL backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use sc_common::{
    DeliveryAttempt, EngineError, NewDeliveryAttempt, NewWebhook, Result, Webhook, WebhookSummary,
};

use crate::repository::{DeliveryLog, SubscriptionStore};
use crate::{generate_id, generate_secret};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS webhooks (
                id TEXT PRIMARY KEY,
                owner_user_id TEXT NOT NULL,
                company_id TEXT,
                target_url TEXT NOT NULL,
                events TEXT NOT NULL,
                secret TEXT NOT NULL,
                active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_webhooks_owner ON webhooks(owner_user_id);
            CREATE TABLE IF NOT EXISTS webhook_delivery_logs (
                id TEXT PRIMARY KEY,
                seq BIGSERIAL,
                webhook_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                response_status INTEGER,
                error_message TEXT,
                created_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_delivery_logs_webhook
                ON webhook_delivery_logs(webhook_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| EngineError::internal(format!("invalid timestamp: {}", ms)))
}

fn webhook_from_row(row: &PgRow) -> Result<Webhook> {
    let events_json: String = row.get("events");
    Ok(Webhook {
        id: row.get("id"),
        owner_user_id: row.get("owner_user_id"),
        company_id: row.get("company_id"),
        target_url: row.get("target_url"),
        events: serde_json::from_str(&events_json)?,
        secret: row.get("secret"),
        active: row.get("active"),
        created_at: timestamp_from_millis(row.get("created_at"))?,
        updated_at: timestamp_from_millis(row.get("updated_at"))?,
    })
}

fn attempt_from_row(row: &PgRow) -> Result<DeliveryAttempt> {
    let status: Option<i32> = row.get("response_status");
    Ok(DeliveryAttempt {
        id: row.get("id"),
        webhook_id: row.get("webhook_id"),
        event_type: row.get("event_type"),
        payload: row.get("payload"),
        response_status: status.map(|s| s as u16),
        error_message: row.get("error_message"),
        created_at: timestamp_from_millis(row.get("created_at"))?,
    })
}

const WEBHOOK_COLUMNS: &str =
    "id, owner_user_id, company_id, target_url, events, secret, active, created_at, updated_at";

#[async_trait]
impl SubscriptionStore for PostgresStore {
    async fn create(&self, input: NewWebhook) -> Result<Webhook> {
        if input.events.is_empty() {
            return Err(EngineError::validation(
                "at least one event must be specified",
            ));
        }

        let now = Utc::now();
        let webhook = Webhook {
            id: generate_id(),
            owner_user_id: input.owner_user_id,
            company_id: input.company_id,
            target_url: input.target_url,
            events: input.events,
            secret: generate_secret(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO webhooks (id, owner_user_id, company_id, target_url, events, secret, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&webhook.id)
        .bind(&webhook.owner_user_id)
        .bind(&webhook.company_id)
        .bind(&webhook.target_url)
        .bind(serde_json::to_string(&webhook.events)?)
        .bind(&webhook.secret)
        .bind(webhook.active)
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(webhook)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Webhook>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM webhooks WHERE id = $1",
            WEBHOOK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(webhook_from_row).transpose()
    }

    async fn find_active_matching(
        &self,
        event_type: &str,
        company_id: Option<&str>,
    ) -> Result<Vec<Webhook>> {
        let pattern = format!("%\"{}\"%", event_type);

        let rows = match company_id {
            Some(cid) => {
                sqlx::query(&format!(
                    "SELECT {} FROM webhooks WHERE active = TRUE AND events LIKE $1 AND company_id = $2",
                    WEBHOOK_COLUMNS
                ))
                .bind(&pattern)
                .bind(cid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM webhooks WHERE active = TRUE AND events LIKE $1",
                    WEBHOOK_COLUMNS
                ))
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut webhooks = Vec::new();
        for row in &rows {
            let webhook = webhook_from_row(row)?;
            if webhook.subscribes_to(event_type) {
                webhooks.push(webhook);
            }
        }
        Ok(webhooks)
    }

    async fn deactivate(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE webhooks SET active = FALSE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn activate(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE webhooks SET active = TRUE, updated_at = $1 WHERE id = $2")
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_owner(&self, owner_user_id: &str) -> Result<Vec<WebhookSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM webhooks WHERE owner_user_id = $1 ORDER BY created_at DESC",
            WEBHOOK_COLUMNS
        ))
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| webhook_from_row(row).map(WebhookSummary::from))
            .collect()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DeliveryLog for PostgresStore {
    async fn record(&self, input: NewDeliveryAttempt) -> Result<DeliveryAttempt> {
        let now = Utc::now();
        let attempt = DeliveryAttempt {
            id: generate_id(),
            webhook_id: input.webhook_id,
            event_type: input.event_type,
            payload: input.payload,
            response_status: input.response_status,
            error_message: input.error_message,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO webhook_delivery_logs (id, webhook_id, event_type, payload, response_status, error_message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&attempt.id)
        .bind(&attempt.webhook_id)
        .bind(&attempt.event_type)
        .bind(&attempt.payload)
        .bind(attempt.response_status.map(|s| s as i32))
        .bind(&attempt.error_message)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(attempt)
    }

    async fn recent_attempts(&self, webhook_id: &str, limit: u32) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query(
            "SELECT id, webhook_id, event_type, payload, response_status, error_message, created_at \
             FROM webhook_delivery_logs WHERE webhook_id = $1 \
             ORDER BY created_at DESC, seq DESC LIMIT $2",
        )
        .bind(webhook_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(attempt_from_row).collect()
    }
}
