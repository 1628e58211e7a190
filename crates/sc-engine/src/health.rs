//! Delivery health monitoring.
//!
//! After every delivery attempt the dispatcher asks the monitor to look at
//! the subscription's recent history. A webhook that fails persistently gets
//! deactivated so the platform stops wasting delivery attempts on a dead
//! endpoint; re-enabling is an explicit owner action.

use std::sync::Arc;

use sc_common::{DeliveryAttempt, EngineConfig, Result};
use sc_store::{DeliveryLog, SubscriptionStore};

pub struct HealthMonitor {
    store: Arc<dyn SubscriptionStore>,
    log: Arc<dyn DeliveryLog>,
    failure_threshold: u32,
    history_window: u32,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        log: Arc<dyn DeliveryLog>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            log,
            failure_threshold: config.failure_threshold,
            history_window: config.history_window,
        }
    }

    /// Inspect recent history and deactivate the webhook if it has crossed
    /// the consecutive-failure threshold. Holds no state between calls and is
    /// safe to run after every single attempt; a race between two
    /// evaluations both deciding to disable resolves as a harmless
    /// double-deactivate.
    pub async fn evaluate(&self, webhook_id: &str) -> Result<()> {
        let attempts = self
            .log
            .recent_attempts(webhook_id, self.history_window)
            .await?;

        let failures = consecutive_failures(&attempts);
        if failures >= self.failure_threshold {
            self.store.deactivate(webhook_id).await?;
            tracing::warn!(
                webhook_id = %webhook_id,
                consecutive_failures = failures,
                threshold = self.failure_threshold,
                "Auto-disabling webhook after consecutive delivery failures"
            );
            metrics::counter!("sc_webhooks_auto_disabled_total").increment(1);
        }
        Ok(())
    }
}

/// Count failures walking newest to oldest, stopping at the first success.
/// Expects `attempts` in most-recent-first order.
fn consecutive_failures(attempts: &[DeliveryAttempt]) -> u32 {
    let mut failures = 0;
    for attempt in attempts {
        if attempt.is_failure() {
            failures += 1;
        } else {
            break;
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn attempt(status: Option<u16>) -> DeliveryAttempt {
        DeliveryAttempt {
            id: "att".to_string(),
            webhook_id: "wh".to_string(),
            event_type: "invoice.paid".to_string(),
            payload: "{}".to_string(),
            response_status: status,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_history_has_no_failures() {
        assert_eq!(consecutive_failures(&[]), 0);
    }

    #[test]
    fn test_counts_until_first_success() {
        // Newest first: two failures, then a success, then more failures.
        let attempts = vec![
            attempt(None),
            attempt(Some(500)),
            attempt(Some(200)),
            attempt(Some(500)),
            attempt(Some(500)),
        ];
        assert_eq!(consecutive_failures(&attempts), 2);
    }

    #[test]
    fn test_success_at_head_resets_count() {
        let mut attempts = vec![attempt(Some(200))];
        attempts.extend((0..9).map(|_| attempt(Some(500))));
        assert_eq!(consecutive_failures(&attempts), 0);
    }

    #[test]
    fn test_all_failures_counted() {
        let attempts: Vec<_> = (0..10).map(|_| attempt(None)).collect();
        assert_eq!(consecutive_failures(&attempts), 10);
    }

    #[test]
    fn test_4xx_counts_as_failure() {
        let attempts = vec![attempt(Some(404)), attempt(Some(400))];
        assert_eq!(consecutive_failures(&attempts), 2);
    }
}
