//! Event broadcast entry point.
//!
//! Business handlers call [`Broadcaster::publish`] whenever a domain event
//! occurs. The broadcaster selects matching active webhooks and fans out one
//! independent delivery task per match; the caller never waits on, or hears
//! about, delivery outcomes — those live in the delivery log.

use std::sync::Arc;

use chrono::Utc;
use sc_store::SubscriptionStore;

use crate::dispatcher::Dispatcher;
use crate::listener::{EventListener, EventNotice, EventNotifier};

pub struct Broadcaster {
    store: Arc<dyn SubscriptionStore>,
    dispatcher: Arc<Dispatcher>,
    notifier: EventNotifier,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn SubscriptionStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            notifier: EventNotifier::new(),
        }
    }

    /// Broadcast one domain event.
    ///
    /// With `company_id` given the event reaches only webhooks scoped to that
    /// company; without it, every active match. Returns once the fan-out
    /// tasks are spawned; one webhook's slowness or failure affects neither
    /// its siblings nor the caller, and this method never reports delivery
    /// errors.
    pub async fn publish(
        &self,
        event_type: &str,
        data: serde_json::Value,
        company_id: Option<&str>,
    ) {
        self.notifier.notify(EventNotice {
            event_type: event_type.to_string(),
            company_id: company_id.map(|c| c.to_string()),
            data: data.clone(),
            published_at: Utc::now(),
        });

        let webhooks = match self.store.find_active_matching(event_type, company_id).await {
            Ok(webhooks) => webhooks,
            Err(e) => {
                tracing::error!(
                    event_type = %event_type,
                    company_id = ?company_id,
                    error = %e,
                    "Failed to query matching webhooks"
                );
                return;
            }
        };

        if webhooks.is_empty() {
            tracing::debug!(
                event_type = %event_type,
                company_id = ?company_id,
                "No active webhooks match event"
            );
            return;
        }

        tracing::info!(
            event_type = %event_type,
            company_id = ?company_id,
            webhook_count = webhooks.len(),
            "Broadcasting event"
        );

        let data = Arc::new(data);
        for webhook in webhooks {
            let dispatcher = Arc::clone(&self.dispatcher);
            let event_type = event_type.to_string();
            let data = Arc::clone(&data);
            tokio::spawn(async move {
                dispatcher.deliver(&webhook, &event_type, &data).await;
            });
        }
    }

    /// Watch the event stream from inside the process. The returned handle
    /// owns the subscription; close or drop it to unsubscribe.
    pub fn subscribe(&self) -> EventListener {
        self.notifier.subscribe()
    }
}
