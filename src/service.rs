//! Subscription service
//!
//! The surface used by the HTTP API and the binary: register, unsubscribe,
//! list, and bootstrap monitors after a restart. It ties the store to the
//! monitor registry so that a monitor exists exactly while its item has
//! active subscriptions.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;

use crate::crawler::Renderer;
use crate::error::Result;
use crate::models::{
    ItemSpec, Registration, SubscriberSpec, SubscriptionId, SubscriptionStatus, SubscriptionView,
    Unsubscribed,
};
use crate::notifications::{confirmation_message, Notifier};
use crate::scheduler::{
    CheckExecutor, MonitorEvent, MonitorInfo, MonitorRegistry, RegistryConfig, SchedulerStats,
};
use crate::storage::SubscriptionStore;
use crate::utils::{extract_domain, parse_http_url};

/// Rejected registration input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The product URL is not an absolute http(s) URL
    #[error("Invalid product URL: {0}")]
    InvalidUrl(String),
}

/// Engine settings for a [`StockService`]
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub registry: RegistryConfig,
    /// Upper bound on a single render
    pub render_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            render_timeout: Duration::from_secs(90),
        }
    }
}

/// Subscription management on top of the monitoring engine
pub struct StockService {
    store: Arc<dyn SubscriptionStore>,
    notifier: Arc<dyn Notifier>,
    registry: MonitorRegistry,
}

impl StockService {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
        options: EngineOptions,
    ) -> Self {
        let events = MonitorRegistry::event_channel();
        let executor = CheckExecutor::new(
            Arc::clone(&store),
            renderer,
            Arc::clone(&notifier),
            options.render_timeout,
            events.clone(),
        );
        let registry = MonitorRegistry::new(options.registry, executor, events);

        Self {
            store,
            notifier,
            registry,
        }
    }

    /// The registry driving the monitors
    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    /// Subscribe to monitor events
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.registry.subscribe()
    }

    /// Register interest in an item
    ///
    /// Creates the item and subscription (or reactivates the subscription),
    /// makes sure the item is monitored and sends a confirmation message.
    /// A failed confirmation is logged and does not fail the registration.
    pub async fn register_subscription(
        &self,
        item: ItemSpec,
        subscriber: SubscriberSpec,
    ) -> Result<Registration> {
        let (item, subscriber) = validate(item, subscriber)?;

        let (item, subscription) = self.store.register(&item, &subscriber).await?;

        tracing::info!(
            item_id = %item.id,
            subscription_id = %subscription.id,
            domain = %extract_domain(&item.url).unwrap_or_default(),
            interval_minutes = item.interval_minutes,
            "Subscription registered"
        );

        self.registry.start_monitor(item.clone()).await;

        match self
            .notifier
            .send(&subscription.phone_number, &confirmation_message(&item))
            .await
        {
            Ok(()) => tracing::info!(
                subscription_id = %subscription.id,
                "Confirmation message sent"
            ),
            Err(e) => tracing::warn!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to send confirmation message"
            ),
        }

        Ok(Registration {
            item_id: item.id,
            subscription_id: subscription.id,
            status: subscription.status,
            status_changed_at: subscription.status_changed_at,
        })
    }

    /// Delete a subscription
    ///
    /// `removed` is true only when this call changed the status. The item's
    /// monitor stops when no active subscriptions remain.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<Unsubscribed> {
        let Some(subscription) = self.store.get_subscription(id).await? else {
            return Ok(Unsubscribed::not_found());
        };

        if subscription.status == SubscriptionStatus::Deleted {
            return Ok(Unsubscribed {
                removed: false,
                status: Some(subscription.status),
                status_changed_at: Some(subscription.status_changed_at),
            });
        }

        let updated = self
            .store
            .set_subscription_status(id, SubscriptionStatus::Deleted)
            .await?
            .unwrap_or(subscription);

        tracing::info!(
            subscription_id = %id,
            item_id = %updated.item_id,
            "Subscription deleted"
        );

        self.registry.stop_if_unwatched(updated.item_id).await?;

        Ok(Unsubscribed {
            removed: true,
            status: Some(updated.status),
            status_changed_at: Some(updated.status_changed_at),
        })
    }

    /// All subscriptions of an email address, newest first
    pub async fn subscriptions_for(&self, email: &str) -> Result<Vec<SubscriptionView>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }

        Ok(self.store.subscriptions_for_email(email).await?)
    }

    /// Start a monitor for every item with active subscriptions
    ///
    /// Returns the number of items found.
    pub async fn bootstrap(&self) -> Result<usize> {
        let items = self.store.items_with_active_subscriptions().await?;
        let count = items.len();

        for item in items {
            self.registry.start_monitor(item).await;
        }

        tracing::info!(monitors = count, "Monitors restored from store");
        Ok(count)
    }

    pub async fn monitors(&self) -> Vec<MonitorInfo> {
        self.registry.monitors().await
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.registry.scheduler_stats()
    }

    /// Stop every monitor
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}

fn required(value: String, field: &'static str) -> std::result::Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn validate(
    item: ItemSpec,
    subscriber: SubscriberSpec,
) -> std::result::Result<(ItemSpec, SubscriberSpec), ValidationError> {
    let interval = item.effective_interval();
    let url = required(item.url, "url")?;
    let location_filter = required(item.location_filter, "locationFilter")?;
    let phone_number = required(subscriber.phone_number, "phoneNumber")?;
    let email = required(subscriber.email, "email")?;

    parse_http_url(&url).map_err(|_| ValidationError::InvalidUrl(url.clone()))?;

    Ok((
        ItemSpec {
            url,
            location_filter,
            interval_minutes: Some(interval),
        },
        SubscriberSpec {
            email,
            phone_number,
        },
    ))
}
