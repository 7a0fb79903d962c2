//! Check executor
//!
//! One check of one item:
//!
//! ```text
//! load item ─▶ render (bounded) ─▶ infer ─┬─ available ─▶ notify each active
//!                                         │               subscriber, expire
//!                                         │               the delivered ones
//!                                         └─ otherwise ─▶ log reversion
//!                                                    │
//!                          count remaining active ◀──┘
//! ```
//!
//! Delivery failures are isolated per subscriber and never fail the check.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;

use super::error::{MonitorError, MonitorResult};
use super::events::MonitorEvent;
use crate::availability::{infer_with_tier, CheckResult, StockStatus};
use crate::crawler::Renderer;
use crate::metrics;
use crate::models::ItemId;
use crate::notifications::{availability_message, Notifier};
use crate::storage::SubscriptionStore;
use crate::utils::error::RenderError;

/// Outcome of a completed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub result: CheckResult,
    /// Subscribers notified successfully (now expired)
    pub notified: usize,
    /// Subscribers whose delivery failed (still active)
    pub failed: usize,
    /// Active subscriptions left after this check
    pub remaining_active: usize,
}

/// Runs individual checks against the store, renderer and notifier
pub struct CheckExecutor {
    store: Arc<dyn SubscriptionStore>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
    render_timeout: Duration,
    events: broadcast::Sender<MonitorEvent>,
}

impl CheckExecutor {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        renderer: Arc<dyn Renderer>,
        notifier: Arc<dyn Notifier>,
        render_timeout: Duration,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            store,
            renderer,
            notifier,
            render_timeout,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    /// Check an item once
    ///
    /// `previous` is the status the monitor last observed, used to detect
    /// changes and reversions.
    pub async fn run(
        &self,
        item_id: ItemId,
        previous: Option<StockStatus>,
    ) -> MonitorResult<CheckReport> {
        let item = self
            .store
            .get_item(item_id)
            .await?
            .ok_or_else(|| MonitorError::item_missing(item_id))?;

        let render = self.renderer.render(&item.url, &item.location_filter);
        let snapshot = match tokio::time::timeout(self.render_timeout, render).await {
            Ok(snapshot) => snapshot?,
            Err(_) => return Err(RenderError::Timeout(self.render_timeout.as_secs()).into()),
        };

        let (result, tier) = infer_with_tier(&snapshot);
        tracing::debug!(
            item_id = %item_id,
            tier = tier.unwrap_or("none"),
            status = %result.status,
            "Stock status inferred"
        );

        if previous != Some(result.status) {
            tracing::info!(
                item_id = %item_id,
                url = %item.url,
                from = previous.map(|s| s.as_str()).unwrap_or("none"),
                to = %result.status,
                "Stock status changed"
            );
            metrics::record_status_change(result.status.as_str());
            let _ = self.events.send(MonitorEvent::StatusChanged {
                item_id,
                from: previous,
                to: result.status,
                at: Utc::now(),
            });
        }

        let mut notified = 0;
        let mut failed = 0;

        if result.is_available {
            let subscriptions = self.store.active_subscriptions_for(item_id).await?;
            let message = availability_message(&item, result.status);

            for subscription in subscriptions {
                match self
                    .notifier
                    .send(&subscription.phone_number, &message)
                    .await
                {
                    Ok(()) => {
                        notified += 1;
                        metrics::record_notification("sent");
                        // An unsubscribe that landed during the send wins
                        match self.store.expire_if_active(subscription.id).await {
                            Ok(true) => {}
                            Ok(false) => tracing::debug!(
                                item_id = %item_id,
                                subscription_id = %subscription.id,
                                "Subscription left active state during delivery, not expiring"
                            ),
                            Err(e) => tracing::error!(
                                item_id = %item_id,
                                subscription_id = %subscription.id,
                                error = %e,
                                "Notified subscriber but failed to expire subscription"
                            ),
                        }
                    }
                    Err(e) => {
                        failed += 1;
                        metrics::record_notification("failed");
                        tracing::warn!(
                            item_id = %item_id,
                            subscription_id = %subscription.id,
                            error = %e,
                            "Failed to notify subscriber"
                        );
                    }
                }
            }

            tracing::info!(
                item_id = %item_id,
                notified,
                failed,
                "Availability notifications sent"
            );
        } else if previous == Some(StockStatus::InStock) {
            tracing::info!(
                item_id = %item_id,
                status = %result.status,
                "Item is no longer in stock"
            );
        }

        let remaining_active = self.store.active_count_for(item_id).await?;

        Ok(CheckReport {
            result,
            notified,
            failed,
            remaining_active,
        })
    }
}
