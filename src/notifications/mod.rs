//! Subscriber notifications
//!
//! The engine delivers one text message per (item, subscriber) pair through
//! a [`Notifier`]. Delivery is a single attempt: the caller decides what a
//! failure means for the subscription.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   send(phone, text)   ┌─────────────────┐
//! │  Check Executor  │ ────────────────────▶ │    Notifier     │
//! └──────────────────┘                       └─────────────────┘
//!                                                     │
//!                                            ┌────────▼────────┐
//!                                            │ WebhookNotifier │ ──▶ gateway
//!                                            └─────────────────┘
//! ```

pub mod webhook;

use async_trait::async_trait;

use crate::availability::StockStatus;
use crate::models::Item;

pub use crate::utils::error::NotificationError;
pub use webhook::{WebhookConfig, WebhookNotifier};

/// Delivers a text message to a phone number
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `message` to `phone_number`. One attempt, no retry.
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), NotificationError>;
}

/// Message sent when an item is found in stock
pub fn availability_message(item: &Item, status: StockStatus) -> String {
    format!(
        "🎉 Stock Available! 🎉\n\nProduct: {}\nLocation: {}\n\nStock status: {}\n\nPlace your order soon!",
        item.url,
        item.location_filter,
        status.label()
    )
}

/// Message sent when a subscription is registered
pub fn confirmation_message(item: &Item) -> String {
    format!(
        "✅ Subscription active!\n\nProduct: {}\nLocation: {}\nFrequency: every {} minute(s)\n\nYou'll receive an alert as soon as stock is available.",
        item.url, item.location_filter, item.interval_minutes
    )
}
