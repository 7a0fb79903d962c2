//! Subscription persistence
//!
//! The engine depends only on the [`SubscriptionStore`] trait so the
//! backend can be swapped:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   StockService / Check Executor / Registry  │
//! └─────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────┐
//! │             SubscriptionStore               │
//! └─────────────────────────────────────────────┘
//!             │                     │
//!             ▼                     ▼
//!   ┌──────────────────┐  ┌──────────────────┐
//!   │   SqliteStore    │  │  InMemoryStore   │
//!   └──────────────────┘  └──────────────────┘
//! ```
//!
//! Items are unique per (url, location filter, interval). Subscriptions are
//! unique per (item, email); registering again reactivates a subscription
//! and replaces its phone number.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    Item, ItemId, ItemSpec, SubscriberSpec, Subscription, SubscriptionId, SubscriptionStatus,
    SubscriptionView,
};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Storage operations used by the monitoring engine
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Find or create the item for (url, location filter, effective interval)
    async fn upsert_item(&self, spec: &ItemSpec) -> Result<Item>;

    /// Create an active subscription, or reactivate an existing one
    ///
    /// The phone number is always replaced. The status-changed timestamp is
    /// only refreshed when the subscription was not already active.
    async fn upsert_subscription(
        &self,
        item_id: ItemId,
        subscriber: &SubscriberSpec,
    ) -> Result<Subscription>;

    /// Upsert the item and the subscription in a single transaction
    async fn register(
        &self,
        item: &ItemSpec,
        subscriber: &SubscriberSpec,
    ) -> Result<(Item, Subscription)>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    async fn get_subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>>;

    /// Set a subscription's status, returning the updated row
    ///
    /// Setting the status it already has leaves the timestamp untouched.
    async fn set_subscription_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>>;

    /// Mark a subscription `expired` only if it is still `active`
    ///
    /// Returns `false` when the subscription is missing or was deleted or
    /// expired in the meantime; its status is then left unchanged.
    async fn expire_if_active(&self, id: SubscriptionId) -> Result<bool>;

    async fn active_subscriptions_for(&self, item_id: ItemId) -> Result<Vec<Subscription>>;

    async fn active_count_for(&self, item_id: ItemId) -> Result<usize>;

    /// Items with at least one active subscription
    async fn items_with_active_subscriptions(&self) -> Result<Vec<Item>>;

    /// All subscriptions of an email, newest first
    ///
    /// Matching ignores ASCII case only; non-ASCII letters must match
    /// exactly.
    async fn subscriptions_for_email(&self, email: &str) -> Result<Vec<SubscriptionView>>;
}
