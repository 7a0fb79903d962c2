//! In-memory implementation of [`SubscriptionStore`]
//!
//! Same semantics as the SQLite store, without persistence. Used by tests
//! and by dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use super::SubscriptionStore;
use crate::models::{
    Item, ItemId, ItemSpec, SubscriberSpec, Subscription, SubscriptionId, SubscriptionStatus,
    SubscriptionView,
};

#[derive(Default)]
struct State {
    items: BTreeMap<ItemId, Item>,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_item_id: ItemId,
    next_subscription_id: SubscriptionId,
}

impl State {
    fn upsert_item(&mut self, spec: &ItemSpec) -> Item {
        let interval = spec.effective_interval();

        if let Some(existing) = self.items.values().find(|item| {
            item.url == spec.url
                && item.location_filter == spec.location_filter
                && item.interval_minutes == interval
        }) {
            return existing.clone();
        }

        self.next_item_id += 1;
        let item = Item {
            id: self.next_item_id,
            url: spec.url.clone(),
            location_filter: spec.location_filter.clone(),
            interval_minutes: interval,
            created_at: Utc::now(),
        };
        self.items.insert(item.id, item.clone());
        item
    }

    fn upsert_subscription(&mut self, item_id: ItemId, subscriber: &SubscriberSpec) -> Result<Subscription> {
        if !self.items.contains_key(&item_id) {
            anyhow::bail!("Item {item_id} does not exist");
        }

        let now = Utc::now();

        if let Some(existing) = self
            .subscriptions
            .values_mut()
            .find(|sub| sub.item_id == item_id && sub.email == subscriber.email)
        {
            existing.phone_number = subscriber.phone_number.clone();
            if !existing.status.is_active() {
                existing.status = SubscriptionStatus::Active;
                existing.status_changed_at = now;
            }
            return Ok(existing.clone());
        }

        self.next_subscription_id += 1;
        let subscription = Subscription {
            id: self.next_subscription_id,
            item_id,
            email: subscriber.email.clone(),
            phone_number: subscriber.phone_number.clone(),
            status: SubscriptionStatus::Active,
            created_at: now,
            status_changed_at: now,
        };
        self.subscriptions
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    fn active_for(&self, item_id: ItemId) -> impl Iterator<Item = &Subscription> {
        self.subscriptions
            .values()
            .filter(move |sub| sub.item_id == item_id && sub.status.is_active())
    }
}

/// Store that keeps everything in process memory
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("In-memory store mutex poisoned"))
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn upsert_item(&self, spec: &ItemSpec) -> Result<Item> {
        Ok(self.state()?.upsert_item(spec))
    }

    async fn upsert_subscription(
        &self,
        item_id: ItemId,
        subscriber: &SubscriberSpec,
    ) -> Result<Subscription> {
        self.state()?.upsert_subscription(item_id, subscriber)
    }

    async fn register(
        &self,
        item: &ItemSpec,
        subscriber: &SubscriberSpec,
    ) -> Result<(Item, Subscription)> {
        let mut state = self.state()?;
        let item = state.upsert_item(item);
        let subscription = state.upsert_subscription(item.id, subscriber)?;
        Ok((item, subscription))
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.state()?.items.get(&id).cloned())
    }

    async fn get_subscription(&self, id: SubscriptionId) -> Result<Option<Subscription>> {
        Ok(self.state()?.subscriptions.get(&id).cloned())
    }

    async fn set_subscription_status(
        &self,
        id: SubscriptionId,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        let mut state = self.state()?;
        Ok(state.subscriptions.get_mut(&id).map(|sub| {
            if sub.status != status {
                sub.status = status;
                sub.status_changed_at = Utc::now();
            }
            sub.clone()
        }))
    }

    async fn expire_if_active(&self, id: SubscriptionId) -> Result<bool> {
        let mut state = self.state()?;
        match state.subscriptions.get_mut(&id) {
            Some(sub) if sub.status.is_active() => {
                sub.status = SubscriptionStatus::Expired;
                sub.status_changed_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn active_subscriptions_for(&self, item_id: ItemId) -> Result<Vec<Subscription>> {
        Ok(self.state()?.active_for(item_id).cloned().collect())
    }

    async fn active_count_for(&self, item_id: ItemId) -> Result<usize> {
        Ok(self.state()?.active_for(item_id).count())
    }

    async fn items_with_active_subscriptions(&self) -> Result<Vec<Item>> {
        let state = self.state()?;
        Ok(state
            .items
            .values()
            .filter(|item| state.active_for(item.id).next().is_some())
            .cloned()
            .collect())
    }

    async fn subscriptions_for_email(&self, email: &str) -> Result<Vec<SubscriptionView>> {
        let state = self.state()?;
        let mut views: Vec<SubscriptionView> = state
            .subscriptions
            .values()
            .filter(|sub| sub.email.eq_ignore_ascii_case(email))
            .filter_map(|sub| {
                state
                    .items
                    .get(&sub.item_id)
                    .map(|item| SubscriptionView::from_parts(sub.clone(), item))
            })
            .collect();

        views.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reactivation_keeps_ids() {
        let store = InMemoryStore::new();
        let spec = ItemSpec::new("https://shop.example.com/p/1", "560001");

        let (item, sub) = store
            .register(&spec, &SubscriberSpec::new("a@example.com", "111"))
            .await
            .unwrap();
        store
            .set_subscription_status(sub.id, SubscriptionStatus::Expired)
            .await
            .unwrap();

        let (item2, sub2) = store
            .register(&spec, &SubscriberSpec::new("a@example.com", "222"))
            .await
            .unwrap();

        assert_eq!(item.id, item2.id);
        assert_eq!(sub.id, sub2.id);
        assert_eq!(sub2.status, SubscriptionStatus::Active);
        assert_eq!(sub2.phone_number, "222");
        assert!(sub2.status_changed_at >= sub.status_changed_at);
    }

    #[tokio::test]
    async fn test_active_reregistration_keeps_timestamp() {
        let store = InMemoryStore::new();
        let spec = ItemSpec::new("https://shop.example.com/p/1", "560001");

        let (_, sub) = store
            .register(&spec, &SubscriberSpec::new("a@example.com", "111"))
            .await
            .unwrap();
        let (_, again) = store
            .register(&spec, &SubscriberSpec::new("a@example.com", "333"))
            .await
            .unwrap();

        assert_eq!(again.status_changed_at, sub.status_changed_at);
        assert_eq!(again.phone_number, "333");
    }

    #[tokio::test]
    async fn test_subscription_requires_item() {
        let store = InMemoryStore::new();
        let result = store
            .upsert_subscription(7, &SubscriberSpec::new("a@example.com", "111"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryStore::new();
        store
            .register(
                &ItemSpec::new("https://shop.example.com/p/1", "560001"),
                &SubscriberSpec::new("Alice@Example.com", "111"),
            )
            .await
            .unwrap();

        let views = store.subscriptions_for_email("alice@example.COM").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].url, "https://shop.example.com/p/1");
        assert_eq!(views[0].interval_minutes, 5);
    }
}
