//! Monitor registry
//!
//! Owns one monitor per item that has active subscriptions. A monitor is a
//! repeating timer plus bookkeeping; every tick goes through
//! [`MonitorRegistry::request_check`], which drops the tick when a check for
//! that item is already queued or running.
//!
//! ```text
//!  timer tick ─┐
//!  start ──────┼─▶ request_check ─▶ BoundedScheduler ─▶ CheckExecutor
//!  manual ─────┘        │                                     │
//!                  in_flight += item                          ▼
//!                                   complete: in_flight -= item, record status,
//!                                             stop when nothing is left to watch
//! ```
//!
//! Outstanding checks are tracked per item, not per monitor. A monitor
//! stopped mid-check leaves its check running; a monitor restarted for the
//! same item waits for that check and then runs its own first check.
//!
//! Each monitor carries a generation number, so the result of a check that
//! belongs to an earlier monitor of the item is not recorded.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::{MonitorError, MonitorResult};
use super::events::{MonitorEvent, StopReason, EVENT_CHANNEL_CAPACITY};
use super::executor::{CheckExecutor, CheckReport};
use super::queue::{BoundedScheduler, SchedulerStats};
use crate::availability::StockStatus;
use crate::metrics;
use crate::models::{Item, ItemId, DEFAULT_INTERVAL_MINUTES};

/// Registry settings
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Checks allowed to run at once
    pub max_concurrent: usize,
    /// Interval used for items with a non-positive interval
    pub default_interval_minutes: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

struct Monitor {
    item: Item,
    period: Duration,
    timer: JoinHandle<()>,
    last_status: Option<StockStatus>,
    last_checked_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl Monitor {
    fn info(&self, checking: bool) -> MonitorInfo {
        MonitorInfo {
            item_id: self.item.id,
            url: self.item.url.clone(),
            location_filter: self.item.location_filter.clone(),
            interval_minutes: (self.period.as_secs() / 60) as i64,
            checking,
            last_status: self.last_status,
            last_checked_at: self.last_checked_at,
        }
    }
}

/// Snapshot of one monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    pub item_id: ItemId,
    pub url: String,
    pub location_filter: String,
    /// Effective interval after defaulting
    pub interval_minutes: i64,
    /// A check for the item is queued or running
    pub checking: bool,
    pub last_status: Option<StockStatus>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Live monitors and the items with a check outstanding
#[derive(Default)]
struct MonitorTable {
    monitors: HashMap<ItemId, Monitor>,
    in_flight: HashSet<ItemId>,
}

impl MonitorTable {
    fn info(&self, item_id: ItemId) -> Option<MonitorInfo> {
        self.monitors
            .get(&item_id)
            .map(|monitor| monitor.info(self.in_flight.contains(&item_id)))
    }

    fn is_current(&self, item_id: ItemId, generation: u64) -> bool {
        self.monitors
            .get(&item_id)
            .is_some_and(|monitor| monitor.generation == generation)
    }
}

struct Inner {
    monitors: Mutex<MonitorTable>,
    scheduler: BoundedScheduler,
    executor: CheckExecutor,
    events: broadcast::Sender<MonitorEvent>,
    default_interval_minutes: i64,
    next_generation: AtomicU64,
}

/// Registry of live monitors
///
/// Cheap to clone; clones share the same monitors.
#[derive(Clone)]
pub struct MonitorRegistry {
    inner: Arc<Inner>,
}

impl MonitorRegistry {
    /// Create a registry around an executor
    ///
    /// `events` should be the sender the executor publishes to, so that
    /// subscribers see lifecycle and status events on one channel.
    pub fn new(
        config: RegistryConfig,
        executor: CheckExecutor,
        events: broadcast::Sender<MonitorEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                monitors: Mutex::new(MonitorTable::default()),
                scheduler: BoundedScheduler::new(config.max_concurrent),
                executor,
                events,
                default_interval_minutes: config.default_interval_minutes,
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Create an event channel for a registry and its executor
    pub fn event_channel() -> broadcast::Sender<MonitorEvent> {
        broadcast::channel(EVENT_CHANNEL_CAPACITY).0
    }

    /// Subscribe to monitor events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    /// Start monitoring an item
    ///
    /// Returns the existing monitor unchanged when one is already running.
    /// A new monitor requests its first check immediately, or as soon as a
    /// check left behind by an earlier monitor of the item completes.
    pub async fn start_monitor(&self, item: Item) -> MonitorInfo {
        let mut table = self.inner.monitors.lock().await;

        if let Some(existing) = table.info(item.id) {
            tracing::debug!(item_id = %item.id, "Monitor already running");
            return existing;
        }

        let item_id = item.id;
        let period = item.interval(self.inner.default_interval_minutes);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = spawn_timer(Arc::downgrade(&self.inner), item_id, period);

        tracing::info!(
            item_id = %item_id,
            url = %item.url,
            location_filter = %item.location_filter,
            interval_secs = period.as_secs(),
            "Monitor started"
        );

        let monitor = Monitor {
            item,
            period,
            timer,
            last_status: None,
            last_checked_at: None,
            generation,
        };
        // Either this check is admitted or an earlier one is still out
        let info = monitor.info(true);

        table.monitors.insert(item_id, monitor);
        metrics::set_active_monitors(table.monitors.len());

        // The first check cannot run before this returns: it needs the
        // table lock held here
        if !self.inner.admit(&mut table, item_id) {
            tracing::debug!(item_id = %item_id, "First check deferred until the previous one completes");
        }

        let _ = self.inner.events.send(MonitorEvent::MonitorStarted {
            item_id,
            interval_minutes: info.interval_minutes,
        });

        info
    }

    /// Stop monitoring an item; no-op when it is not monitored
    ///
    /// A check already running for the item is left to finish.
    pub async fn stop_monitor(&self, item_id: ItemId, reason: StopReason) -> bool {
        let mut table = self.inner.monitors.lock().await;
        self.inner.remove(&mut table, item_id, reason)
    }

    /// Stop the item's monitor if it has no active subscriptions left
    ///
    /// The count is read while the registry lock is held, so a registration
    /// racing with this call either keeps the monitor or restarts it.
    pub async fn stop_if_unwatched(&self, item_id: ItemId) -> MonitorResult<bool> {
        let mut table = self.inner.monitors.lock().await;
        if !table.monitors.contains_key(&item_id) {
            return Ok(false);
        }

        let active = self.inner.executor.store().active_count_for(item_id).await?;
        if active > 0 {
            return Ok(false);
        }

        Ok(self
            .inner
            .remove(&mut table, item_id, StopReason::NoActiveSubscriptions))
    }

    /// Request a check for an item
    ///
    /// Returns `false` when the item is not monitored or a check is already
    /// outstanding.
    pub async fn request_check(&self, item_id: ItemId) -> bool {
        let mut table = self.inner.monitors.lock().await;
        self.inner.admit(&mut table, item_id)
    }

    /// Stop every monitor
    pub async fn shutdown(&self) {
        let mut table = self.inner.monitors.lock().await;
        let ids: Vec<ItemId> = table.monitors.keys().copied().collect();
        for item_id in &ids {
            self.inner.remove(&mut table, *item_id, StopReason::Shutdown);
        }
        tracing::info!(stopped = ids.len(), "All monitors stopped");
    }

    /// Listing of all monitors ordered by item id
    pub async fn monitors(&self) -> Vec<MonitorInfo> {
        let table = self.inner.monitors.lock().await;
        let mut infos: Vec<MonitorInfo> = table
            .monitors
            .keys()
            .filter_map(|item_id| table.info(*item_id))
            .collect();
        infos.sort_by_key(|info| info.item_id);
        infos
    }

    pub async fn monitor(&self, item_id: ItemId) -> Option<MonitorInfo> {
        self.inner.monitors.lock().await.info(item_id)
    }

    pub async fn is_monitoring(&self, item_id: ItemId) -> bool {
        self.inner
            .monitors
            .lock()
            .await
            .monitors
            .contains_key(&item_id)
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.inner.scheduler.stats()
    }
}

impl Inner {
    /// Single admission point for checks
    fn admit(self: &Arc<Self>, table: &mut MonitorTable, item_id: ItemId) -> bool {
        let Some(monitor) = table.monitors.get(&item_id) else {
            tracing::debug!(item_id = %item_id, "No monitor for item, ignoring check request");
            return false;
        };

        if table.in_flight.contains(&item_id) {
            tracing::debug!(item_id = %item_id, "Check already outstanding, dropping tick");
            return false;
        }

        let generation = monitor.generation;
        table.in_flight.insert(item_id);

        let inner = Arc::clone(self);
        self.scheduler.enqueue(item_id, async move {
            inner.run_check(item_id, generation).await;
        });
        true
    }

    async fn run_check(self: Arc<Self>, item_id: ItemId, generation: u64) {
        let previous = {
            let mut table = self.monitors.lock().await;
            if !table.is_current(item_id, generation) {
                tracing::debug!(item_id = %item_id, "Monitor gone, skipping stale check");
                self.release_stale(&mut table, item_id);
                return;
            }
            table
                .monitors
                .get(&item_id)
                .and_then(|monitor| monitor.last_status)
        };

        tracing::info!(item_id = %item_id, "Checking stock");
        let outcome = {
            let _timer = metrics::start_check_timer();
            self.executor.run(item_id, previous).await
        };
        self.complete(item_id, generation, outcome).await;
    }

    /// Clear a check whose monitor is gone, then give a restarted monitor
    /// of the item the first check it had to wait for
    fn release_stale(self: &Arc<Self>, table: &mut MonitorTable, item_id: ItemId) {
        table.in_flight.remove(&item_id);
        if table.monitors.contains_key(&item_id) {
            tracing::debug!(item_id = %item_id, "Running deferred first check");
            self.admit(table, item_id);
        }
    }

    /// Record a finished check and decide whether the monitor survives
    async fn complete(
        self: &Arc<Self>,
        item_id: ItemId,
        generation: u64,
        outcome: MonitorResult<CheckReport>,
    ) {
        let mut table = self.monitors.lock().await;

        if !table.is_current(item_id, generation) {
            tracing::debug!(item_id = %item_id, "Monitor stopped while checking");
            self.release_stale(&mut table, item_id);
            return;
        }
        table.in_flight.remove(&item_id);

        let Some(monitor) = table.monitors.get_mut(&item_id) else {
            return;
        };
        monitor.last_checked_at = Some(Utc::now());

        let stop = match outcome {
            Ok(report) => {
                monitor.last_status = Some(report.result.status);
                metrics::record_check(report.result.status.as_str());
                tracing::info!(
                    item_id = %item_id,
                    status = %report.result.status,
                    notified = report.notified,
                    failed = report.failed,
                    remaining_active = report.remaining_active,
                    "Check complete"
                );

                if report.remaining_active == 0 {
                    self.confirm_nothing_left(item_id, &report).await
                } else {
                    None
                }
            }
            Err(MonitorError::ItemMissing { .. }) => {
                metrics::record_check("item_missing");
                tracing::warn!(item_id = %item_id, "Item no longer exists, stopping monitor");
                Some(StopReason::ItemMissing)
            }
            Err(e) => {
                metrics::record_check(e.kind());
                tracing::warn!(
                    item_id = %item_id,
                    kind = e.kind(),
                    error = %e,
                    "Check failed, will retry on next tick"
                );
                let _ = self.events.send(MonitorEvent::CheckFailed {
                    item_id,
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                });
                None
            }
        };

        if let Some(reason) = stop {
            self.remove(&mut table, item_id, reason);
        }
    }

    /// Re-read the active count while the registry lock is held, so a
    /// registration that committed during the check keeps the monitor alive
    async fn confirm_nothing_left(&self, item_id: ItemId, report: &CheckReport) -> Option<StopReason> {
        match self.executor.store().active_count_for(item_id).await {
            Ok(0) if report.result.is_available => Some(StopReason::Fulfilled),
            Ok(0) => Some(StopReason::NoActiveSubscriptions),
            Ok(count) => {
                tracing::debug!(item_id = %item_id, count, "Subscriptions arrived during check");
                None
            }
            Err(e) => {
                tracing::warn!(item_id = %item_id, error = %e, "Could not re-check active subscriptions");
                None
            }
        }
    }

    fn remove(&self, table: &mut MonitorTable, item_id: ItemId, reason: StopReason) -> bool {
        let Some(monitor) = table.monitors.remove(&item_id) else {
            return false;
        };

        monitor.timer.abort();
        metrics::set_active_monitors(table.monitors.len());
        tracing::info!(item_id = %item_id, reason = %reason, "Monitor stopped");
        let _ = self
            .events
            .send(MonitorEvent::MonitorStopped { item_id, reason });
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for monitor in self.monitors.get_mut().monitors.values() {
            monitor.timer.abort();
        }
    }
}

fn spawn_timer(inner: Weak<Inner>, item_id: ItemId, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let mut table = inner.monitors.lock().await;
            inner.admit(&mut table, item_id);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::Snapshot;
    use crate::crawler::Renderer;
    use crate::models::{ItemSpec, SubscriberSpec, SubscriptionStatus};
    use crate::notifications::Notifier;
    use crate::storage::{InMemoryStore, SubscriptionStore};
    use crate::utils::error::{NotificationError, RenderError};
    use async_trait::async_trait;

    /// Renderer whose checks never finish
    struct StalledRenderer;

    #[async_trait]
    impl Renderer for StalledRenderer {
        async fn render(&self, _url: &str, _location: &str) -> Result<Snapshot, RenderError> {
            std::future::pending().await
        }
    }

    struct NullNotifier;

    #[async_trait]
    impl Notifier for NullNotifier {
        async fn send(&self, _phone: &str, _message: &str) -> Result<(), NotificationError> {
            Ok(())
        }
    }

    async fn setup() -> (MonitorRegistry, Arc<InMemoryStore>, Item, i64) {
        let store = Arc::new(InMemoryStore::new());
        let (item, subscription) = store
            .register(
                &ItemSpec::new("https://shop.example.com/p/1", "560001").with_interval(30),
                &SubscriberSpec::new("a@example.com", "111"),
            )
            .await
            .unwrap();

        let events = MonitorRegistry::event_channel();
        let executor = CheckExecutor::new(
            Arc::clone(&store) as Arc<dyn SubscriptionStore>,
            Arc::new(StalledRenderer),
            Arc::new(NullNotifier),
            Duration::from_secs(60),
            events.clone(),
        );
        let registry = MonitorRegistry::new(RegistryConfig::default(), executor, events);

        (registry, store, item, subscription.id)
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_removes() {
        let (registry, _store, item, _) = setup().await;
        let mut events = registry.subscribe();

        let first = registry.start_monitor(item.clone()).await;
        let second = registry.start_monitor(item.clone()).await;
        assert_eq!(first.item_id, second.item_id);
        assert_eq!(first.interval_minutes, 30);
        assert_eq!(registry.monitors().await.len(), 1);

        assert!(matches!(
            events.try_recv(),
            Ok(MonitorEvent::MonitorStarted { interval_minutes: 30, .. })
        ));
        assert!(events.try_recv().is_err());

        assert!(registry.stop_monitor(item.id, StopReason::Shutdown).await);
        assert!(!registry.stop_monitor(item.id, StopReason::Shutdown).await);
        assert!(!registry.is_monitoring(item.id).await);
    }

    #[tokio::test]
    async fn test_request_check_is_single_flight() {
        let (registry, _store, item, _) = setup().await;

        // Starting admits the first check, which never completes
        let info = registry.start_monitor(item.clone()).await;
        assert!(info.checking);

        assert!(!registry.request_check(item.id).await);
        assert!(!registry.request_check(item.id + 100).await);
        assert_eq!(registry.scheduler_stats().active, 1);
        assert_eq!(registry.scheduler_stats().queued, 0);

        registry.shutdown().await;
        assert!(registry.monitors().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_if_unwatched_rechecks_store() {
        let (registry, store, item, subscription_id) = setup().await;
        registry.start_monitor(item.clone()).await;

        assert!(!registry.stop_if_unwatched(item.id).await.unwrap());
        assert!(registry.is_monitoring(item.id).await);

        store
            .set_subscription_status(subscription_id, SubscriptionStatus::Deleted)
            .await
            .unwrap();

        assert!(registry.stop_if_unwatched(item.id).await.unwrap());
        assert!(!registry.is_monitoring(item.id).await);
        assert!(!registry.stop_if_unwatched(item.id).await.unwrap());
    }
}
