//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use stockwatch::availability::Snapshot;
use stockwatch::crawler::{RenderError, Renderer};
use stockwatch::notifications::{NotificationError, Notifier};
use stockwatch::service::{EngineOptions, StockService};
use stockwatch::storage::{InMemoryStore, SubscriptionStore};
use stockwatch::{ItemSpec, SubscriberSpec};

/// Product URL used by most tests
pub fn product_url(n: usize) -> String {
    format!("https://shop.example.com/products/{n}")
}

/// Registration input for product `n` with an hour-long interval, so timer
/// ticks never interfere with a test
pub fn item_spec(n: usize) -> ItemSpec {
    ItemSpec::new(product_url(n), "560001").with_interval(60)
}

pub fn subscriber(n: usize) -> SubscriberSpec {
    SubscriberSpec::new(format!("user{n}@example.com"), format!("+1555000{n:04}"))
}

/// Snapshot of a page with an enabled add-to-cart button
pub fn in_stock() -> Snapshot {
    Snapshot::default().with_primary_control(true, false)
}

/// Snapshot of a page with a disabled add-to-cart button
pub fn out_of_stock() -> Snapshot {
    Snapshot::default().with_primary_control(true, true)
}

// ============================================================================
// Scripted renderer
// ============================================================================

/// Renderer returning queued results per URL, then a fallback snapshot
///
/// Tracks how many renders overlap so tests can assert the concurrency
/// budget.
pub struct ScriptedRenderer {
    fallback: Mutex<Snapshot>,
    script: Mutex<HashMap<String, VecDeque<Result<Snapshot, RenderError>>>>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedRenderer {
    pub fn new(fallback: Snapshot) -> Self {
        Self {
            fallback: Mutex::new(fallback),
            script: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a result for the next render of `url`
    pub fn push(&self, url: &str, result: Result<Snapshot, RenderError>) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(result);
    }

    /// Replace the snapshot returned once the script runs out
    pub fn set_fallback(&self, snapshot: Snapshot) {
        *self.fallback.lock().unwrap() = snapshot;
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, url: &str, _location_filter: &str) -> Result<Snapshot, RenderError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .script
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        let result = scripted.unwrap_or_else(|| Ok(self.fallback.lock().unwrap().clone()));

        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

/// Notifier that records every message and fails for chosen numbers
///
/// Stock alerts can be held at the gate to simulate a slow gateway.
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    alerts_open: watch::Sender<bool>,
    held: AtomicUsize,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            alerts_open: watch::channel(true).0,
            held: AtomicUsize::new(0),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block stock alerts until [`release_alerts`](Self::release_alerts)
    pub fn hold_alerts(&self) {
        self.alerts_open.send_replace(false);
    }

    pub fn release_alerts(&self) {
        self.alerts_open.send_replace(true);
    }

    /// Stock alerts currently waiting at the gate
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    /// Make every delivery to `phone_number` fail
    pub fn fail_for(&self, phone_number: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(phone_number.to_string());
    }

    /// Numbers that received a stock alert, in delivery order
    pub fn alerted(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains("Stock Available"))
            .map(|(phone, _)| phone.clone())
            .collect()
    }

    /// Numbers that received a subscription confirmation
    pub fn confirmed(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, message)| message.contains("Subscription active"))
            .map(|(phone, _)| phone.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone_number: &str, message: &str) -> Result<(), NotificationError> {
        if message.contains("Stock Available") {
            let mut open = self.alerts_open.subscribe();
            if !*open.borrow() {
                self.held.fetch_add(1, Ordering::SeqCst);
                let _ = open.wait_for(|is_open| *is_open).await;
                self.held.fetch_sub(1, Ordering::SeqCst);
            }
        }

        if self.failing.lock().unwrap().contains(phone_number) {
            return Err(NotificationError::Rejected {
                status: 500,
                body: "gateway unavailable".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap()
            .push((phone_number.to_string(), message.to_string()));
        Ok(())
    }
}

// ============================================================================
// Engine harness
// ============================================================================

/// A service wired to test doubles
pub struct Harness {
    pub service: StockService,
    pub store: Arc<InMemoryStore>,
    pub renderer: Arc<ScriptedRenderer>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(renderer: ScriptedRenderer, max_concurrent: usize) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), renderer, max_concurrent)
    }

    pub fn with_store(
        store: Arc<InMemoryStore>,
        renderer: ScriptedRenderer,
        max_concurrent: usize,
    ) -> Self {
        Self::with_options(store, renderer, Self::options(max_concurrent))
    }

    /// Engine options used by the other constructors
    pub fn options(max_concurrent: usize) -> EngineOptions {
        let mut options = EngineOptions::default();
        options.registry.max_concurrent = max_concurrent;
        options.render_timeout = Duration::from_secs(5);
        options
    }

    pub fn with_options(
        store: Arc<InMemoryStore>,
        renderer: ScriptedRenderer,
        options: EngineOptions,
    ) -> Self {
        let renderer = Arc::new(renderer);
        let notifier = Arc::new(RecordingNotifier::new());

        let service = StockService::new(
            Arc::clone(&store) as Arc<dyn SubscriptionStore>,
            Arc::clone(&renderer) as Arc<dyn Renderer>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            options,
        );

        Self {
            service,
            store,
            renderer,
            notifier,
        }
    }
}

/// Poll `condition` until it holds or five seconds pass
pub async fn wait_for<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait until the item's monitor has no check outstanding
pub async fn wait_idle(service: &StockService, item_id: i64) -> bool {
    wait_for(move || async move {
        match service.registry().monitor(item_id).await {
            Some(info) => !info.checking,
            None => true,
        }
    })
    .await
}
