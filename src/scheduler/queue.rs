//! Bounded FIFO scheduler
//!
//! Caps how many checks run at once. Requests beyond the budget wait in an
//! unbounded FIFO queue and are admitted as running checks finish.
//!
//! ```text
//!   enqueue ──▶ [ q4 | q3 | q2 ] ──dispatch──▶ ┌─────────┐
//!                                              │ running │  active ≤ max_concurrent
//!                         ◀── finish ──────────┤ r1 r2 r3│
//!                                              └─────────┘
//! ```
//!
//! The queue mutex is a `std::sync::Mutex` and is never held across an
//! await.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::metrics;
use crate::models::ItemId;

/// A unit of work admitted by the scheduler
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct QueuedJob {
    item_id: ItemId,
    job: Job,
}

#[derive(Default)]
struct State {
    queue: VecDeque<QueuedJob>,
    active: usize,
}

struct Shared {
    state: Mutex<State>,
    max_concurrent: usize,
}

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStats {
    pub active: usize,
    pub queued: usize,
    pub max_concurrent: usize,
}

/// FIFO queue with a concurrency budget
#[derive(Clone)]
pub struct BoundedScheduler {
    shared: Arc<Shared>,
}

impl BoundedScheduler {
    /// Create a scheduler running at most `max_concurrent` jobs (minimum 1)
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                max_concurrent: max_concurrent.max(1),
            }),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent
    }

    // A panicking job never runs while the lock is held, so the state is
    // consistent even if the mutex is poisoned.
    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job and return its 1-based position among running and
    /// queued requests
    ///
    /// Must be called from within a Tokio runtime.
    pub fn enqueue<F>(&self, item_id: ItemId, job: F) -> usize
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let position = {
            let mut state = self.state();
            state.queue.push_back(QueuedJob {
                item_id,
                job: Box::pin(job),
            });
            state.active + state.queue.len()
        };

        if position > 1 {
            tracing::info!(item_id = %item_id, position, "Check queued");
        }

        self.dispatch();
        position
    }

    /// Admit queued jobs while the budget allows
    fn dispatch(&self) {
        loop {
            let next = {
                let mut state = self.state();
                if state.active >= self.shared.max_concurrent {
                    None
                } else {
                    let next = state.queue.pop_front();
                    if next.is_some() {
                        state.active += 1;
                    }
                    metrics::set_checks_in_flight(state.active);
                    metrics::set_queue_depth(state.queue.len());
                    next
                }
            };

            let Some(QueuedJob { item_id, job }) = next else {
                break;
            };

            let scheduler = self.clone();
            tokio::spawn(async move {
                // Run on its own task so a panic is observed here and the
                // slot is still released
                if let Err(e) = tokio::spawn(job).await {
                    tracing::error!(item_id = %item_id, error = %e, "Check task aborted");
                }
                scheduler.finish();
            });
        }
    }

    fn finish(&self) {
        {
            let mut state = self.state();
            state.active = state.active.saturating_sub(1);
        }
        self.dispatch();
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.state();
        SchedulerStats {
            active: state.active,
            queued: state.queue.len(),
            max_concurrent: self.shared.max_concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_positions_count_running_and_queued() {
        let scheduler = BoundedScheduler::new(1);
        let (tx, rx) = oneshot::channel::<()>();

        let first = scheduler.enqueue(1, async move {
            let _ = rx.await;
        });
        let second = scheduler.enqueue(2, async {});
        let third = scheduler.enqueue(3, async {});

        assert_eq!((first, second, third), (1, 2, 3));
        assert_eq!(
            scheduler.stats(),
            SchedulerStats {
                active: 1,
                queued: 2,
                max_concurrent: 1
            }
        );

        tx.send(()).unwrap();
        for _ in 0..100 {
            if scheduler.stats().active == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(scheduler.stats().active, 0);
        assert_eq!(scheduler.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_fifo_order_with_single_slot() {
        let scheduler = BoundedScheduler::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 1..=5 {
            let order = Arc::clone(&order);
            scheduler.enqueue(id, async move {
                tokio::time::sleep(Duration::from_millis(2)).await;
                order.lock().unwrap().push(id);
            });
        }

        for _ in 0..200 {
            if order.lock().unwrap().len() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_panicking_job_releases_slot() {
        let scheduler = BoundedScheduler::new(1);
        let ran = Arc::new(AtomicUsize::new(0));

        scheduler.enqueue(1, async {
            panic!("boom");
        });
        let counter = Arc::clone(&ran);
        scheduler.enqueue(2, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..200 {
            if ran.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_budget_is_clamped() {
        assert_eq!(BoundedScheduler::new(0).max_concurrent(), 1);
    }
}
