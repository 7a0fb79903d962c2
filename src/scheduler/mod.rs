//! Monitoring engine
//!
//! This module keeps one monitor per item with active subscriptions and
//! runs their checks under a global concurrency budget.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      MonitorRegistry                         │
//! │   item ─▶ Monitor { timer, checking, last_status, gen }      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ request_check
//!                         ┌──────▼──────┐
//!                         │  Bounded    │  FIFO, ≤ max_concurrent
//!                         │  Scheduler  │
//!                         └──────┬──────┘
//!                                │
//!                         ┌──────▼──────┐     ┌──────────┐
//!                         │   Check     │ ──▶ │ Renderer │
//!                         │  Executor   │ ──▶ │ Notifier │
//!                         └──────┬──────┘ ──▶ │  Store   │
//!                                │            └──────────┘
//!                                ▼
//!                       MonitorEvent broadcast
//! ```
//!
//! # Modules
//!
//! - [`registry`] - Monitor lifecycle and tick admission
//! - [`queue`] - Concurrency-bounded FIFO scheduler
//! - [`executor`] - A single check: render, infer, notify
//! - [`events`] - Lifecycle and status events
//! - [`error`] - Check errors
//!
//! # Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | One outstanding check per item | `checking` flag set on admission |
//! | At most `max_concurrent` checks | scheduler counter |
//! | FIFO admission | `VecDeque` queue |
//! | Subscriber isolation | per-subscriber error handling in the executor |

pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod registry;

// Re-export main types
pub use error::{MonitorError, MonitorResult};
pub use events::{MonitorEvent, StopReason};
pub use executor::{CheckExecutor, CheckReport};
pub use queue::{BoundedScheduler, SchedulerStats};
pub use registry::{MonitorInfo, MonitorRegistry, RegistryConfig};
