//! stockwatch - Product restock monitor
//!
//! Watches product pages for a location-specific stock status and alerts
//! subscribers by SMS the first time the product becomes available.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Page rendering with rate limiting
//! - [`parser`] - HTML parsing and snapshot extraction
//! - [`availability`] - Stock status inference from a snapshot
//! - [`scheduler`] - Monitor registry, bounded check scheduler and executor
//! - [`notifications`] - Outbound SMS gateway
//! - [`storage`] - Item and subscription persistence (SQLite, in-memory)
//! - [`service`] - Subscription surface used by the API
//! - [`models`] - Core data structures and types
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockwatch::config::Config;
//! use stockwatch::crawler::HttpRenderer;
//! use stockwatch::notifications::WebhookNotifier;
//! use stockwatch::service::{EngineOptions, StockService};
//! use stockwatch::storage::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let store = Arc::new(SqliteStore::new(&config.database.sqlite_path)?);
//!     let renderer = Arc::new(HttpRenderer::new(&config.renderer)?);
//!     let notifier = Arc::new(WebhookNotifier::new(config.webhook())?);
//!
//!     let service = StockService::new(store, renderer, notifier, EngineOptions::default());
//!     service.bootstrap().await?;
//!     Ok(())
//! }
//! ```

pub mod availability;
pub mod config;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod parser;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::availability::{CheckResult, Snapshot, StockStatus};
    pub use crate::config::Config;
    pub use crate::crawler::{HttpRenderer, Renderer};
    pub use crate::error::{Error, ErrorCategory, ErrorKind, Result};
    pub use crate::models::{Item, ItemSpec, SubscriberSpec, Subscription, SubscriptionStatus};
    pub use crate::notifications::{Notifier, WebhookNotifier};
    pub use crate::scheduler::{MonitorEvent, MonitorRegistry};
    pub use crate::service::{EngineOptions, StockService};
    pub use crate::storage::{InMemoryStore, SqliteStore, SubscriptionStore};
}

// Direct re-exports for convenience
pub use availability::{CheckResult, Snapshot, StockStatus};
pub use models::{Item, ItemSpec, SubscriberSpec, Subscription, SubscriptionStatus};
pub use service::{EngineOptions, StockService};
