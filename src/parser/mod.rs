//! HTML parsing and snapshot extraction
//!
//! This module turns a fetched product page into the [`Snapshot`] consumed
//! by availability inference.
//!
//! [`Snapshot`]: crate::availability::Snapshot

pub mod sanitize;
pub mod selectors;
pub mod snapshot;

// Re-export main parser and public types
pub use selectors::ProductSelectors;
pub use snapshot::{ParsedPage, SnapshotParser};
