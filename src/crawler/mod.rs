//! Page rendering
//!
//! The monitoring engine never talks to the network directly. It asks a
//! [`Renderer`] for a [`Snapshot`] of a product page as seen from a given
//! location, and the default [`HttpRenderer`] fetches the page and extracts
//! the snapshot from its HTML.

pub mod fetcher;

use async_trait::async_trait;

use crate::availability::Snapshot;
pub use crate::utils::error::RenderError;
pub use fetcher::HttpRenderer;

/// Produces a snapshot of a product page
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `url` with the location filter applied
    async fn render(&self, url: &str, location_filter: &str) -> Result<Snapshot, RenderError>;
}
