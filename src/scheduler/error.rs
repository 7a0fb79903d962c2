//! Error types for the monitoring engine

use std::fmt;

use crate::models::ItemId;
use crate::utils::error::RenderError;

/// Result type for a single check
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Reasons a check can end without a report
///
/// None of these are fatal to the process. A render or store failure leaves
/// the monitor armed for its next tick; a missing item stops the monitor.
#[derive(Debug)]
pub enum MonitorError {
    /// The renderer failed or timed out
    Render(RenderError),

    /// The item row vanished between scheduling and checking
    ItemMissing { item_id: ItemId },

    /// A store call failed
    Store(anyhow::Error),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(err) => write!(f, "Render failed: {}", err),
            Self::ItemMissing { item_id } => {
                write!(f, "Item {} no longer exists in the store", item_id)
            }
            Self::Store(err) => write!(f, "Store operation failed: {:#}", err),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(err) => Some(err),
            Self::ItemMissing { .. } => None,
            Self::Store(err) => Some(&**err),
        }
    }
}

impl From<RenderError> for MonitorError {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

impl From<anyhow::Error> for MonitorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

impl MonitorError {
    /// Create an item missing error
    pub fn item_missing(item_id: ItemId) -> Self {
        Self::ItemMissing { item_id }
    }

    /// Whether the monitor should stay armed after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::ItemMissing { .. })
    }

    /// Short label used for metrics and events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Render(RenderError::Timeout(_)) => "render_timeout",
            Self::Render(_) => "render_error",
            Self::ItemMissing { .. } => "item_missing",
            Self::Store(_) => "store_error",
        }
    }
}
