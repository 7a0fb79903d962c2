//! Availability inference over rendered page snapshots
//!
//! A product page is reduced by the renderer to a [`Snapshot`]: the state
//! of the primary purchase control plus lowercased text from the product
//! section and from the whole page. [`infer`] walks an ordered list of
//! tiers (see [`tiers`]) and takes the first definite answer.
//!
//! # Tiers
//!
//! ```text
//! ┌──────────────────┐  visible control?   ┌──────────────┐
//! │ primary control  │────────────────────▶│   decided    │
//! └────────┬─────────┘                     └──────────────┘
//!          │ no opinion                           ▲
//!          ▼                                      │ exactly one side
//! ┌──────────────────┐────────────────────────────┤
//! │  section text    │                            │
//! └────────┬─────────┘                            │
//!          │ both or neither                      │
//!          ▼                                      │
//! ┌──────────────────┐────────────────────────────┘
//! │    body text     │
//! └────────┬─────────┘
//!          ▼
//!       UNKNOWN
//! ```

pub mod tiers;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use tiers::{Tier, TIERS};

/// Inferred stock status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "IN_STOCK",
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::InStock => "IN STOCK",
            Self::OutOfStock => "OUT OF STOCK",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn is_available(&self) -> bool {
        *self == Self::InStock
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub is_available: bool,
    pub status: StockStatus,
}

impl CheckResult {
    pub fn from_status(status: StockStatus) -> Self {
        Self {
            is_available: status.is_available(),
            status,
        }
    }

    pub fn unknown() -> Self {
        Self::from_status(StockStatus::Unknown)
    }
}

/// State of the main purchase control ("add to cart")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimaryControl {
    pub visible: bool,
    pub disabled: bool,
}

/// Renderer-produced abstraction of a product page
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub primary_control: Option<PrimaryControl>,
    pub section_text: String,
    pub body_text: String,
    pub notify_buttons_count: usize,
    pub sold_out_badges_count: usize,
}

impl Snapshot {
    pub fn with_primary_control(mut self, visible: bool, disabled: bool) -> Self {
        self.primary_control = Some(PrimaryControl { visible, disabled });
        self
    }

    pub fn with_section_text(mut self, text: impl Into<String>) -> Self {
        self.section_text = text.into();
        self
    }

    pub fn with_body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    pub fn with_notify_buttons(mut self, count: usize) -> Self {
        self.notify_buttons_count = count;
        self
    }

    pub fn with_sold_out_badges(mut self, count: usize) -> Self {
        self.sold_out_badges_count = count;
        self
    }
}

/// Infer the availability of a snapshot
pub fn infer(snapshot: &Snapshot) -> CheckResult {
    infer_with_tier(snapshot).0
}

/// Infer availability and report which tier decided, if any
pub fn infer_with_tier(snapshot: &Snapshot) -> (CheckResult, Option<&'static str>) {
    TIERS
        .iter()
        .find_map(|tier| (tier.decide)(snapshot).map(|status| (status, tier.name)))
        .map(|(status, name)| (CheckResult::from_status(status), Some(name)))
        .unwrap_or((CheckResult::unknown(), None))
}
