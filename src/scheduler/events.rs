//! Monitor lifecycle events
//!
//! Broadcast to any number of listeners (telemetry, tests). Sending never
//! blocks and events are dropped when nobody listens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::StockStatus;
use crate::models::ItemId;

/// Default capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the monitoring engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A monitor was created for an item
    MonitorStarted {
        item_id: ItemId,
        interval_minutes: i64,
    },

    /// A monitor was destroyed
    MonitorStopped { item_id: ItemId, reason: StopReason },

    /// A check observed a different status than the previous one
    StatusChanged {
        item_id: ItemId,
        from: Option<StockStatus>,
        to: StockStatus,
        at: DateTime<Utc>,
    },

    /// A check failed and will be retried on the next tick
    CheckFailed {
        item_id: ItemId,
        kind: String,
        message: String,
    },
}

impl MonitorEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::MonitorStarted { item_id, .. }
            | Self::MonitorStopped { item_id, .. }
            | Self::StatusChanged { item_id, .. }
            | Self::CheckFailed { item_id, .. } => *item_id,
        }
    }
}

/// Why a monitor was stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Item was found in stock and every subscriber was notified
    Fulfilled,
    /// No active subscriptions remain
    NoActiveSubscriptions,
    /// Item no longer exists in the store
    ItemMissing,
    /// Process shutdown
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::NoActiveSubscriptions => "no_active_subscriptions",
            Self::ItemMissing => "item_missing",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = MonitorEvent::MonitorStopped {
            item_id: 3,
            reason: StopReason::Fulfilled,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "monitor_stopped");
        assert_eq!(json["reason"], "fulfilled");
        assert_eq!(event.item_id(), 3);
    }
}
