//! Core data structures shared by the store, the engine and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database identifier of an item
pub type ItemId = i64;

/// Database identifier of a subscription
pub type SubscriptionId = i64;

/// Default check interval when a registration does not name one
pub const DEFAULT_INTERVAL_MINUTES: i64 = 5;

// ============================================================================
// Item
// ============================================================================

/// A monitored (url, location filter, interval) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub url: String,
    pub location_filter: String,
    pub interval_minutes: i64,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Check period, falling back to `default_minutes` for non-positive intervals
    pub fn interval(&self, default_minutes: i64) -> std::time::Duration {
        let minutes = if self.interval_minutes > 0 {
            self.interval_minutes
        } else if default_minutes > 0 {
            default_minutes
        } else {
            DEFAULT_INTERVAL_MINUTES
        };
        std::time::Duration::from_secs(minutes as u64 * 60)
    }
}

/// Item half of a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub url: String,
    pub location_filter: String,
    #[serde(default)]
    pub interval_minutes: Option<i64>,
}

impl ItemSpec {
    pub fn new(url: impl Into<String>, location_filter: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            location_filter: location_filter.into(),
            interval_minutes: None,
        }
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.interval_minutes = Some(minutes);
        self
    }

    /// Interval to persist; missing or non-positive values use the default
    pub fn effective_interval(&self) -> i64 {
        match self.interval_minutes {
            Some(minutes) if minutes > 0 => minutes,
            _ => DEFAULT_INTERVAL_MINUTES,
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Lifecycle status of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Waiting for the item to come back in stock
    Active,
    /// Notified successfully; interest fulfilled
    Expired,
    /// Removed by the subscriber
    Deleted,
}

impl SubscriptionStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Deleted => "deleted",
        }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown subscription status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown subscription status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for SubscriptionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "deleted" => Ok(Self::Deleted),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// One subscriber's interest in an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub item_id: ItemId,
    pub email: String,
    pub phone_number: String,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
}

/// Subscriber half of a registration request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberSpec {
    pub email: String,
    pub phone_number: String,
}

impl SubscriberSpec {
    pub fn new(email: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            phone_number: phone_number.into(),
        }
    }
}

/// A subscription joined with the item it watches, newest first in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: SubscriptionId,
    pub item_id: ItemId,
    pub email: String,
    pub phone_number: String,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
    pub url: String,
    pub location_filter: String,
    pub interval_minutes: i64,
}

impl SubscriptionView {
    pub fn from_parts(subscription: Subscription, item: &Item) -> Self {
        Self {
            id: subscription.id,
            item_id: subscription.item_id,
            email: subscription.email,
            phone_number: subscription.phone_number,
            status: subscription.status,
            created_at: subscription.created_at,
            status_changed_at: subscription.status_changed_at,
            url: item.url.clone(),
            location_filter: item.location_filter.clone(),
            interval_minutes: item.interval_minutes,
        }
    }
}

// ============================================================================
// Service results
// ============================================================================

/// Result of a registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub item_id: ItemId,
    pub subscription_id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub status_changed_at: DateTime<Utc>,
}

/// Result of an unsubscribe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsubscribed {
    /// True only when this call moved the subscription to `deleted`
    pub removed: bool,
    /// Current status, `None` when the subscription does not exist
    pub status: Option<SubscriptionStatus>,
    pub status_changed_at: Option<DateTime<Utc>>,
}

impl Unsubscribed {
    pub fn not_found() -> Self {
        Self {
            removed: false,
            status: None,
            status_changed_at: None,
        }
    }
}
