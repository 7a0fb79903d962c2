//! Unified error handling for the stockwatch crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`ErrorKind`] - Common interface implemented by the unified error
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use stockwatch::error::{Error, ErrorCategory, ErrorKind};
//!
//! fn handle_error(err: Error) {
//!     if err.category() == ErrorCategory::Validation {
//!         println!("Bad request: {}", err);
//!     } else if err.is_recoverable() {
//!         println!("Try again later: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::scheduler::error::MonitorError;
pub use crate::service::ValidationError;
pub use crate::utils::error::{NotificationError, RenderError};

/// Common interface for classifying errors
pub trait ErrorKind: std::error::Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, rate limit)
    Network,
    /// Parsing and data extraction errors
    Parsing,
    /// Storage and I/O errors
    Storage,
    /// Message delivery errors
    Notification,
    /// Configuration errors
    Config,
    /// Rejected input
    Validation,
    /// Monitoring engine errors
    Scheduler,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Storage => "storage",
            Self::Notification => "notification",
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Scheduler => "scheduler",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for the stockwatch crate
#[derive(Error, Debug)]
pub enum Error {
    /// Page rendering errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Check errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// Invalid registration input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Store errors carrying context
    #[error("Store error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ErrorKind for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Render(e) => e.is_recoverable(),
            Self::Notification(e) => matches!(e, NotificationError::Http(_)),
            Self::Monitor(e) => e.is_recoverable(),
            Self::Validation(_) => false,
            Self::Database(_) => false,
            Self::Store(_) => true,
            Self::Io(_) => true, // I/O errors are often transient
            Self::Json(_) => false,
            Self::Http(_) => true, // HTTP errors are often transient
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Render(RenderError::Extraction(_)) => ErrorCategory::Parsing,
            Self::Render(_) | Self::Http(_) => ErrorCategory::Network,
            Self::Notification(NotificationError::InvalidConfig(_)) => ErrorCategory::Config,
            Self::Notification(_) => ErrorCategory::Notification,
            Self::Monitor(MonitorError::Render(_)) => ErrorCategory::Network,
            Self::Monitor(MonitorError::Store(_)) => ErrorCategory::Storage,
            Self::Monitor(MonitorError::ItemMissing { .. }) => ErrorCategory::Scheduler,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Database(_) | Self::Store(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Store operations report anyhow errors with context
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
