//! Error types for the external collaborators
//!
//! This module defines the errors raised by the page renderer and the
//! notification transport.

use thiserror::Error;

/// Errors that can occur while rendering a product page into a snapshot
#[derive(Error, Debug)]
pub enum RenderError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Page answered with a non-success status code
    #[error("Page returned status {0}")]
    Status(u16),

    /// Render did not finish within the allowed time
    #[error("Render timed out after {0}s")]
    Timeout(u64),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Snapshot could not be extracted from the page
    #[error("Snapshot extraction failed: {0}")]
    Extraction(String),
}

impl RenderError {
    /// Whether the next scheduled check has a reasonable chance of succeeding
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::InvalidUrl(_) | Self::Extraction(_) => false,
        }
    }
}

/// Errors that can occur while delivering a notification
#[derive(Error, Debug)]
pub enum NotificationError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-success status
    #[error("Gateway rejected message with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Invalid transport configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport-specific failure
    #[error("Delivery failed: {0}")]
    Other(String),
}
