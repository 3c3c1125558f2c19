//! Error types for the live-timing core.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. Callers can use [`FeedError::is_retryable`] to decide between
//! retrying with the same payload (safe thanks to lap deduplication) and
//! dropping the operation.
//!
//! ## Error Categories
//!
//! - **Payload Errors**: a feed payload that cannot be normalized at all
//! - **Store Errors**: the persistent lap store is unreachable or failing
//! - **Timeouts**: an operation exceeded its time budget
//! - **Delivery Errors**: a single live connection could not be reached
//!
//! Note that two conditions are deliberately *not* errors: a duplicate lap is
//! a defined no-op outcome of ingestion, and one malformed record inside an
//! otherwise valid batch is skipped and reported alongside the accepted laps.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for live-timing operations.
pub type Result<T, E = FeedError> = std::result::Result<T, E>;

/// Main error type for live-timing operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FeedError {
    #[error("Malformed feed payload in {context}: {details}")]
    MalformedPayload { context: String, details: String },

    #[error("Store operation '{operation}' failed")]
    Store {
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Delivery to connection '{connection_id}' failed: {reason}")]
    Delivery { connection_id: String, reason: String },

    #[error("Unknown ingestion action '{action}'")]
    InvalidAction { action: String },
}

impl FeedError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Retrying ingestion with the same payload is always safe: laps carry a
    /// unique identity key and resubmissions deduplicate to no-ops.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Store { .. } => true,
            FeedError::Timeout { .. } => true,
            FeedError::Delivery { .. } => true,
            FeedError::MalformedPayload { .. } => false,
            FeedError::InvalidAction { .. } => false,
        }
    }

    /// Helper constructor for malformed payload errors.
    pub fn malformed(context: impl Into<String>, details: impl Into<String>) -> Self {
        FeedError::MalformedPayload { context: context.into(), details: details.into() }
    }

    /// Helper constructor for store errors without an underlying cause.
    pub fn store_failed(operation: impl Into<String>) -> Self {
        FeedError::Store { operation: operation.into(), source: None }
    }

    /// Helper constructor for store errors with an underlying cause.
    pub fn store_failed_with_source(
        operation: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        FeedError::Store { operation: operation.into(), source: Some(source) }
    }

    /// Helper constructor for per-connection delivery failures.
    pub fn delivery_failed(
        connection_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        FeedError::Delivery { connection_id: connection_id.into(), reason: reason.into() }
    }
}
