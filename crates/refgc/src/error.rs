//! Error Module - refgc Error Types
//!
//! Defines all error types used in refgc.
//!
//! # Error Categories
//!
//! ## Lookup Errors
//! - `UnknownObject` - Handle never allocated or already reclaimed
//! - `UnknownReference` - Reference id not in the registry
//! - `UnknownQueue` - Queue handle not created by this collector
//!
//! ## Cycle Errors
//! - `ReentrantCollect` - `collect()` while another cycle is running
//! - `MutationInFinalizer` - Finalizer touched the collector directly
//! - `DoubleFinalize` - Scheduler invariant violation (bug)
//!
//! ## Configuration Errors
//! - `Configuration` - Invalid configuration
//! - `InvalidArgument` - Invalid function argument
//! - `Internal` - Invariant violation inside the collector

use crate::object::{ObjectHandle, QueueHandle, RefId};
use thiserror::Error;

/// Main error type for all refgc operations
///
/// # Examples
///
/// ```rust
/// use refgc::RefGcError;
///
/// fn handle_error(err: RefGcError) {
///     match err {
///         RefGcError::UnknownObject { handle } => {
///             eprintln!("object {} is gone", handle);
///         }
///         RefGcError::ReentrantCollect => {
///             eprintln!("collection already running");
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum RefGcError {
    /// Unknown object handle
    ///
    /// **When returned:** The handle was never allocated by this collector,
    /// or the object has already been reclaimed.
    ///
    /// **Recovery strategy:** Drop the handle; reclaimed objects never return.
    #[error("Unknown object: {handle} (never allocated or already reclaimed)")]
    UnknownObject { handle: ObjectHandle },

    /// Unknown reference id
    ///
    /// **When returned:** The reference was never created or was released.
    #[error("Unknown reference: {id}")]
    UnknownReference { id: RefId },

    /// Unknown queue handle
    ///
    /// **When returned:** Queue handle not created by this collector.
    #[error("Unknown reference queue: {id}")]
    UnknownQueue { id: QueueHandle },

    /// Finalizer scheduled twice
    ///
    /// **When returned:** An object reached the finalization path a second
    /// time. This is an internal invariant violation.
    ///
    /// **Recovery strategy:** Cannot recover - this is a bug
    #[error("Finalizer for {handle} scheduled twice")]
    DoubleFinalize { handle: ObjectHandle },

    /// Collection re-entered
    ///
    /// **When returned:** `collect()` called while another cycle is in
    /// progress on the same collector. Not retried automatically.
    #[error("Collection already in progress")]
    ReentrantCollect,

    /// Finalizer called back into the collector
    ///
    /// **When returned:** Code running on the finalizer worker used the
    /// collector directly instead of its `FinalizeContext`. The heap is held
    /// by the running cycle, so the call is rejected instead of deadlocking.
    #[error("Collector accessed from inside a finalizer; use FinalizeContext")]
    MutationInFinalizer,

    /// Invalid argument
    ///
    /// **Example scenario:** Creating a registry handle of tier `Strong`.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    ///
    /// **When returned:** `GcConfig::validate()` rejected the configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error - indicates a bug in refgc
    ///
    /// **Action required:** Report with the collector diagnostics attached
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RefGcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RefGcError::ReentrantCollect | RefGcError::MutationInFinalizer
        )
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            RefGcError::DoubleFinalize { .. } | RefGcError::Internal(_)
        )
    }
}

impl From<crate::config::ConfigError> for RefGcError {
    fn from(err: crate::config::ConfigError) -> Self {
        RefGcError::Configuration(err.to_string())
    }
}

/// Result type alias for refgc operations
pub type Result<T> = std::result::Result<T, RefGcError>;
