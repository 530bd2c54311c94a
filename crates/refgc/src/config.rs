//! Configuration Module - Collector Tuning Parameters
//!
//! All parameters have sensible defaults; most callers use
//! `GcConfig::default()` unchanged.

use crate::logging::{GcLoggerConfig, LogLevel};
use std::time::Duration;

/// Main configuration for a collector instance
///
/// # Examples
///
/// ```rust
/// use refgc::GcConfig;
/// use std::time::Duration;
///
/// let config = GcConfig {
///     verbose: true,
///     slow_finalizer_threshold: Duration::from_millis(50),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Enable verbose collector logging
    ///
    /// Lowers the event level threshold to `Debug`, so phase timings and
    /// marking statistics are emitted and recorded too.
    /// Default: false
    pub verbose: bool,

    /// Enable statistics collection
    ///
    /// Default: true
    pub stats_enabled: bool,

    /// Finalizer duration above which a `SlowFinalizer` event is reported
    ///
    /// A finalizer is never interrupted; a slow or blocked one only delays
    /// the rest of its cycle. This threshold makes such liveness problems
    /// visible.
    /// Default: 100ms
    pub slow_finalizer_threshold: Duration,

    /// Name given to the finalizer worker thread
    ///
    /// Default: "refgc-finalizer"
    pub finalizer_thread_name: String,

    /// Event logger configuration
    pub logger: GcLoggerConfig,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            verbose: false,
            stats_enabled: true,
            slow_finalizer_threshold: Duration::from_millis(100),
            finalizer_thread_name: "refgc-finalizer".to_string(),
            logger: GcLoggerConfig::default(),
        }
    }
}

impl GcConfig {
    /// Validate configuration
    ///
    /// ```rust
    /// use refgc::GcConfig;
    ///
    /// let config = GcConfig {
    ///     finalizer_thread_name: String::new(),
    ///     ..Default::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slow_finalizer_threshold.is_zero() {
            return Err(ConfigError::InvalidThreshold(
                "slow_finalizer_threshold must be > 0".to_string(),
            ));
        }

        if self.finalizer_thread_name.is_empty() {
            return Err(ConfigError::InvalidThreadName(
                "finalizer_thread_name must not be empty".to_string(),
            ));
        }

        if self.finalizer_thread_name.contains('\0') {
            return Err(ConfigError::InvalidThreadName(
                "finalizer_thread_name must not contain NUL bytes".to_string(),
            ));
        }

        if self.logger.record_events && self.logger.max_recorded_events == 0 {
            return Err(ConfigError::InvalidLogger(
                "max_recorded_events must be > 0 when recording events".to_string(),
            ));
        }

        Ok(())
    }

    /// Logger configuration with `verbose` applied
    pub fn effective_logger_config(&self) -> GcLoggerConfig {
        let mut logger = self.logger.clone();
        if self.verbose && logger.level < LogLevel::Debug {
            logger.level = LogLevel::Debug;
        }
        logger
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Invalid thread name: {0}")]
    InvalidThreadName(String),

    #[error("Invalid logger configuration: {0}")]
    InvalidLogger(String),
}
