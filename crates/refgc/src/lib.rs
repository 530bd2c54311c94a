//! # refgc - Reachability-Tiered Garbage Collector
//!
//! refgc is a small tracing collector over an explicit object graph, with
//! strong, soft, weak and phantom reference semantics and a one-shot
//! finalization pipeline.
//!
//! ## Overview
//!
//! - **Explicit graph**: objects are opaque handles; strong references are
//!   named fields set with `link`
//! - **Explicit roots**: nothing is reachable unless a named root leads to it
//! - **Reference tiers**: soft handles keep their targets alive until a cycle
//!   reclaims soft references; weak and phantom handles never keep anything
//!   alive
//! - **Reference queues**: a cleared handle bound to a queue is appended to
//!   it exactly once
//! - **Finalizers**: run at most once per object on a dedicated worker, may
//!   resurrect their object, and never corrupt collector state when they fail
//!
//! ## Quick Start
//!
//! ```rust
//! use refgc::{CollectOptions, GarbageCollector, GcConfig, ReferenceTier};
//!
//! fn main() -> Result<(), refgc::RefGcError> {
//!     let gc = GarbageCollector::new(GcConfig::default())?;
//!     let queue = gc.queue_create();
//!
//!     let obj = gc.allocate()?;
//!     gc.roots_add("main", obj)?;
//!     let weak = gc.create_reference(ReferenceTier::Weak, obj, Some(queue))?;
//!
//!     gc.collect(CollectOptions::default())?;
//!     assert_eq!(gc.reference_get(weak)?, Some(obj));
//!
//!     gc.roots_remove("main")?;
//!     gc.collect(CollectOptions::default())?;
//!     assert_eq!(gc.reference_get(weak)?, None);
//!     assert_eq!(gc.queue_poll(queue)?, Some(weak));
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Caller threads                        │
//! │   allocate / link / roots_add / create_reference          │
//! │                          │                                │
//! │                   heap mutex (Heap)                       │
//! │        ObjectGraph · RootSet · ReferenceRegistry          │
//! └──────────────────────────┼───────────────────────────────┘
//!                            │ collect()
//! ┌──────────────────────────▼───────────────────────────────┐
//! │  Analyzer: strong pass ─► soft pass                       │
//! │  Driver:   reclaim ─► finalize ─► re-trace ─► reclaim     │
//! │                  │                                        │
//! │                  ▼                                        │
//! │  Finalizer worker (one thread, one finalizer at a time)   │
//! └──────────────────────────┬───────────────────────────────┘
//!                            │ cleared handles
//!                            ▼
//!                    ReferenceQueue ─► poll / poll_wait
//! ```
//!
//! ## Modules
//!
//! - [`config`]: collector configuration and validation
//! - [`error`]: error types for all refgc operations
//! - [`gc`]: collection cycle driver and the public collector API
//! - [`heap`]: the state a cycle operates on
//! - [`logging`]: structured collector events and the observability hook
//! - [`marker`]: reachability analysis and roots
//! - [`object`]: object graph, reference handles and queues
//! - [`runtime`]: finalizer worker and finalizer context
//! - [`stats`]: counters, histograms and timers

// Core GC modules
pub mod config;
pub mod error;
pub mod gc;

// Object model and state
pub mod heap;
pub mod marker;
pub mod object;

// Runtime and monitoring
pub mod logging;
pub mod runtime;
pub mod stats;

// Re-export main types for convenience
pub use config::GcConfig;
pub use error::{RefGcError, Result};
pub use gc::{CollectOptions, CollectReport, GarbageCollector, GcState};
pub use logging::{GcEvent, GcLogger, GcLoggerConfig, LogLevel};
pub use object::{
    FinalizationState, ObjectHandle, QueueHandle, RefId, ReferenceTier, RootId,
};
pub use runtime::{finalizer_fn, FinalizeContext, FinalizerFn};

/// refgc version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Create a collector with default configuration
///
/// # Examples
///
/// ```rust
/// let gc = refgc::init()?;
/// assert_eq!(gc.object_count()?, 0);
/// # Ok::<(), refgc::RefGcError>(())
/// ```
pub fn init() -> Result<GarbageCollector> {
    GarbageCollector::new(GcConfig::default())
}

/// Create a collector with custom configuration
///
/// # Examples
///
/// ```rust
/// use refgc::GcConfig;
///
/// let config = GcConfig {
///     verbose: true,
///     finalizer_thread_name: "app-finalizer".to_string(),
///     ..Default::default()
/// };
/// let gc = refgc::init_with_config(config)?;
/// # Ok::<(), refgc::RefGcError>(())
/// ```
pub fn init_with_config(config: GcConfig) -> Result<GarbageCollector> {
    GarbageCollector::new(config)
}
