//! GC Logging and Tracing
//!
//! Structured events for collector activity, useful for:
//! - Debugging finalization and resurrection
//! - Observing reference clearing
//! - Detecting slow or failing finalizers
//!
//! Every event is forwarded to the `log` facade under the `refgc` target,
//! optionally recorded in memory, and passed to an installed hook. The hook
//! is where embedders receive finalizer failures. While a cycle holds the
//! heap, hook delivery is deferred until the heap is released, so a hook may
//! query the collector.
//!
//! Log Levels:
//! - WARN: Finalizer failures, slow finalizers, skipped mutations
//! - INFO: Cycle start/end, resurrections
//! - DEBUG: Phases, reference statistics
//! - TRACE: Marking statistics

use crate::object::ObjectHandle;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Log level for collector events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Collector event types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcEvent {
    /// Collection cycle started
    CycleStart { cycle: u64, reclaim_soft: bool },

    /// Cycle phase completed
    PhaseEnd {
        cycle: u64,
        phase: String,
        duration_us: u64,
    },

    /// Marking statistics
    MarkStats {
        cycle: u64,
        strongly_reachable: usize,
        softly_reachable: usize,
        scanned: u64,
    },

    /// Reference processing statistics
    ReferenceStats {
        cycle: u64,
        soft_cleared: usize,
        weak_cleared: usize,
        phantom_cleared: usize,
        finalizers_processed: usize,
    },

    /// A finalizer returned an error or panicked
    FinalizerFailed {
        cycle: u64,
        object: ObjectHandle,
        message: String,
    },

    /// A finalizer ran longer than the configured threshold
    SlowFinalizer {
        cycle: u64,
        object: ObjectHandle,
        duration_ms: f64,
    },

    /// A finalizer made its object reachable again
    Resurrected { cycle: u64, object: ObjectHandle },

    /// A mutation recorded by a finalizer could not be applied
    MutationSkipped {
        cycle: u64,
        object: ObjectHandle,
        reason: String,
    },

    /// Collection cycle completed
    CycleEnd {
        cycle: u64,
        duration_ms: f64,
        reclaimed: usize,
        finalized: usize,
        resurrected: usize,
    },
}

impl GcEvent {
    /// Level at which this event is emitted
    pub fn level(&self) -> LogLevel {
        match self {
            GcEvent::FinalizerFailed { .. }
            | GcEvent::SlowFinalizer { .. }
            | GcEvent::MutationSkipped { .. } => LogLevel::Warn,
            GcEvent::CycleStart { .. } | GcEvent::CycleEnd { .. } | GcEvent::Resurrected { .. } => {
                LogLevel::Info
            },
            GcEvent::PhaseEnd { .. } | GcEvent::ReferenceStats { .. } => LogLevel::Debug,
            GcEvent::MarkStats { .. } => LogLevel::Trace,
        }
    }
}

impl fmt::Display for GcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcEvent::CycleStart {
                cycle,
                reclaim_soft,
            } => write!(
                f,
                "[GC] Cycle {} started (reclaim_soft={})",
                cycle, reclaim_soft
            ),
            GcEvent::PhaseEnd {
                cycle,
                phase,
                duration_us,
            } => write!(
                f,
                "[GC] Cycle {}: {} phase completed ({} us)",
                cycle, phase, duration_us
            ),
            GcEvent::MarkStats {
                cycle,
                strongly_reachable,
                softly_reachable,
                scanned,
            } => write!(
                f,
                "[GC] Cycle {}: {} strongly, {} softly reachable, {} scanned",
                cycle, strongly_reachable, softly_reachable, scanned
            ),
            GcEvent::ReferenceStats {
                cycle,
                soft_cleared,
                weak_cleared,
                phantom_cleared,
                finalizers_processed,
            } => write!(
                f,
                "[GC] Cycle {}: references {} soft, {} weak, {} phantom cleared, {} finalizers",
                cycle, soft_cleared, weak_cleared, phantom_cleared, finalizers_processed
            ),
            GcEvent::FinalizerFailed {
                cycle,
                object,
                message,
            } => write!(
                f,
                "[GC] Cycle {}: finalizer for {} failed: {}",
                cycle, object, message
            ),
            GcEvent::SlowFinalizer {
                cycle,
                object,
                duration_ms,
            } => write!(
                f,
                "[GC] Cycle {}: finalizer for {} took {:.2}ms",
                cycle, object, duration_ms
            ),
            GcEvent::Resurrected { cycle, object } => {
                write!(f, "[GC] Cycle {}: {} resurrected by its finalizer", cycle, object)
            },
            GcEvent::MutationSkipped {
                cycle,
                object,
                reason,
            } => write!(
                f,
                "[GC] Cycle {}: mutation from finalizer of {} skipped: {}",
                cycle, object, reason
            ),
            GcEvent::CycleEnd {
                cycle,
                duration_ms,
                reclaimed,
                finalized,
                resurrected,
            } => write!(
                f,
                "[GC] Cycle {} completed ({:.2}ms, reclaimed {}, finalized {}, resurrected {})",
                cycle, duration_ms, reclaimed, finalized, resurrected
            ),
        }
    }
}

/// GC Logger configuration
#[derive(Debug, Clone)]
pub struct GcLoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Render events as JSON lines
    pub json: bool,

    /// Prefix events with a wall-clock timestamp
    pub timestamps: bool,

    /// Keep events in memory for `GcLogger::events()`
    pub record_events: bool,

    /// Oldest events are dropped past this count
    pub max_recorded_events: usize,
}

impl Default for GcLoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json: false,
            timestamps: true,
            record_events: true,
            max_recorded_events: 1024,
        }
    }
}

/// Callback receiving every emitted event
pub type EventHook = Box<dyn Fn(&GcEvent) + Send + Sync + 'static>;

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(flatten)]
    event: &'a GcEvent,
}

/// GcLogger - per-collector event sink
pub struct GcLogger {
    config: GcLoggerConfig,
    events: Mutex<VecDeque<(Instant, GcEvent)>>,
    hook: RwLock<Option<EventHook>>,
    /// Hook events held back by a live `HookDeferral`
    deferred: Mutex<Option<Vec<GcEvent>>>,
    enabled: AtomicBool,
    dropped: AtomicU64,
}

/// Holds hook delivery until dropped, then replays the held events in order
pub struct HookDeferral<'a> {
    logger: &'a GcLogger,
}

impl Drop for HookDeferral<'_> {
    fn drop(&mut self) {
        let held = self.logger.deferred.lock().take().unwrap_or_default();
        for event in &held {
            self.logger.dispatch(event);
        }
    }
}

impl GcLogger {
    pub fn new(config: GcLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            hook: RwLock::new(None),
            deferred: Mutex::new(None),
            enabled: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Install the observability hook, replacing any previous one.
    ///
    /// The hook runs on whichever thread emits the event and must not call
    /// back into this logger's hook setters.
    pub fn set_hook<F>(&self, hook: F)
    where
        F: Fn(&GcEvent) + Send + Sync + 'static,
    {
        *self.hook.write() = Some(Box::new(hook));
    }

    pub fn clear_hook(&self) {
        self.hook.write().take();
    }

    /// Hold hook delivery until the returned guard is dropped.
    ///
    /// Events still reach `log` and the buffer immediately.
    pub fn defer_hook(&self) -> HookDeferral<'_> {
        self.deferred.lock().get_or_insert_with(Vec::new);
        HookDeferral { logger: self }
    }

    fn dispatch(&self, event: &GcEvent) {
        if let Some(hook) = self.hook.read().as_ref() {
            hook(event);
        }
    }

    /// Log a collector event
    pub fn log(&self, event: GcEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        if level > self.config.level {
            return;
        }

        let log_level: log::Level = level.into();
        log::log!(target: "refgc", log_level, "{}", self.render(&event));

        let held = match self.deferred.lock().as_mut() {
            Some(held) => {
                held.push(event.clone());
                true
            },
            None => false,
        };
        if !held {
            self.dispatch(&event);
        }

        if self.config.record_events {
            let mut events = self.events.lock();
            events.push_back((Instant::now(), event));
            while events.len() > self.config.max_recorded_events {
                events.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Format an event the way it is sent to `log`
    pub fn render(&self, event: &GcEvent) -> String {
        let timestamp = self
            .config
            .timestamps
            .then(|| chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string());

        if self.config.json {
            let line = JsonLine { timestamp, event };
            serde_json::to_string(&line).unwrap_or_else(|_| event.to_string())
        } else {
            match timestamp {
                Some(ts) => format!("[{}] {}", ts, event),
                None => event.to_string(),
            }
        }
    }

    /// Recorded events, oldest first
    pub fn events(&self) -> Vec<GcEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Recorded events with the instant they were logged
    pub fn timed_events(&self) -> Vec<(Instant, GcEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Events discarded because the buffer was full
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for GcLogger {
    fn default() -> Self {
        Self::new(GcLoggerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn start(cycle: u64) -> GcEvent {
        GcEvent::CycleStart {
            cycle,
            reclaim_soft: false,
        }
    }

    #[test]
    fn test_gc_logger_basic() {
        let logger = GcLogger::default();
        logger.log(start(1));
        assert_eq!(logger.event_count(), 1);
        assert_eq!(logger.events(), vec![start(1)]);
    }

    #[test]
    fn test_gc_logger_disable() {
        let logger = GcLogger::default();
        logger.disable();
        logger.log(start(1));
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_level_filter() {
        let logger = GcLogger::default();
        logger.log(GcEvent::MarkStats {
            cycle: 1,
            strongly_reachable: 0,
            softly_reachable: 0,
            scanned: 0,
        });
        assert_eq!(logger.event_count(), 0);
    }

    #[test]
    fn test_hook_receives_events() {
        let logger = GcLogger::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        logger.set_hook(move |event| {
            if matches!(event, GcEvent::CycleStart { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        logger.log(start(1));
        logger.log(start(2));
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        logger.clear_hook();
        logger.log(start(3));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deferred_hook_replays_in_order() {
        let logger = GcLogger::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        logger.set_hook(move |event| sink.lock().push(event.clone()));

        let deferral = logger.defer_hook();
        logger.log(start(1));
        logger.log(start(2));
        assert!(seen.lock().is_empty());
        assert_eq!(logger.event_count(), 2);

        drop(deferral);
        assert_eq!(*seen.lock(), vec![start(1), start(2)]);

        logger.log(start(3));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_bounded_buffer() {
        let logger = GcLogger::new(GcLoggerConfig {
            max_recorded_events: 2,
            ..Default::default()
        });
        for cycle in 1..=3 {
            logger.log(start(cycle));
        }
        assert_eq!(logger.events(), vec![start(2), start(3)]);
        assert_eq!(logger.dropped_count(), 1);
    }

    #[test]
    fn test_json_rendering() {
        let logger = GcLogger::new(GcLoggerConfig {
            json: true,
            timestamps: false,
            ..Default::default()
        });
        let line = logger.render(&GcEvent::Resurrected {
            cycle: 4,
            object: ObjectHandle::from_raw(7),
        });
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "resurrected");
        assert_eq!(value["cycle"], 4);
        assert_eq!(value["object"], 7);
    }

    #[test]
    fn test_human_rendering() {
        let logger = GcLogger::new(GcLoggerConfig {
            timestamps: false,
            ..Default::default()
        });
        assert_eq!(
            logger.render(&start(2)),
            "[GC] Cycle 2 started (reclaim_soft=false)"
        );
    }
}
