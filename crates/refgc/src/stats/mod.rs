//! Stats Module - Collector Statistics
//!
//! Lifetime counters for a collector instance:
//! - Cycles run and their duration distribution
//! - Objects reclaimed
//! - Finalizers run, failed and resurrections observed
//! - References cleared per tier

pub mod histogram;
pub mod timer;

pub use histogram::Histogram;
pub use timer::GcTimer;

use crate::gc::CollectReport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// GcStats - counters shared by a collector and its observers
pub struct GcStats {
    total_cycles: AtomicU64,
    soft_reclaiming_cycles: AtomicU64,
    objects_allocated: AtomicU64,
    objects_reclaimed: AtomicU64,
    finalizers_run: AtomicU64,
    finalizers_failed: AtomicU64,
    resurrections: AtomicU64,
    soft_cleared: AtomicU64,
    weak_cleared: AtomicU64,
    phantom_cleared: AtomicU64,
    /// Cycle durations in microseconds
    cycle_durations: Arc<Histogram>,
    start_time: Instant,
}

impl GcStats {
    pub fn new() -> Self {
        Self {
            total_cycles: AtomicU64::new(0),
            soft_reclaiming_cycles: AtomicU64::new(0),
            objects_allocated: AtomicU64::new(0),
            objects_reclaimed: AtomicU64::new(0),
            finalizers_run: AtomicU64::new(0),
            finalizers_failed: AtomicU64::new(0),
            resurrections: AtomicU64::new(0),
            soft_cleared: AtomicU64::new(0),
            weak_cleared: AtomicU64::new(0),
            phantom_cleared: AtomicU64::new(0),
            cycle_durations: Arc::new(Histogram::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_allocation(&self) {
        self.objects_allocated.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a finished cycle into the counters
    pub fn record_cycle(&self, report: &CollectReport) {
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        if report.reclaim_soft {
            self.soft_reclaiming_cycles.fetch_add(1, Ordering::Relaxed);
        }
        self.objects_reclaimed
            .fetch_add(report.reclaimed.len() as u64, Ordering::Relaxed);
        self.finalizers_run
            .fetch_add(report.finalized.len() as u64, Ordering::Relaxed);
        self.finalizers_failed
            .fetch_add(report.failed_finalizers as u64, Ordering::Relaxed);
        self.resurrections
            .fetch_add(report.resurrected.len() as u64, Ordering::Relaxed);
        self.soft_cleared
            .fetch_add(report.cleared.soft as u64, Ordering::Relaxed);
        self.weak_cleared
            .fetch_add(report.cleared.weak as u64, Ordering::Relaxed);
        self.phantom_cleared
            .fetch_add(report.cleared.phantom as u64, Ordering::Relaxed);
        self.cycle_durations
            .record(report.duration.as_micros() as u64);
    }

    pub fn cycle_histogram(&self) -> Arc<Histogram> {
        self.cycle_durations.clone()
    }

    pub fn summary(&self) -> GcSummary {
        GcSummary {
            total_cycles: self.total_cycles.load(Ordering::Relaxed),
            soft_reclaiming_cycles: self.soft_reclaiming_cycles.load(Ordering::Relaxed),
            objects_allocated: self.objects_allocated.load(Ordering::Relaxed),
            objects_reclaimed: self.objects_reclaimed.load(Ordering::Relaxed),
            finalizers_run: self.finalizers_run.load(Ordering::Relaxed),
            finalizers_failed: self.finalizers_failed.load(Ordering::Relaxed),
            resurrections: self.resurrections.load(Ordering::Relaxed),
            soft_cleared: self.soft_cleared.load(Ordering::Relaxed),
            weak_cleared: self.weak_cleared.load(Ordering::Relaxed),
            phantom_cleared: self.phantom_cleared.load(Ordering::Relaxed),
            avg_cycle_us: self.cycle_durations.mean(),
            max_cycle_us: self.cycle_durations.max(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_cycles,
            &self.soft_reclaiming_cycles,
            &self.objects_allocated,
            &self.objects_reclaimed,
            &self.finalizers_run,
            &self.finalizers_failed,
            &self.resurrections,
            &self.soft_cleared,
            &self.weak_cleared,
            &self.phantom_cleared,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.cycle_durations.clear();
    }
}

impl Default for GcStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GcSummary {
    pub total_cycles: u64,
    /// Cycles run with `reclaim_soft`
    pub soft_reclaiming_cycles: u64,
    pub objects_allocated: u64,
    pub objects_reclaimed: u64,
    pub finalizers_run: u64,
    pub finalizers_failed: u64,
    pub resurrections: u64,
    pub soft_cleared: u64,
    pub weak_cleared: u64,
    pub phantom_cleared: u64,
    pub avg_cycle_us: u64,
    pub max_cycle_us: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ClearedReferences, ObjectHandle};
    use std::time::Duration;

    #[test]
    fn test_record_cycle() {
        let stats = GcStats::new();
        let report = CollectReport {
            cycle: 1,
            reclaim_soft: true,
            reclaimed: vec![ObjectHandle::from_raw(1), ObjectHandle::from_raw(2)],
            finalized: vec![ObjectHandle::from_raw(2)],
            resurrected: vec![],
            failed_finalizers: 1,
            cleared: ClearedReferences {
                soft: 1,
                weak: 2,
                phantom: 3,
            },
            duration: Duration::from_micros(40),
        };

        stats.record_cycle(&report);
        let summary = stats.summary();
        assert_eq!(summary.total_cycles, 1);
        assert_eq!(summary.soft_reclaiming_cycles, 1);
        assert_eq!(summary.objects_reclaimed, 2);
        assert_eq!(summary.finalizers_run, 1);
        assert_eq!(summary.finalizers_failed, 1);
        assert_eq!(summary.phantom_cleared, 3);
        assert_eq!(summary.max_cycle_us, 40);

        stats.reset();
        assert_eq!(stats.summary().total_cycles, 0);
        assert_eq!(stats.cycle_histogram().count(), 0);
    }
}
