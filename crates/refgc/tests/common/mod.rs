//! Test Utilities for the refgc Integration Suite
//!
//! Shared fixture plus strict assertion helpers. Every helper is
//! `#[track_caller]` so failures point at the test, not at this file.

#![allow(dead_code)]

use refgc::{
    finalizer_fn, CollectOptions, CollectReport, FinalizeContext, GarbageCollector, GcConfig,
    ObjectHandle, QueueHandle, RefId, ReferenceTier,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Maximum time a test waits on a queue
pub const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// ============================================================================
/// GC FIXTURE
/// ============================================================================

/// Test fixture for collector operations
pub struct GcFixture {
    pub gc: Arc<GarbageCollector>,
    pub config: GcConfig,
}

impl GcFixture {
    /// Create fixture with default configuration
    pub fn with_defaults() -> Self {
        Self::with_config(GcConfig::default())
    }

    /// Create fixture that records every event level
    pub fn verbose() -> Self {
        Self::with_config(GcConfig {
            verbose: true,
            ..Default::default()
        })
    }

    pub fn with_config(config: GcConfig) -> Self {
        let gc = Arc::new(
            GarbageCollector::new(config.clone())
                .expect("collector initialization should succeed with valid config"),
        );
        Self { gc, config }
    }

    pub fn allocate(&self) -> ObjectHandle {
        self.gc
            .allocate()
            .unwrap_or_else(|e| panic!("allocation failed: {}", e))
    }

    /// Allocate an object whose finalizer only counts its runs
    pub fn allocate_counted(&self, runs: &Arc<AtomicUsize>) -> ObjectHandle {
        let runs = runs.clone();
        self.allocate_finalizable(move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    pub fn allocate_finalizable<F>(&self, f: F) -> ObjectHandle
    where
        F: FnOnce(&mut FinalizeContext) -> anyhow::Result<()> + Send + 'static,
    {
        self.gc
            .allocate_with_finalizer(finalizer_fn(f))
            .unwrap_or_else(|e| panic!("allocation failed: {}", e))
    }

    pub fn root(&self, id: &str, handle: ObjectHandle) {
        self.gc
            .roots_add(id, handle)
            .unwrap_or_else(|e| panic!("roots_add({}) failed: {}", id, e));
    }

    pub fn unroot(&self, id: &str) {
        self.gc
            .roots_remove(id)
            .unwrap_or_else(|e| panic!("roots_remove({}) failed: {}", id, e));
    }

    pub fn link(&self, from: ObjectHandle, field: &str, to: ObjectHandle) {
        self.gc
            .link(from, field, to)
            .unwrap_or_else(|e| panic!("link {}.{} failed: {}", from, field, e));
    }

    pub fn reference(
        &self,
        tier: ReferenceTier,
        target: ObjectHandle,
        queue: Option<QueueHandle>,
    ) -> RefId {
        self.gc
            .create_reference(tier, target, queue)
            .unwrap_or_else(|e| panic!("create_reference({}) failed: {}", tier, e))
    }

    /// Run one cycle and return its report
    pub fn collect(&self) -> CollectReport {
        self.gc
            .collect(CollectOptions::default())
            .expect("collection should complete successfully")
    }

    /// Run one cycle that also reclaims soft references
    pub fn collect_soft(&self) -> CollectReport {
        self.gc
            .collect(CollectOptions::under_pressure())
            .expect("collection should complete successfully")
    }

    /// Poll a queue until it is empty
    pub fn drain(&self, queue: QueueHandle) -> Vec<RefId> {
        let mut drained = Vec::new();
        while let Some(id) = self.gc.queue_poll(queue).expect("queue should exist") {
            drained.push(id);
        }
        drained
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

#[track_caller]
pub fn assert_alive(fixture: &GcFixture, handle: ObjectHandle, context: &str) {
    assert!(
        fixture.gc.is_alive(handle).expect("is_alive should not fail"),
        "{}: {} was reclaimed while still reachable",
        context,
        handle
    );
}

#[track_caller]
pub fn assert_reclaimed(fixture: &GcFixture, handle: ObjectHandle, context: &str) {
    assert!(
        !fixture.gc.is_alive(handle).expect("is_alive should not fail"),
        "{}: {} survived although unreachable",
        context,
        handle
    );
}

#[track_caller]
pub fn assert_cleared(fixture: &GcFixture, id: RefId, context: &str) {
    assert!(
        fixture
            .gc
            .reference_is_cleared(id)
            .expect("reference should exist"),
        "{}: {} was not cleared",
        context,
        id
    );
    assert_eq!(
        fixture.gc.reference_get(id).expect("reference should exist"),
        None,
        "{}: cleared {} still yields a referent",
        context,
        id
    );
}

#[track_caller]
pub fn assert_intact(fixture: &GcFixture, id: RefId, context: &str) {
    assert!(
        !fixture
            .gc
            .reference_is_cleared(id)
            .expect("reference should exist"),
        "{}: {} was cleared while its target is reachable",
        context,
        id
    );
}

/// Assert the queue holds exactly `expected`, in order, and nothing more
#[track_caller]
pub fn assert_queue_exactly(fixture: &GcFixture, queue: QueueHandle, expected: &[RefId], context: &str) {
    let drained = fixture.drain(queue);
    assert_eq!(
        drained, expected,
        "{}: queue {} contents differ (order matters, each entry exactly once)",
        context, queue
    );
}

#[track_caller]
pub fn assert_runs(runs: &Arc<AtomicUsize>, expected: usize, context: &str) {
    assert_eq!(
        runs.load(Ordering::SeqCst),
        expected,
        "{}: finalizer run count mismatch",
        context
    );
}
