//! GC Core Module - Collection Cycle Management
//!
//! `GarbageCollector` owns the heap (graph, roots, reference registry), the
//! reference queues and the finalizer worker, and drives collection cycles.
//!
//! # Cycle
//!
//! 1. Trace: compute strong and soft reachability.
//! 2. Split the unreachable objects into those with a pending finalizer and
//!    the rest. Everything strongly reachable from a pending object is
//!    retained for this cycle.
//! 3. Clear (and enqueue) every handle pointing at the remaining objects,
//!    then drop them from the graph.
//! 4. Run each pending finalizer on the finalizer worker, one at a time,
//!    applying the mutations it recorded.
//! 5. Re-trace. Finalized objects that became reachable again are
//!    resurrected; everything still unreachable goes through step 3.
//!
//! Step 1 also resurrects any live object left `Finalized` by an earlier
//! cycle, such as one that was retained by another pending object.
//!
//! The heap mutex is held for the whole cycle, so mutation and collection
//! never interleave. Hook delivery is deferred until the heap is released.

use crate::config::GcConfig;
use crate::error::{RefGcError, Result};
use crate::heap::Heap;
use crate::logging::{GcEvent, GcLogger};
use crate::marker::{Analyzer, Reachability};
use crate::object::{
    ClearedReferences, FinalizationState, ObjectHandle, QueueHandle, RefId, ReferenceQueue,
    ReferenceTier, RootId,
};
use crate::runtime::{FinalizationScheduler, FinalizerFn, FinalizerOutcome};
use crate::stats::{GcStats, GcTimer};
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// GC cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GcState {
    /// Idle - no cycle in progress
    Idle,
    /// Computing reachability
    Tracing,
    /// Running finalizers
    Finalizing,
    /// Clearing references and dropping objects
    Reclaiming,
}

/// Options for one collection cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    /// Treat soft references like weak ones for this cycle
    pub reclaim_soft: bool,
}

impl CollectOptions {
    /// Options for a cycle run under memory pressure
    pub fn under_pressure() -> Self {
        Self { reclaim_soft: true }
    }
}

/// What one collection cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub cycle: u64,
    pub reclaim_soft: bool,
    /// Reclaimed objects, in reclamation order
    pub reclaimed: Vec<ObjectHandle>,
    /// Objects whose finalizer ran this cycle
    pub finalized: Vec<ObjectHandle>,
    /// Finalized objects that became reachable again
    pub resurrected: Vec<ObjectHandle>,
    pub failed_finalizers: usize,
    pub cleared: ClearedReferences,
    pub duration: Duration,
}

/// Resets the cycle flags however `collect` exits
struct CycleGuard<'a> {
    collecting: &'a AtomicBool,
    state: &'a Mutex<GcState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = GcState::Idle;
        self.collecting.store(false, Ordering::SeqCst);
    }
}

/// GarbageCollector - orchestrator for the entire GC cycle
///
/// ## Thread Safety
///
/// `GarbageCollector` is `Send + Sync`. Heap operations from any thread
/// block while a cycle runs. Finalizers must not call back into the
/// collector's heap operations; they record changes through their
/// `FinalizeContext` and such calls fail with `MutationInFinalizer`.
pub struct GarbageCollector {
    /// Graph, roots and reference registry
    heap: Mutex<Heap>,

    /// Reference queues by handle
    queues: RwLock<IndexMap<QueueHandle, Arc<ReferenceQueue>>>,
    next_queue_id: AtomicU64,

    /// Serialized finalizer worker
    finalizer: FinalizationScheduler,

    config: Arc<GcConfig>,
    stats: Arc<GcStats>,
    logger: Arc<GcLogger>,

    /// Current GC state
    state: Mutex<GcState>,

    /// Set while a cycle runs
    collecting: AtomicBool,

    /// GC cycle counter
    cycle_count: AtomicU64,
}

impl GarbageCollector {
    /// Create a new GarbageCollector with specified configuration
    ///
    /// # Examples
    /// ```rust
    /// use refgc::{GarbageCollector, GcConfig};
    ///
    /// let gc = GarbageCollector::new(GcConfig::default())?;
    /// assert_eq!(gc.cycle_count(), 0);
    /// # Ok::<(), refgc::RefGcError>(())
    /// ```
    pub fn new(config: GcConfig) -> Result<Self> {
        config.validate()?;

        let logger = Arc::new(GcLogger::new(config.effective_logger_config()));
        let finalizer = FinalizationScheduler::new(&config.finalizer_thread_name)?;

        Ok(Self {
            heap: Mutex::new(Heap::new()),
            queues: RwLock::new(IndexMap::new()),
            next_queue_id: AtomicU64::new(1),
            finalizer,
            config: Arc::new(config),
            stats: Arc::new(GcStats::new()),
            logger,
            state: Mutex::new(GcState::Idle),
            collecting: AtomicBool::new(false),
            cycle_count: AtomicU64::new(0),
        })
    }

    fn lock_heap(&self) -> Result<MutexGuard<'_, Heap>> {
        if self.finalizer.is_worker_thread() {
            return Err(RefGcError::MutationInFinalizer);
        }
        Ok(self.heap.lock())
    }

    fn queue(&self, id: QueueHandle) -> Result<Arc<ReferenceQueue>> {
        self.queues
            .read()
            .get(&id)
            .cloned()
            .ok_or(RefGcError::UnknownQueue { id })
    }

    // ========================================================================
    // Mutator operations
    // ========================================================================

    /// Allocate an object without a finalizer
    pub fn allocate(&self) -> Result<ObjectHandle> {
        self.allocate_object(None)
    }

    /// Allocate an object whose finalizer runs once before it is reclaimed
    ///
    /// ```rust
    /// use refgc::{finalizer_fn, GarbageCollector, GcConfig};
    ///
    /// let gc = GarbageCollector::new(GcConfig::default())?;
    /// let obj = gc.allocate_with_finalizer(finalizer_fn(|ctx| {
    ///     println!("finalizing {}", ctx.object());
    ///     Ok(())
    /// }))?;
    /// gc.collect(Default::default())?;
    /// assert!(!gc.is_alive(obj)?);
    /// # Ok::<(), refgc::RefGcError>(())
    /// ```
    pub fn allocate_with_finalizer(&self, finalizer: FinalizerFn) -> Result<ObjectHandle> {
        self.allocate_object(Some(finalizer))
    }

    fn allocate_object(&self, finalizer: Option<FinalizerFn>) -> Result<ObjectHandle> {
        let handle = self.lock_heap()?.allocate(finalizer);
        if self.config.stats_enabled {
            self.stats.record_allocation();
        }
        Ok(handle)
    }

    /// Register `handle` as a root under `id`, returning the handle it replaced
    pub fn roots_add(
        &self,
        id: impl Into<RootId>,
        handle: ObjectHandle,
    ) -> Result<Option<ObjectHandle>> {
        self.lock_heap()?.roots_add(id.into(), handle)
    }

    /// Unregister a root; `None` if `id` was not registered
    pub fn roots_remove(&self, id: impl Into<RootId>) -> Result<Option<ObjectHandle>> {
        Ok(self.lock_heap()?.roots_remove(&id.into()))
    }

    /// Set `from.field = to`, returning the previous target of the field
    pub fn link(
        &self,
        from: ObjectHandle,
        field: &str,
        to: ObjectHandle,
    ) -> Result<Option<ObjectHandle>> {
        self.lock_heap()?.link(from, field, to)
    }

    pub fn unlink(&self, from: ObjectHandle, field: &str) -> Result<Option<ObjectHandle>> {
        self.lock_heap()?.unlink(from, field)
    }

    // ========================================================================
    // References and queues
    // ========================================================================

    /// Create a soft, weak or phantom reference to `target`
    ///
    /// When `queue` is given, the reference is appended to it once, when it
    /// is cleared.
    pub fn create_reference(
        &self,
        tier: ReferenceTier,
        target: ObjectHandle,
        queue: Option<QueueHandle>,
    ) -> Result<RefId> {
        let queue = queue.map(|id| self.queue(id)).transpose()?;
        self.lock_heap()?.create_reference(tier, target, queue)
    }

    /// Current referent; always `None` for phantom references
    pub fn reference_get(&self, id: RefId) -> Result<Option<ObjectHandle>> {
        self.lock_heap()?.registry.get(id)
    }

    /// Clear a reference by hand, enqueuing it if bound
    ///
    /// Returns false if it was already cleared.
    pub fn reference_clear(&self, id: RefId) -> Result<bool> {
        self.lock_heap()?.registry.clear(id)
    }

    pub fn reference_is_cleared(&self, id: RefId) -> Result<bool> {
        Ok(self.lock_heap()?.registry.handle(id)?.is_cleared())
    }

    pub fn reference_tier(&self, id: RefId) -> Result<ReferenceTier> {
        Ok(self.lock_heap()?.registry.handle(id)?.tier())
    }

    /// Drop a reference; a released soft reference stops keeping its target
    ///
    /// Cleared references stay queryable until released, so long-running
    /// callers release them once consumed.
    pub fn release_reference(&self, id: RefId) -> Result<()> {
        self.lock_heap()?.registry.release(id)
    }

    pub fn queue_create(&self) -> QueueHandle {
        let id = QueueHandle::from_raw(self.next_queue_id.fetch_add(1, Ordering::Relaxed));
        self.queues
            .write()
            .insert(id, Arc::new(ReferenceQueue::new(id)));
        id
    }

    /// Remove the oldest cleared reference from the queue
    pub fn queue_poll(&self, id: QueueHandle) -> Result<Option<RefId>> {
        Ok(self.queue(id)?.poll())
    }

    /// Like `queue_poll`, but wait up to `timeout` for an entry
    ///
    /// Never holds the heap lock, so waiting does not hold up collection.
    pub fn queue_poll_wait(&self, id: QueueHandle, timeout: Duration) -> Result<Option<RefId>> {
        Ok(self.queue(id)?.poll_wait(timeout))
    }

    pub fn queue_len(&self, id: QueueHandle) -> Result<usize> {
        Ok(self.queue(id)?.len())
    }

    pub fn queue_is_empty(&self, id: QueueHandle) -> Result<bool> {
        Ok(self.queue(id)?.is_empty())
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Execute one collection cycle
    ///
    /// Runs on the caller's thread; finalizers run on the finalizer worker
    /// while the caller waits. Fails with `ReentrantCollect` when called
    /// from a finalizer or while another thread is collecting.
    ///
    /// Finalizer failures do not fail the cycle; they are counted in the
    /// report and emitted as `FinalizerFailed` events.
    pub fn collect(&self, options: CollectOptions) -> Result<CollectReport> {
        if self.finalizer.is_worker_thread() {
            return Err(RefGcError::ReentrantCollect);
        }
        if self
            .collecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RefGcError::ReentrantCollect);
        }
        let _guard = CycleGuard {
            collecting: &self.collecting,
            state: &self.state,
        };

        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;
        let timer = GcTimer::new();
        self.logger.log(GcEvent::CycleStart {
            cycle,
            reclaim_soft: options.reclaim_soft,
        });

        // Declared before the heap guard so the hook sees events only after
        // the heap is released
        let deferral = self.logger.defer_hook();
        let mut heap = self.heap.lock();
        let mut report = CollectReport {
            cycle,
            reclaim_soft: options.reclaim_soft,
            ..Default::default()
        };

        // Phase 1-3: trace, split, reclaim what needs no finalization.
        // Objects finalized in an earlier cycle that are live again go back
        // to Active first.
        let reachability = self.trace(&heap, cycle, "trace");
        self.resurrect_live(&mut heap, &reachability, options.reclaim_soft, cycle, &mut report)?;
        let (pending, collectable) = Self::partition(&heap, &reachability, options.reclaim_soft);
        for &object in &pending {
            heap.graph.mark_pending(object)?;
        }
        self.reclaim(&mut heap, &collectable, cycle, "reclaim", &mut report);

        // Phase 4: finalize
        if !pending.is_empty() {
            self.run_finalizers(&mut heap, &pending, cycle, &mut report)?;

            // Phase 5: re-trace and settle finalized objects
            let reachability = self.trace(&heap, cycle, "retrace");
            self.resurrect_live(&mut heap, &reachability, options.reclaim_soft, cycle, &mut report)?;
            let (_, collectable) = Self::partition(&heap, &reachability, options.reclaim_soft);
            self.reclaim(&mut heap, &collectable, cycle, "reclaim_finalized", &mut report);
        }
        drop(heap);
        drop(deferral);

        report.duration = timer.elapsed();
        self.logger.log(GcEvent::ReferenceStats {
            cycle,
            soft_cleared: report.cleared.soft,
            weak_cleared: report.cleared.weak,
            phantom_cleared: report.cleared.phantom,
            finalizers_processed: report.finalized.len(),
        });
        self.logger.log(GcEvent::CycleEnd {
            cycle,
            duration_ms: report.duration.as_secs_f64() * 1000.0,
            reclaimed: report.reclaimed.len(),
            finalized: report.finalized.len(),
            resurrected: report.resurrected.len(),
        });
        if self.config.stats_enabled {
            self.stats.record_cycle(&report);
        }

        Ok(report)
    }

    fn set_state(&self, state: GcState) {
        *self.state.lock() = state;
    }

    fn phase_end(&self, cycle: u64, phase: &str, timer: &GcTimer) {
        self.logger.log(GcEvent::PhaseEnd {
            cycle,
            phase: phase.to_string(),
            duration_us: timer.elapsed_us(),
        });
    }

    fn trace(&self, heap: &Heap, cycle: u64, phase: &str) -> Reachability {
        self.set_state(GcState::Tracing);
        let timer = GcTimer::new();
        let reachability = heap.analyze();
        self.logger.log(GcEvent::MarkStats {
            cycle,
            strongly_reachable: reachability.strongly_reachable().len(),
            softly_reachable: reachability.softly_reachable().len(),
            scanned: reachability.scanned_count(),
        });
        self.phase_end(cycle, phase, &timer);
        reachability
    }

    /// Split unreachable objects into pending finalization and collectable.
    ///
    /// Objects strongly reachable from a pending object are in neither set;
    /// they stay until its finalizer has run.
    fn partition(
        heap: &Heap,
        reachability: &Reachability,
        reclaim_soft: bool,
    ) -> (Vec<ObjectHandle>, HashSet<ObjectHandle>) {
        let unreachable = reachability.unreachable(&heap.graph, reclaim_soft);
        let pending: Vec<ObjectHandle> = unreachable
            .iter()
            .copied()
            .filter(|handle| heap.graph.needs_finalization(*handle))
            .collect();
        let retained = Analyzer::trace_from(&heap.graph, pending.iter().copied());
        let collectable = unreachable
            .into_iter()
            .filter(|handle| !retained.contains(handle))
            .collect();
        (pending, collectable)
    }

    fn reclaim(
        &self,
        heap: &mut Heap,
        collectable: &HashSet<ObjectHandle>,
        cycle: u64,
        phase: &str,
        report: &mut CollectReport,
    ) {
        if collectable.is_empty() {
            return;
        }
        self.set_state(GcState::Reclaiming);
        let timer = GcTimer::new();

        let cleared = heap.registry.clear_targets(collectable);
        let order: Vec<ObjectHandle> = heap
            .graph
            .handles()
            .filter(|handle| collectable.contains(handle))
            .collect();
        heap.graph.reclaim_all(collectable);

        log::debug!(
            "cycle {}: reclaimed {} objects, cleared {} references",
            cycle,
            order.len(),
            cleared.total()
        );
        report.cleared += cleared;
        report.reclaimed.extend(order);
        self.phase_end(cycle, phase, &timer);
    }

    fn run_finalizers(
        &self,
        heap: &mut Heap,
        pending: &[ObjectHandle],
        cycle: u64,
        report: &mut CollectReport,
    ) -> Result<()> {
        self.set_state(GcState::Finalizing);
        let timer = GcTimer::new();

        for &object in pending {
            let finalizer = heap.graph.begin_finalize(object)?;
            let run = self.finalizer.run(object, finalizer)?;
            heap.graph.finish_finalize(object)?;
            report.finalized.push(object);

            if run.duration > self.config.slow_finalizer_threshold {
                self.logger.log(GcEvent::SlowFinalizer {
                    cycle,
                    object,
                    duration_ms: run.duration.as_secs_f64() * 1000.0,
                });
            }

            match run.outcome {
                FinalizerOutcome::Completed { mutations } => {
                    for mutation in mutations {
                        if let Err(err) = heap.apply(mutation) {
                            self.logger.log(GcEvent::MutationSkipped {
                                cycle,
                                object,
                                reason: err.to_string(),
                            });
                        }
                    }
                },
                FinalizerOutcome::Failed { message } => {
                    report.failed_finalizers += 1;
                    self.logger.log(GcEvent::FinalizerFailed {
                        cycle,
                        object,
                        message,
                    });
                },
            }
        }

        self.phase_end(cycle, "finalize", &timer);
        Ok(())
    }

    /// Return live finalized objects to `Active`
    fn resurrect_live(
        &self,
        heap: &mut Heap,
        reachability: &Reachability,
        reclaim_soft: bool,
        cycle: u64,
        report: &mut CollectReport,
    ) -> Result<()> {
        let revived: Vec<ObjectHandle> = heap
            .graph
            .handles()
            .filter(|handle| reachability.is_live(*handle, reclaim_soft))
            .filter(|handle| {
                heap.graph
                    .get(*handle)
                    .map(|entry| entry.state() == FinalizationState::Finalized)
                    .unwrap_or(false)
            })
            .collect();

        for object in revived {
            heap.graph.mark_resurrected(object)?;
            self.logger.log(GcEvent::Resurrected { cycle, object });
            report.resurrected.push(object);
        }
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// True if `handle` has not been reclaimed
    pub fn is_alive(&self, handle: ObjectHandle) -> Result<bool> {
        Ok(self.lock_heap()?.graph.contains(handle))
    }

    /// Number of objects not yet reclaimed
    pub fn object_count(&self) -> Result<usize> {
        Ok(self.lock_heap()?.graph.len())
    }

    pub fn root_count(&self) -> Result<usize> {
        Ok(self.lock_heap()?.roots.len())
    }

    /// Outgoing strong edges of `handle`, in field insertion order
    pub fn edges(&self, handle: ObjectHandle) -> Result<Vec<(String, ObjectHandle)>> {
        let heap = self.lock_heap()?;
        let entry = heap.graph.get(handle)?;
        Ok(entry
            .edges()
            .map(|(field, to)| (field.to_string(), to))
            .collect())
    }

    pub fn finalization_state(&self, handle: ObjectHandle) -> Result<FinalizationState> {
        Ok(self.lock_heap()?.graph.get(handle)?.state())
    }

    /// Check if a cycle is currently running
    pub fn is_collecting(&self) -> bool {
        self.collecting.load(Ordering::SeqCst)
    }

    /// Get current GC state
    pub fn state(&self) -> GcState {
        *self.state.lock()
    }

    /// Get total GC cycles started
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Get GC statistics
    pub fn stats(&self) -> Arc<GcStats> {
        self.stats.clone()
    }

    /// Event logger; install a hook here to observe finalizer failures
    pub fn logger(&self) -> Arc<GcLogger> {
        self.logger.clone()
    }

    /// Get detailed diagnostic information
    ///
    /// Heap figures are omitted while a cycle holds the heap.
    pub fn diagnostics(&self) -> IndexMap<String, String> {
        let mut diagnostics = IndexMap::new();

        diagnostics.insert("state".to_string(), format!("{:?}", self.state()));
        diagnostics.insert("cycle_count".to_string(), self.cycle_count().to_string());

        if let Some(heap) = self.heap.try_lock() {
            diagnostics.insert("objects".to_string(), heap.graph.len().to_string());
            diagnostics.insert(
                "objects_reclaimed".to_string(),
                heap.graph.reclaimed_total().to_string(),
            );
            diagnostics.insert("roots".to_string(), heap.roots.len().to_string());
            diagnostics.insert("references".to_string(), heap.registry.len().to_string());
            diagnostics.insert(
                "references_intact".to_string(),
                heap.registry.intact_count().to_string(),
            );
        }

        let queues = self.queues.read();
        diagnostics.insert("queues".to_string(), queues.len().to_string());
        diagnostics.insert(
            "queued_references".to_string(),
            queues.values().map(|q| q.len()).sum::<usize>().to_string(),
        );
        drop(queues);

        let summary = self.stats.summary();
        diagnostics.insert(
            "finalizers_run".to_string(),
            summary.finalizers_run.to_string(),
        );
        diagnostics.insert(
            "finalizers_failed".to_string(),
            summary.finalizers_failed.to_string(),
        );
        diagnostics.insert(
            "resurrections".to_string(),
            summary.resurrections.to_string(),
        );

        diagnostics
    }
}

impl std::fmt::Debug for GarbageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageCollector")
            .field("state", &self.state())
            .field("cycle_count", &self.cycle_count())
            .finish_non_exhaustive()
    }
}
