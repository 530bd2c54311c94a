//! Finalizer - Object Finalization
//!
//! Finalizers run after an object becomes unreachable but before it is
//! reclaimed. Each object's finalizer runs at most once.
//!
//! All finalizers execute on one dedicated worker thread, one at a time. The
//! collector hands a finalizer to the worker and blocks until it reports
//! back, so a finalizer never runs concurrently with another finalizer or
//! with the rest of a collection cycle.
//!
//! A finalizer cannot touch the heap directly while the cycle holds it.
//! Instead it receives a `FinalizeContext` that records root and edge
//! mutations; the collector applies them once the finalizer returns `Ok`.
//! That is how an object resurrects itself.
//!
//! A finalizer that returns `Err` or panics is reported and its recorded
//! mutations are discarded. The object still counts as finalized.

use crate::error::{RefGcError, Result};
use crate::object::{ObjectHandle, RootId};
use crate::stats::GcTimer;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Finalizer callback registered at allocation time
pub type FinalizerFn = Box<dyn FnOnce(&mut FinalizeContext) -> anyhow::Result<()> + Send + 'static>;

/// Box a closure as a `FinalizerFn`
pub fn finalizer_fn<F>(f: F) -> FinalizerFn
where
    F: FnOnce(&mut FinalizeContext) -> anyhow::Result<()> + Send + 'static,
{
    Box::new(f)
}

/// Heap mutation recorded by a finalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    RootAdd { id: RootId, handle: ObjectHandle },
    RootRemove { id: RootId },
    Link {
        from: ObjectHandle,
        field: String,
        to: ObjectHandle,
    },
    Unlink { from: ObjectHandle, field: String },
}

/// FinalizeContext - what a running finalizer may do
#[derive(Debug)]
pub struct FinalizeContext {
    object: ObjectHandle,
    mutations: Vec<Mutation>,
}

impl FinalizeContext {
    fn new(object: ObjectHandle) -> Self {
        Self {
            object,
            mutations: Vec::new(),
        }
    }

    /// The object being finalized
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    pub fn roots_add(&mut self, id: impl Into<RootId>, handle: ObjectHandle) {
        self.mutations.push(Mutation::RootAdd {
            id: id.into(),
            handle,
        });
    }

    pub fn roots_remove(&mut self, id: impl Into<RootId>) {
        self.mutations.push(Mutation::RootRemove { id: id.into() });
    }

    pub fn link(&mut self, from: ObjectHandle, field: impl Into<String>, to: ObjectHandle) {
        self.mutations.push(Mutation::Link {
            from,
            field: field.into(),
            to,
        });
    }

    pub fn unlink(&mut self, from: ObjectHandle, field: impl Into<String>) {
        self.mutations.push(Mutation::Unlink {
            from,
            field: field.into(),
        });
    }

    /// Root the finalized object under `id`
    pub fn resurrect(&mut self, id: impl Into<RootId>) {
        let object = self.object;
        self.roots_add(id, object);
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }
}

/// Result of one finalizer execution
#[derive(Debug)]
pub enum FinalizerOutcome {
    Completed { mutations: Vec<Mutation> },
    Failed { message: String },
}

/// FinalizerRun - report sent back by the worker
#[derive(Debug)]
pub struct FinalizerRun {
    pub object: ObjectHandle,
    pub outcome: FinalizerOutcome,
    pub duration: Duration,
}

impl FinalizerRun {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, FinalizerOutcome::Failed { .. })
    }
}

/// Finalizer entry
struct FinalizerJob {
    object: ObjectHandle,
    finalizer: FinalizerFn,
}

/// FinalizationScheduler - owner of the serialized finalizer worker
pub struct FinalizationScheduler {
    jobs: Option<Sender<FinalizerJob>>,
    done: Receiver<FinalizerRun>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl FinalizationScheduler {
    /// Spawn the worker thread
    pub fn new(thread_name: &str) -> Result<Self> {
        let (jobs_tx, jobs_rx) = channel::unbounded::<FinalizerJob>();
        let (done_tx, done_rx) = channel::unbounded::<FinalizerRun>();

        let handle = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || worker_loop(jobs_rx, done_tx))
            .map_err(|e| RefGcError::Internal(format!("failed to spawn finalizer thread: {}", e)))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            done: done_rx,
            worker_id: handle.thread().id(),
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Run one finalizer on the worker and wait for it to finish
    pub fn run(&self, object: ObjectHandle, finalizer: FinalizerFn) -> Result<FinalizerRun> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| RefGcError::Internal("finalizer worker stopped".to_string()))?;

        jobs.send(FinalizerJob { object, finalizer })
            .map_err(|_| RefGcError::Internal("finalizer worker exited".to_string()))?;

        let run = self
            .done
            .recv()
            .map_err(|_| RefGcError::Internal("finalizer worker exited".to_string()))?;

        if run.object != object {
            return Err(RefGcError::Internal(format!(
                "finalizer worker reported {} while running {}",
                run.object, object
            )));
        }
        Ok(run)
    }

    /// True when called from the finalizer worker thread
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Stop the worker; queued jobs are drained first
    ///
    /// Called from the worker itself (the last collector handle dropped
    /// inside a finalizer), the thread is detached instead of joined.
    pub fn shutdown(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.lock().take() {
            if self.is_worker_thread() {
                return;
            }
            if handle.join().is_err() {
                log::error!("finalizer worker terminated abnormally");
            }
        }
    }
}

impl Drop for FinalizationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(jobs: Receiver<FinalizerJob>, done: Sender<FinalizerRun>) {
    for FinalizerJob { object, finalizer } in jobs.iter() {
        let timer = GcTimer::new();
        let mut context = FinalizeContext::new(object);

        let result = panic::catch_unwind(AssertUnwindSafe(|| finalizer(&mut context)));
        let outcome = match result {
            Ok(Ok(())) => FinalizerOutcome::Completed {
                mutations: context.mutations,
            },
            Ok(Err(err)) => FinalizerOutcome::Failed {
                message: format!("{:#}", err),
            },
            Err(payload) => FinalizerOutcome::Failed {
                message: format!("panicked: {}", panic_message(payload.as_ref())),
            },
        };

        let run = FinalizerRun {
            object,
            outcome,
            duration: timer.elapsed(),
        };
        if done.send(run).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
