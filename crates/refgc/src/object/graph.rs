//! Object Graph - Objects and Strong Edges
//!
//! Every allocated object lives here until it is reclaimed. Outgoing strong
//! references are named fields; assigning a field overwrites the previous
//! edge. Objects are kept in allocation order so that tracing, finalization
//! and reclamation visit them deterministically.

use super::ObjectHandle;
use crate::error::{RefGcError, Result};
use crate::runtime::finalizer::FinalizerFn;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Finalization state of an object
///
/// ```text
/// Active ──► PendingFinalize ──► Finalizing ──► Finalized ──► (reclaimed)
///   ▲                                               │
///   └─────────────── resurrected ◄──────────────────┘
/// ```
///
/// The finalize path is walked at most once; a resurrected object keeps its
/// history and is reclaimed directly the next time it becomes unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationState {
    Active,
    PendingFinalize,
    Finalizing,
    Finalized,
}

/// ObjectEntry - a single object owned by the graph
pub struct ObjectEntry {
    /// Strong edges keyed by field name
    edges: IndexMap<String, ObjectHandle>,
    /// Finalizer, taken when it runs
    finalizer: Option<FinalizerFn>,
    state: FinalizationState,
    /// Set once the finalizer has completed; never reset
    finalized: bool,
}

impl ObjectEntry {
    fn new(finalizer: Option<FinalizerFn>) -> Self {
        Self {
            edges: IndexMap::new(),
            finalizer,
            state: FinalizationState::Active,
            finalized: false,
        }
    }

    pub fn state(&self) -> FinalizationState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// True while a registered finalizer has not yet run
    pub fn needs_finalization(&self) -> bool {
        self.finalizer.is_some() && !self.finalized
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, ObjectHandle)> + '_ {
        self.edges.iter().map(|(field, to)| (field.as_str(), *to))
    }
}

impl fmt::Debug for ObjectEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectEntry")
            .field("edges", &self.edges)
            .field("has_finalizer", &self.finalizer.is_some())
            .field("state", &self.state)
            .field("finalized", &self.finalized)
            .finish()
    }
}

/// ObjectGraph - allocation table and strong edges
#[derive(Debug, Default)]
pub struct ObjectGraph {
    objects: IndexMap<ObjectHandle, ObjectEntry>,
    next_id: u64,
    reclaimed_total: u64,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new object with an optional finalizer
    pub fn allocate(&mut self, finalizer: Option<FinalizerFn>) -> ObjectHandle {
        self.next_id += 1;
        let handle = ObjectHandle::from_raw(self.next_id);
        self.objects.insert(handle, ObjectEntry::new(finalizer));
        handle
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains_key(&handle)
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&ObjectEntry> {
        self.objects
            .get(&handle)
            .ok_or(RefGcError::UnknownObject { handle })
    }

    fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut ObjectEntry> {
        self.objects
            .get_mut(&handle)
            .ok_or(RefGcError::UnknownObject { handle })
    }

    /// Number of live (not yet reclaimed) objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects reclaimed over the graph's lifetime
    pub fn reclaimed_total(&self) -> u64 {
        self.reclaimed_total
    }

    /// All live handles in allocation order
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects.keys().copied()
    }

    /// Strong successors of `handle`; empty for unknown handles
    pub fn successors(&self, handle: ObjectHandle) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.objects
            .get(&handle)
            .into_iter()
            .flat_map(|entry| entry.edges.values().copied())
    }

    /// Assign `from.field = to`, returning the overwritten target
    pub fn link(
        &mut self,
        from: ObjectHandle,
        field: &str,
        to: ObjectHandle,
    ) -> Result<Option<ObjectHandle>> {
        if !self.contains(to) {
            return Err(RefGcError::UnknownObject { handle: to });
        }
        let entry = self.get_mut(from)?;
        Ok(entry.edges.insert(field.to_string(), to))
    }

    /// Clear `from.field`, returning the previous target if any
    pub fn unlink(&mut self, from: ObjectHandle, field: &str) -> Result<Option<ObjectHandle>> {
        let entry = self.get_mut(from)?;
        Ok(entry.edges.shift_remove(field))
    }

    pub fn needs_finalization(&self, handle: ObjectHandle) -> bool {
        self.objects
            .get(&handle)
            .map(ObjectEntry::needs_finalization)
            .unwrap_or(false)
    }

    /// Active → PendingFinalize
    pub fn mark_pending(&mut self, handle: ObjectHandle) -> Result<()> {
        let entry = self.get_mut(handle)?;
        if !entry.needs_finalization() || entry.state != FinalizationState::Active {
            return Err(RefGcError::DoubleFinalize { handle });
        }
        entry.state = FinalizationState::PendingFinalize;
        Ok(())
    }

    /// PendingFinalize → Finalizing, handing out the finalizer exactly once
    pub fn begin_finalize(&mut self, handle: ObjectHandle) -> Result<FinalizerFn> {
        let entry = self.get_mut(handle)?;
        if entry.state != FinalizationState::PendingFinalize || entry.finalized {
            return Err(RefGcError::DoubleFinalize { handle });
        }
        let finalizer = entry
            .finalizer
            .take()
            .ok_or(RefGcError::DoubleFinalize { handle })?;
        entry.state = FinalizationState::Finalizing;
        Ok(finalizer)
    }

    /// Finalizing → Finalized
    pub fn finish_finalize(&mut self, handle: ObjectHandle) -> Result<()> {
        let entry = self.get_mut(handle)?;
        if entry.state != FinalizationState::Finalizing {
            return Err(RefGcError::Internal(format!(
                "{} left finalization from state {:?}",
                handle, entry.state
            )));
        }
        entry.state = FinalizationState::Finalized;
        entry.finalized = true;
        Ok(())
    }

    /// Finalized → Active after a finalizer restored reachability
    pub fn mark_resurrected(&mut self, handle: ObjectHandle) -> Result<()> {
        let entry = self.get_mut(handle)?;
        entry.state = FinalizationState::Active;
        Ok(())
    }

    /// Drop every object in `handles`; returns how many were removed
    pub fn reclaim_all(&mut self, handles: &HashSet<ObjectHandle>) -> usize {
        let before = self.objects.len();
        self.objects.retain(|handle, _| !handles.contains(handle));
        let removed = before - self.objects.len();
        self.reclaimed_total += removed as u64;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> FinalizerFn {
        crate::runtime::finalizer::finalizer_fn(|_| Ok(()))
    }

    #[test]
    fn test_allocate_unique_handles() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(None);
        let b = graph.allocate(None);
        assert_ne!(a, b);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.handles().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn test_link_overwrites_field() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(None);
        let b = graph.allocate(None);
        let c = graph.allocate(None);

        assert_eq!(graph.link(a, "next", b).unwrap(), None);
        assert_eq!(graph.link(a, "next", c).unwrap(), Some(b));
        assert_eq!(graph.successors(a).collect::<Vec<_>>(), vec![c]);

        assert_eq!(graph.unlink(a, "next").unwrap(), Some(c));
        assert_eq!(graph.unlink(a, "next").unwrap(), None);
    }

    #[test]
    fn test_link_unknown_object() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(None);
        let ghost = ObjectHandle::from_raw(99);

        assert!(matches!(
            graph.link(a, "f", ghost),
            Err(RefGcError::UnknownObject { handle }) if handle == ghost
        ));
        assert!(matches!(
            graph.unlink(ghost, "f"),
            Err(RefGcError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_finalize_path_walked_once() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(Some(noop()));
        assert!(graph.needs_finalization(a));

        graph.mark_pending(a).unwrap();
        let _f = graph.begin_finalize(a).unwrap();
        graph.finish_finalize(a).unwrap();
        assert!(!graph.needs_finalization(a));
        assert_eq!(graph.get(a).unwrap().state(), FinalizationState::Finalized);

        graph.mark_resurrected(a).unwrap();
        assert_eq!(graph.get(a).unwrap().state(), FinalizationState::Active);
        assert!(matches!(
            graph.mark_pending(a),
            Err(RefGcError::DoubleFinalize { .. })
        ));
    }

    #[test]
    fn test_begin_finalize_requires_pending() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(Some(noop()));
        assert!(matches!(
            graph.begin_finalize(a),
            Err(RefGcError::DoubleFinalize { .. })
        ));
    }

    #[test]
    fn test_reclaim_all() {
        let mut graph = ObjectGraph::new();
        let a = graph.allocate(None);
        let b = graph.allocate(None);
        let doomed: HashSet<_> = [a].into_iter().collect();

        assert_eq!(graph.reclaim_all(&doomed), 1);
        assert!(!graph.contains(a));
        assert!(graph.contains(b));
        assert_eq!(graph.reclaimed_total(), 1);
        assert!(matches!(graph.get(a), Err(RefGcError::UnknownObject { .. })));
    }
}
