//! Heap Module - Graph, Roots and Registry
//!
//! `Heap` bundles everything a collection cycle reads and writes. The
//! collector keeps it behind a single mutex, which is the exclusive-access
//! token: while a cycle holds it, no caller can mutate the graph, the roots
//! or the registry.
//!
//! Every operation validates the handles it names; a reclaimed handle fails
//! with `UnknownObject` instead of silently succeeding.

use crate::error::Result;
use crate::marker::{Analyzer, Reachability, RootSet};
use crate::object::{
    ObjectGraph, ObjectHandle, RefId, ReferenceQueue, ReferenceRegistry, ReferenceTier, RootId,
};
use crate::runtime::{FinalizerFn, Mutation};
use std::sync::Arc;

/// Heap - the collector's mutable state
#[derive(Debug, Default)]
pub struct Heap {
    pub(crate) graph: ObjectGraph,
    pub(crate) roots: RootSet,
    pub(crate) registry: ReferenceRegistry,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, finalizer: Option<FinalizerFn>) -> ObjectHandle {
        self.graph.allocate(finalizer)
    }

    pub fn link(
        &mut self,
        from: ObjectHandle,
        field: &str,
        to: ObjectHandle,
    ) -> Result<Option<ObjectHandle>> {
        self.graph.link(from, field, to)
    }

    pub fn unlink(&mut self, from: ObjectHandle, field: &str) -> Result<Option<ObjectHandle>> {
        self.graph.unlink(from, field)
    }

    pub fn roots_add(&mut self, id: RootId, handle: ObjectHandle) -> Result<Option<ObjectHandle>> {
        self.graph.get(handle)?;
        Ok(self.roots.add(id, handle))
    }

    pub fn roots_remove(&mut self, id: &RootId) -> Option<ObjectHandle> {
        self.roots.remove(id)
    }

    pub fn create_reference(
        &mut self,
        tier: ReferenceTier,
        target: ObjectHandle,
        queue: Option<Arc<ReferenceQueue>>,
    ) -> Result<RefId> {
        self.graph.get(target)?;
        self.registry.create(tier, target, queue)
    }

    /// Trace the current state
    pub fn analyze(&self) -> Reachability {
        Analyzer::analyze(&self.graph, &self.roots, &self.registry)
    }

    /// Apply one mutation recorded by a finalizer
    pub fn apply(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::RootAdd { id, handle } => {
                self.roots_add(id, handle)?;
            },
            Mutation::RootRemove { id } => {
                self.roots_remove(&id);
            },
            Mutation::Link { from, field, to } => {
                self.link(from, &field, to)?;
            },
            Mutation::Unlink { from, field } => {
                self.unlink(from, &field)?;
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefGcError;
    use std::collections::HashSet;

    #[test]
    fn test_roots_add_validates_handle() {
        let mut heap = Heap::new();
        let ghost = ObjectHandle::from_raw(5);
        assert!(matches!(
            heap.roots_add("r".into(), ghost),
            Err(RefGcError::UnknownObject { .. })
        ));
        assert!(heap.roots.is_empty());
    }

    #[test]
    fn test_reference_to_reclaimed_object_rejected() {
        let mut heap = Heap::new();
        let a = heap.allocate(None);
        let doomed: HashSet<_> = [a].into_iter().collect();
        heap.graph.reclaim_all(&doomed);

        assert!(matches!(
            heap.create_reference(ReferenceTier::Weak, a, None),
            Err(RefGcError::UnknownObject { .. })
        ));
    }

    #[test]
    fn test_apply_mutations() {
        let mut heap = Heap::new();
        let a = heap.allocate(None);
        let b = heap.allocate(None);

        heap.apply(Mutation::RootAdd {
            id: "r".into(),
            handle: a,
        })
        .unwrap();
        heap.apply(Mutation::Link {
            from: a,
            field: "b".to_string(),
            to: b,
        })
        .unwrap();
        assert!(heap.analyze().unreachable(&heap.graph, false).is_empty());

        heap.apply(Mutation::Unlink {
            from: a,
            field: "b".to_string(),
        })
        .unwrap();
        heap.apply(Mutation::RootRemove { id: "r".into() }).unwrap();
        assert_eq!(heap.analyze().unreachable(&heap.graph, false), vec![a, b]);
    }
}
