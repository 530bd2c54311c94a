//! Marker Module - Reachability Analysis
//!
//! Computes, for one collection cycle, how strongly each object is reachable
//! from the root set.
//!
//! # Passes
//!
//! 1. **Strong pass** - breadth-first from the roots along strong edges only.
//!    Produces `StronglyReachable`.
//! 2. **Soft pass** - continues from the strong result, seeded with the
//!    target of every intact soft handle, again following strong edges only.
//!    Produces `SoftReachable ⊇ StronglyReachable`.
//!
//! Weak and phantom handles are never followed: they must not keep anything
//! alive. An object reachable along both a strong path and a weaker one is
//! strongly reachable.
//!
//! Which set counts as live depends on the cycle: `SoftReachable` normally,
//! `StronglyReachable` when the cycle reclaims soft references.

pub mod mark_queue;
pub mod roots;

pub use mark_queue::MarkQueue;
pub use roots::RootSet;

use crate::object::{ObjectGraph, ObjectHandle, ReferenceRegistry};
use serde::Serialize;
use std::collections::HashSet;

/// Strongest tier through which an object is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityTier {
    Strong,
    Soft,
    Unreachable,
}

/// Reachability - result of one analysis
#[derive(Debug, Default)]
pub struct Reachability {
    strong: HashSet<ObjectHandle>,
    soft: HashSet<ObjectHandle>,
    scanned: u64,
}

impl Reachability {
    pub fn tier_of(&self, handle: ObjectHandle) -> ReachabilityTier {
        if self.strong.contains(&handle) {
            ReachabilityTier::Strong
        } else if self.soft.contains(&handle) {
            ReachabilityTier::Soft
        } else {
            ReachabilityTier::Unreachable
        }
    }

    pub fn strongly_reachable(&self) -> &HashSet<ObjectHandle> {
        &self.strong
    }

    pub fn softly_reachable(&self) -> &HashSet<ObjectHandle> {
        &self.soft
    }

    /// The set of objects that survive the cycle
    pub fn live_set(&self, reclaim_soft: bool) -> &HashSet<ObjectHandle> {
        if reclaim_soft {
            &self.strong
        } else {
            &self.soft
        }
    }

    pub fn is_live(&self, handle: ObjectHandle, reclaim_soft: bool) -> bool {
        self.live_set(reclaim_soft).contains(&handle)
    }

    /// Objects outside the live set, in allocation order
    pub fn unreachable(&self, graph: &ObjectGraph, reclaim_soft: bool) -> Vec<ObjectHandle> {
        let live = self.live_set(reclaim_soft);
        graph.handles().filter(|h| !live.contains(h)).collect()
    }

    /// Objects scanned across both passes
    pub fn scanned_count(&self) -> u64 {
        self.scanned
    }
}

/// Analyzer - the tracer
pub struct Analyzer;

impl Analyzer {
    /// Run both passes over a snapshot of graph, roots and registry
    pub fn analyze(
        graph: &ObjectGraph,
        roots: &RootSet,
        registry: &ReferenceRegistry,
    ) -> Reachability {
        let mut queue = MarkQueue::new();
        for root in roots.handles().filter(|h| graph.contains(*h)) {
            queue.push(root);
        }
        Self::drain(graph, &mut queue);
        let mut scanned = queue.scanned_count();
        let strong = queue.into_marked();

        let mut queue = MarkQueue::with_marked(strong.clone());
        for target in registry.soft_targets().filter(|h| graph.contains(*h)) {
            queue.push(target);
        }
        Self::drain(graph, &mut queue);
        scanned += queue.scanned_count();
        let soft = queue.into_marked();

        log::trace!(
            "traced {} strongly / {} softly reachable objects ({} scanned)",
            strong.len(),
            soft.len(),
            scanned
        );

        Reachability {
            strong,
            soft,
            scanned,
        }
    }

    /// Everything strongly reachable from `seeds`, seeds included
    pub fn trace_from(
        graph: &ObjectGraph,
        seeds: impl IntoIterator<Item = ObjectHandle>,
    ) -> HashSet<ObjectHandle> {
        let mut queue = MarkQueue::new();
        for seed in seeds {
            queue.push(seed);
        }
        Self::drain(graph, &mut queue);
        queue.into_marked()
    }

    fn drain(graph: &ObjectGraph, queue: &mut MarkQueue) {
        while let Some(handle) = queue.pop() {
            for next in graph.successors(handle) {
                queue.push(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ReferenceTier;

    struct Fixture {
        graph: ObjectGraph,
        roots: RootSet,
        registry: ReferenceRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                graph: ObjectGraph::new(),
                roots: RootSet::new(),
                registry: ReferenceRegistry::new(),
            }
        }

        fn analyze(&self) -> Reachability {
            Analyzer::analyze(&self.graph, &self.roots, &self.registry)
        }
    }

    #[test]
    fn test_strong_chain_from_root() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        let b = f.graph.allocate(None);
        let c = f.graph.allocate(None);
        f.graph.link(a, "next", b).unwrap();
        f.roots.add("r".into(), a);

        let result = f.analyze();
        assert_eq!(result.tier_of(a), ReachabilityTier::Strong);
        assert_eq!(result.tier_of(b), ReachabilityTier::Strong);
        assert_eq!(result.tier_of(c), ReachabilityTier::Unreachable);
        assert_eq!(result.unreachable(&f.graph, false), vec![c]);
    }

    #[test]
    fn test_soft_handle_extends_live_set() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        let child = f.graph.allocate(None);
        f.graph.link(a, "child", child).unwrap();
        f.registry.create(ReferenceTier::Soft, a, None).unwrap();

        let result = f.analyze();
        assert_eq!(result.tier_of(a), ReachabilityTier::Soft);
        assert_eq!(result.tier_of(child), ReachabilityTier::Soft);
        assert!(result.is_live(child, false));
        assert!(!result.is_live(child, true));
        assert_eq!(result.unreachable(&f.graph, true), vec![a, child]);
    }

    #[test]
    fn test_weak_and_phantom_never_followed() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        let b = f.graph.allocate(None);
        f.registry.create(ReferenceTier::Weak, a, None).unwrap();
        f.registry.create(ReferenceTier::Phantom, b, None).unwrap();

        let result = f.analyze();
        assert_eq!(result.tier_of(a), ReachabilityTier::Unreachable);
        assert_eq!(result.tier_of(b), ReachabilityTier::Unreachable);
    }

    #[test]
    fn test_strongest_path_wins() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        f.registry.create(ReferenceTier::Soft, a, None).unwrap();
        f.registry.create(ReferenceTier::Weak, a, None).unwrap();
        f.roots.add("r".into(), a);

        assert_eq!(f.analyze().tier_of(a), ReachabilityTier::Strong);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        let b = f.graph.allocate(None);
        f.graph.link(a, "b", b).unwrap();
        f.graph.link(b, "a", a).unwrap();

        let result = f.analyze();
        assert_eq!(result.unreachable(&f.graph, false), vec![a, b]);

        f.roots.add("r".into(), b);
        let result = f.analyze();
        assert!(result.unreachable(&f.graph, false).is_empty());
        assert_eq!(result.scanned_count(), 2);
    }

    #[test]
    fn test_trace_from_includes_seeds() {
        let mut f = Fixture::new();
        let a = f.graph.allocate(None);
        let b = f.graph.allocate(None);
        let c = f.graph.allocate(None);
        f.graph.link(a, "b", b).unwrap();

        let traced = Analyzer::trace_from(&f.graph, [a]);
        assert!(traced.contains(&a));
        assert!(traced.contains(&b));
        assert!(!traced.contains(&c));
    }
}
