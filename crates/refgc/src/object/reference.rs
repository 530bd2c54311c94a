//! Reference Handles - Soft, Weak and Phantom References
//!
//! Reference handles point at objects without being strong edges. The
//! registry owns every handle; callers only hold its `RefId`.
//!
//! Tiers, strongest first:
//! - Strong: graph edges only, never a registry entry
//! - Soft: keeps its target alive until a cycle reclaims soft references
//! - Weak: never keeps anything alive; `get()` yields the target until cleared
//! - Phantom: never keeps anything alive; `get()` always yields nothing.
//!   Cleared only after the target's finalizer has completed.
//!
//! Clearing is monotonic: a cleared handle never targets an object again, and
//! a handle bound to a queue is enqueued exactly once, at the moment it is
//! cleared.

use super::{ObjectHandle, QueueHandle, ReferenceQueue, RefId};
use crate::error::{RefGcError, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Reference strength tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTier {
    /// Graph edge - keeps target alive unconditionally
    Strong,
    /// Cleared only when the cycle reclaims soft references
    Soft,
    /// Cleared as soon as the target is unreachable
    Weak,
    /// Cleared after finalization; referent never exposed
    Phantom,
}

impl fmt::Display for ReferenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceTier::Strong => write!(f, "Strong"),
            ReferenceTier::Soft => write!(f, "Soft"),
            ReferenceTier::Weak => write!(f, "Weak"),
            ReferenceTier::Phantom => write!(f, "Phantom"),
        }
    }
}

/// ReferenceHandle - one registry entry
pub struct ReferenceHandle {
    id: RefId,
    tier: ReferenceTier,
    /// None once cleared
    target: Option<ObjectHandle>,
    queue: Option<Arc<ReferenceQueue>>,
}

impl ReferenceHandle {
    pub fn id(&self) -> RefId {
        self.id
    }

    pub fn tier(&self) -> ReferenceTier {
        self.tier
    }

    /// Caller-visible referent; always `None` for phantom handles
    pub fn get(&self) -> Option<ObjectHandle> {
        match self.tier {
            ReferenceTier::Phantom => None,
            _ => self.target,
        }
    }

    /// Referent as seen by the collector, regardless of tier
    pub(crate) fn referent(&self) -> Option<ObjectHandle> {
        self.target
    }

    pub fn is_cleared(&self) -> bool {
        self.target.is_none()
    }

    pub fn queue(&self) -> Option<QueueHandle> {
        self.queue.as_ref().map(|queue| queue.id())
    }

    /// Clear the handle and enqueue it if bound.
    ///
    /// Returns false if it was already cleared; the queue sees each handle
    /// at most once.
    pub fn clear(&mut self) -> bool {
        if self.target.take().is_none() {
            return false;
        }
        if let Some(queue) = &self.queue {
            queue.enqueue(self.id);
        }
        true
    }
}

impl fmt::Debug for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("id", &self.id)
            .field("tier", &self.tier)
            .field("target", &self.target)
            .field("queue", &self.queue())
            .finish()
    }
}

/// Per-tier counts of handles cleared by the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearedReferences {
    pub soft: usize,
    pub weak: usize,
    pub phantom: usize,
}

impl ClearedReferences {
    pub fn total(&self) -> usize {
        self.soft + self.weak + self.phantom
    }

    fn record(&mut self, tier: ReferenceTier) {
        match tier {
            ReferenceTier::Soft => self.soft += 1,
            ReferenceTier::Weak => self.weak += 1,
            ReferenceTier::Phantom => self.phantom += 1,
            ReferenceTier::Strong => {},
        }
    }
}

impl std::ops::AddAssign for ClearedReferences {
    fn add_assign(&mut self, other: Self) {
        self.soft += other.soft;
        self.weak += other.weak;
        self.phantom += other.phantom;
    }
}

/// ReferenceRegistry - owner of all soft/weak/phantom handles
///
/// Cleared handles stay registered, so `get` and `is_cleared` keep answering,
/// until the caller releases them. Memory grows with unreleased handles.
///
/// Intact handles are also indexed by referent. A cycle only visits the
/// handles of objects it reclaims, and clears them in creation (id) order,
/// which fixes the order entries reach their queues.
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    handles: IndexMap<RefId, ReferenceHandle>,
    by_target: IndexMap<ObjectHandle, Vec<RefId>>,
    next_id: u64,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new handle
    ///
    /// The caller validates `target`; the registry only rejects `Strong`,
    /// which is expressed with graph edges instead.
    pub fn create(
        &mut self,
        tier: ReferenceTier,
        target: ObjectHandle,
        queue: Option<Arc<ReferenceQueue>>,
    ) -> Result<RefId> {
        if tier == ReferenceTier::Strong {
            return Err(RefGcError::InvalidArgument(
                "strong references are graph edges; use link()".to_string(),
            ));
        }

        self.next_id += 1;
        let id = RefId::from_raw(self.next_id);
        self.handles.insert(
            id,
            ReferenceHandle {
                id,
                tier,
                target: Some(target),
                queue,
            },
        );
        self.by_target.entry(target).or_default().push(id);
        Ok(id)
    }

    pub fn handle(&self, id: RefId) -> Result<&ReferenceHandle> {
        self.handles
            .get(&id)
            .ok_or(RefGcError::UnknownReference { id })
    }

    pub fn get(&self, id: RefId) -> Result<Option<ObjectHandle>> {
        Ok(self.handle(id)?.get())
    }

    /// Clear a handle by id; false if it was already cleared
    pub fn clear(&mut self, id: RefId) -> Result<bool> {
        let handle = self
            .handles
            .get_mut(&id)
            .ok_or(RefGcError::UnknownReference { id })?;
        let target = handle.referent();
        if !handle.clear() {
            return Ok(false);
        }
        if let Some(target) = target {
            self.unindex(target, id);
        }
        Ok(true)
    }

    /// Drop a handle from the registry without enqueuing it
    pub fn release(&mut self, id: RefId) -> Result<()> {
        let handle = self
            .handles
            .shift_remove(&id)
            .ok_or(RefGcError::UnknownReference { id })?;
        if let Some(target) = handle.referent() {
            self.unindex(target, id);
        }
        Ok(())
    }

    fn unindex(&mut self, target: ObjectHandle, id: RefId) {
        if let Some(ids) = self.by_target.get_mut(&target) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_target.swap_remove(&target);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of handles not yet cleared
    pub fn intact_count(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }

    /// Targets of every intact soft handle
    pub fn soft_targets(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.by_target
            .iter()
            .filter(|(_, ids)| {
                ids.iter().any(|id| {
                    self.handles
                        .get(id)
                        .map(|handle| handle.tier == ReferenceTier::Soft)
                        .unwrap_or(false)
                })
            })
            .map(|(target, _)| *target)
    }

    /// Clear every handle whose referent is in `reclaimed`, in creation order
    pub fn clear_targets(&mut self, reclaimed: &HashSet<ObjectHandle>) -> ClearedReferences {
        let mut doomed: Vec<RefId> = reclaimed
            .iter()
            .filter_map(|target| self.by_target.swap_remove(target))
            .flatten()
            .collect();
        doomed.sort_unstable();

        let mut cleared = ClearedReferences::default();
        for id in doomed {
            if let Some(handle) = self.handles.get_mut(&id) {
                if handle.clear() {
                    cleared.record(handle.tier);
                }
            }
        }
        cleared
    }
}
