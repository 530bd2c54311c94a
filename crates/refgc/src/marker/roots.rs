//! Root Set - Caller-Declared Anchors
//!
//! Roots are the starting points for tracing. Every root is strong. There is
//! no stack or static scanning: a root exists only while the caller keeps
//! it registered under its id.

use crate::object::{ObjectHandle, RootId};
use indexmap::IndexMap;

/// RootSet - root id → object mapping
#[derive(Debug, Default)]
pub struct RootSet {
    roots: IndexMap<RootId, ObjectHandle>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id`, returning the handle it replaced
    pub fn add(&mut self, id: RootId, handle: ObjectHandle) -> Option<ObjectHandle> {
        self.roots.insert(id, handle)
    }

    /// Unregister `id`, returning the handle it held
    pub fn remove(&mut self, id: &RootId) -> Option<ObjectHandle> {
        self.roots.shift_remove(id)
    }

    /// Rooted objects in registration order; may repeat a handle
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.roots.values().copied()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
