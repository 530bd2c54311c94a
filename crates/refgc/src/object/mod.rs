//! Object Module - Object Model and Reference Handles
//!
//! - `graph`: allocated objects and their strong field edges
//! - `reference`: soft/weak/phantom handles and the registry that owns them
//! - `queue`: FIFO notification queues for cleared handles

pub mod graph;
pub mod queue;
pub mod reference;

pub use graph::{FinalizationState, ObjectEntry, ObjectGraph};
pub use queue::ReferenceQueue;
pub use reference::{ClearedReferences, ReferenceHandle, ReferenceRegistry, ReferenceTier};

use serde::Serialize;
use std::fmt;

/// Opaque identity of an object allocated by a collector.
///
/// Handles are never reused; once the object is reclaimed every operation
/// naming the handle fails with `UnknownObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    /// Build a handle from its raw id (diagnostics and tests)
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Id of a soft/weak/phantom handle held in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RefId(u64);

impl RefId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref#{}", self.0)
    }
}

/// Handle of a reference queue created by a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QueueHandle(u64);

impl QueueHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Caller-chosen name of a root slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RootId(String);

impl RootId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RootId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RootId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(ObjectHandle::from_raw(4).to_string(), "obj#4");
        assert_eq!(RefId::from_raw(9).to_string(), "ref#9");
        assert_eq!(QueueHandle::from_raw(1).to_string(), "queue#1");
        assert_eq!(RootId::from("main").to_string(), "main");
    }

    #[test]
    fn test_handles_serialize_as_numbers() {
        let json = serde_json::to_string(&ObjectHandle::from_raw(12)).unwrap();
        assert_eq!(json, "12");
    }
}
