//! Mark Queue - Breadth-First Marking Work List
//!
//! Objects are marked when first pushed and scanned when popped, so each
//! object is scanned at most once per traversal.

use crate::object::ObjectHandle;
use std::collections::{HashSet, VecDeque};

/// MarkQueue - FIFO work list with a mark set
#[derive(Debug, Default)]
pub struct MarkQueue {
    queue: VecDeque<ObjectHandle>,
    marked: HashSet<ObjectHandle>,
    scanned: u64,
}

impl MarkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a traversal from an already marked set
    pub fn with_marked(marked: HashSet<ObjectHandle>) -> Self {
        Self {
            queue: VecDeque::new(),
            marked,
            scanned: 0,
        }
    }

    /// Mark and enqueue; false if already marked
    pub fn push(&mut self, handle: ObjectHandle) -> bool {
        if !self.marked.insert(handle) {
            return false;
        }
        self.queue.push_back(handle);
        true
    }

    pub fn pop(&mut self) -> Option<ObjectHandle> {
        let handle = self.queue.pop_front()?;
        self.scanned += 1;
        Some(handle)
    }

    pub fn is_marked(&self, handle: ObjectHandle) -> bool {
        self.marked.contains(&handle)
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    /// Objects popped for scanning
    pub fn scanned_count(&self) -> u64 {
        self.scanned
    }

    /// Finish the traversal and hand back the mark set
    pub fn into_marked(self) -> HashSet<ObjectHandle> {
        self.marked
    }
}
