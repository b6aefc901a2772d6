//! Object heap with a stop-the-world mark/sweep collector.
//!
//! Objects live in an index arena; [`ObjectRef`] is the index. A collection
//! marks from caller-supplied roots through the [`Trace`] contract and frees
//! every unmarked slot. Freed indices are reused by later allocations.

use crate::object::JsObject;
use strata_core::ObjectRef;
use strata_gc::{CellRef, EdgeCollector, Trace};

/// Outcome of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Objects that survived.
    pub live: usize,
    /// Objects freed.
    pub freed: usize,
}

/// Arena of heap objects.
#[derive(Debug, Default)]
pub struct ObjectHeap {
    objects: Vec<Option<JsObject>>,
    free: Vec<u32>,
    collections: u64,
}

impl ObjectHeap {
    /// Create an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `object` and return its handle.
    pub fn allocate(&mut self, object: JsObject) -> ObjectRef {
        if let Some(index) = self.free.pop() {
            self.objects[index as usize] = Some(object);
            return ObjectRef::from_index(index);
        }
        let index = self.objects.len() as u32;
        self.objects.push(Some(object));
        ObjectRef::from_index(index)
    }

    /// Look up a live object.
    #[inline]
    pub fn get(&self, obj: ObjectRef) -> Option<&JsObject> {
        self.objects.get(obj.index() as usize)?.as_ref()
    }

    /// Look up a live object mutably.
    #[inline]
    pub fn get_mut(&mut self, obj: ObjectRef) -> Option<&mut JsObject> {
        self.objects.get_mut(obj.index() as usize)?.as_mut()
    }

    /// Check whether `obj` refers to a live object.
    #[inline]
    pub fn is_live(&self, obj: ObjectRef) -> bool {
        self.get(obj).is_some()
    }

    /// Number of live objects.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.objects.len() - self.free.len()
    }

    /// Completed collections.
    #[must_use]
    pub fn collections(&self) -> u64 {
        self.collections
    }

    /// Mark from `roots`, sweep everything unreachable.
    pub fn collect(&mut self, roots: &[&dyn Trace]) -> CollectStats {
        let mut marked = vec![false; self.objects.len()];
        let mut edges = EdgeCollector::new();
        for root in roots {
            root.trace(&mut edges);
        }

        let mut worklist: Vec<ObjectRef> = edges
            .take()
            .into_iter()
            .filter_map(|(cell, _)| cell.as_object())
            .collect();

        while let Some(obj) = worklist.pop() {
            let index = obj.index() as usize;
            if index >= marked.len() || marked[index] {
                continue;
            }
            let Some(object) = self.objects[index].as_ref() else {
                continue;
            };
            marked[index] = true;
            object.trace(&mut edges);
            worklist.extend(edges.take().into_iter().filter_map(|(cell, _)| match cell {
                CellRef::Object(o) => Some(o),
                _ => None,
            }));
        }

        let mut stats = CollectStats::default();
        for (index, slot) in self.objects.iter_mut().enumerate() {
            if slot.is_none() {
                continue;
            }
            if marked[index] {
                stats.live += 1;
            } else {
                *slot = None;
                self.free.push(index as u32);
                stats.freed += 1;
            }
        }
        self.collections += 1;
        stats
    }
}
