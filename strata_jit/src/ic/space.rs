//! Per-script stub arena.
//!
//! Stubs are never freed when they are unlinked: a frame may still be
//! executing their code. Unlinking *retires* a slot, and retired slots are
//! reclaimed in bulk by [`StubSpace::purge`] at a collector safe point.
//!
//! ```text
//!   allocate ──► Linked ──retire──► Retired ──purge──► Free ──┐
//!                  ▲                                          │
//!                  └──────────────── allocate ◄───────────────┘
//! ```

use super::stub::{SpecializedStub, StubId};
use strata_gc::{Trace, Tracer};

#[derive(Debug)]
enum Slot {
    Linked(SpecializedStub),
    Retired(SpecializedStub),
    Free,
}

/// Arena of specialized stubs.
#[derive(Debug, Default)]
pub struct StubSpace {
    slots: Vec<Slot>,
    free: Vec<u32>,
    retired: usize,
}

impl StubSpace {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new linked stub.
    pub fn allocate(&mut self, stub: SpecializedStub) -> StubId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Slot::Linked(stub);
            return StubId(index);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Linked(stub));
        StubId(index)
    }

    /// Linked or retired stub at `id`.
    pub fn get(&self, id: StubId) -> Option<&SpecializedStub> {
        match self.slots.get(id.index())? {
            Slot::Linked(stub) | Slot::Retired(stub) => Some(stub),
            Slot::Free => None,
        }
    }

    /// Linked stub at `id`.
    pub(crate) fn get_linked_mut(&mut self, id: StubId) -> Option<&mut SpecializedStub> {
        match self.slots.get_mut(id.index())? {
            Slot::Linked(stub) => Some(stub),
            _ => None,
        }
    }

    /// Check whether `id` is still part of a chain.
    pub fn is_linked(&self, id: StubId) -> bool {
        matches!(self.slots.get(id.index()), Some(Slot::Linked(_)))
    }

    /// Check whether `id` was unlinked and awaits purging.
    pub fn is_retired(&self, id: StubId) -> bool {
        matches!(self.slots.get(id.index()), Some(Slot::Retired(_)))
    }

    /// Move a linked stub to the retired list, optionally poisoning its
    /// code reference. Returns `false` if `id` was not linked.
    pub(crate) fn retire(&mut self, id: StubId, poison: bool) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            return false;
        };
        match std::mem::replace(slot, Slot::Free) {
            Slot::Linked(mut stub) => {
                if poison {
                    stub.poison();
                }
                *slot = Slot::Retired(stub);
                self.retired += 1;
                true
            }
            other => {
                *slot = other;
                false
            }
        }
    }

    /// Free every retired slot. Returns the number reclaimed.
    pub fn purge(&mut self) -> usize {
        let mut reclaimed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Retired(_)) {
                *slot = Slot::Free;
                self.free.push(index as u32);
                reclaimed += 1;
            }
        }
        self.retired = 0;
        reclaimed
    }

    /// Stubs currently linked into some chain.
    pub fn linked_count(&self) -> usize {
        self.slots.len() - self.free.len() - self.retired
    }

    /// Stubs awaiting purge.
    #[inline]
    pub fn retired_count(&self) -> usize {
        self.retired
    }

    /// Arena capacity in slots, including free ones.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Safety: retired stubs are reported alongside linked ones so an in-flight
/// frame never runs reclaimed code.
unsafe impl Trace for StubSpace {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for slot in &self.slots {
            if let Slot::Retired(stub) = slot {
                stub.trace(tracer);
            }
        }
    }
}
