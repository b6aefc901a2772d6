//! Chain maintenance: link, walk, unlink, discard.
//!
//! Every mutation is a single link swap, so a walk never observes a half
//! updated chain. Unlinking runs the write barrier over the removed stub
//! exactly once, then retires its arena slot.

use super::entry::{IcEntry, IcScript};
use super::generator::StubDescription;
use super::state::IcState;
use super::stub::{JitCode, SpecializedStub, StubCode, StubId, StubRef};
use super::telemetry::global_ic_telemetry;
use std::rc::Rc;
use strata_gc::WriteBarrier;

// =============================================================================
// Link
// =============================================================================

/// Check whether the chain already holds a stub equal to `description`.
pub fn has_same_stub(script: &IcScript, entry: &IcEntry, description: &StubDescription) -> bool {
    let space = script.space();
    let mut cursor = entry.first_stub();
    while let StubRef::Specialized(id) = cursor {
        let Some(stub) = space.get(id) else {
            break;
        };
        if stub.same_stub_as(description.cache_kind, description.template, &description.data) {
            return true;
        }
        cursor = stub.next();
    }
    false
}

/// Prepend a compiled stub and count it as attached.
pub(crate) fn link_stub(
    script: &IcScript,
    entry: &IcEntry,
    code: JitCode,
    description: StubDescription,
) -> StubId {
    let stub = SpecializedStub {
        code: StubCode::Live(Rc::new(code)),
        data: Rc::new(description.data),
        cache_kind: description.cache_kind,
        template: description.template,
        makes_gc_calls: description.makes_gc_calls,
        next: entry.first_stub(),
    };
    let id = script.space_mut().allocate(stub);
    entry.set_first_stub(StubRef::Specialized(id));
    entry.fallback_stub().update_state(IcState::track_attached);
    id
}

// =============================================================================
// Walk
// =============================================================================

/// Cursor over an entry's specialized stubs that tolerates unlinking the
/// current node.
///
/// After [`ChainIter::unlink`], [`ChainIter::advance`] keeps the previous
/// node and continues from the removed node's `next`, captured before the
/// unlink.
pub struct ChainIter<'a> {
    script: &'a IcScript,
    entry: &'a IcEntry,
    prev: Option<StubId>,
    current: StubRef,
    unlinked: bool,
    next_after_unlink: StubRef,
}

impl<'a> ChainIter<'a> {
    /// Start at the head of `entry`'s chain.
    pub fn new(script: &'a IcScript, entry: &'a IcEntry) -> Self {
        Self {
            script,
            entry,
            prev: None,
            current: entry.first_stub(),
            unlinked: false,
            next_after_unlink: StubRef::Fallback,
        }
    }

    /// Current position.
    #[inline]
    pub fn current(&self) -> StubRef {
        self.current
    }

    /// Predecessor of the current node, `None` at the head.
    #[inline]
    pub fn prev(&self) -> Option<StubId> {
        self.prev
    }

    /// Check whether the walk reached the fallback.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.current.is_fallback()
    }

    /// Check whether the current node was unlinked.
    #[inline]
    pub fn was_unlinked(&self) -> bool {
        self.unlinked
    }

    /// Move to the next node. No-op at the end.
    pub fn advance(&mut self) {
        if self.unlinked {
            self.current = self.next_after_unlink;
            self.unlinked = false;
            return;
        }
        let StubRef::Specialized(id) = self.current else {
            return;
        };
        let next = self.script.space().get(id).map_or(StubRef::Fallback, SpecializedStub::next);
        self.prev = Some(id);
        self.current = next;
    }

    /// Unlink the current node.
    ///
    /// # Panics
    ///
    /// Panics when positioned on the fallback or on an already unlinked node.
    pub fn unlink(&mut self, barrier: &mut dyn WriteBarrier) {
        assert!(!self.unlinked, "stub unlinked twice through one cursor");
        let StubRef::Specialized(id) = self.current else {
            panic!("cannot unlink the {} fallback stub", self.entry.kind());
        };
        self.next_after_unlink = self.script.space().get(id).map_or(StubRef::Fallback, SpecializedStub::next);
        unlink_stub(self.script, self.entry, self.prev, id, barrier);
        self.unlinked = true;
    }
}

// =============================================================================
// Unlink
// =============================================================================

/// Remove stub `id` from `entry`'s chain. `prev` is its predecessor, or
/// `None` when it is the head.
///
/// Returns `false`, and changes nothing, if `id` is not linked or `prev` is
/// not its predecessor.
pub fn unlink_stub(
    script: &IcScript,
    entry: &IcEntry,
    prev: Option<StubId>,
    id: StubId,
    barrier: &mut dyn WriteBarrier,
) -> bool {
    let (next, makes_gc_calls) = {
        let space = script.space();
        if !space.is_linked(id) {
            return false;
        }
        match space.get(id) {
            Some(stub) => (stub.next(), stub.makes_gc_calls()),
            None => return false,
        }
    };

    match prev {
        None => {
            if entry.first_stub() != StubRef::Specialized(id) {
                return false;
            }
            entry.set_first_stub(next);
        }
        Some(prev) => {
            let mut space = script.space_mut();
            match space.get_linked_mut(prev) {
                Some(prev_stub) if prev_stub.next == StubRef::Specialized(id) => {
                    prev_stub.next = next;
                }
                _ => return false,
            }
        }
    }
    entry.fallback_stub().update_state(IcState::track_unlinked_stub);

    {
        let space = script.space();
        if let Some(stub) = space.get(id) {
            barrier.pre_write(stub);
        }
    }

    let poison = script.config().poison_unlinked_stubs && !makes_gc_calls;
    script.space_mut().retire(id, poison);

    global_ic_telemetry().record_unlinked();
    log::debug!(
        target: super::IC_LOG_TARGET,
        "Unlinked {} stub {:?} at offset {}",
        entry.kind(),
        id,
        entry.offset()
    );
    true
}

/// Unlink every specialized stub of `entry`. Returns the number removed.
pub fn discard_stubs(script: &IcScript, entry: &IcEntry, barrier: &mut dyn WriteBarrier) -> usize {
    let mut cursor = ChainIter::new(script, entry);
    let mut removed = 0;
    while !cursor.at_end() {
        cursor.unlink(barrier);
        cursor.advance();
        removed += 1;
    }
    debug_assert!(entry.first_stub().is_fallback());
    debug_assert_eq!(entry.state().num_optimized_stubs(), 0);
    removed
}
