//! Pre-write barriers for edge removal.
//!
//! Structures that live outside the object heap but own GC edges (stub
//! chains, template slots) call [`WriteBarrier::pre_write`] once for every
//! holder they detach, **before** the detach becomes visible. The barrier
//! decides what the collector needs to hear about: nothing when no
//! incremental mark is running, the holder's edges when one is.

pub mod satb_buffer;


pub use satb_buffer::{
    MarkingPhase, SatbBuffer, SatbMarkingState, SatbQueue, satb_write_barrier,
};

use crate::trace::{CellRef, Trace, Tracer};
use std::sync::Arc;

/// Notification hook for removed edges.
pub trait WriteBarrier {
    /// `holder` is about to lose every edge it owns.
    fn pre_write(&mut self, holder: &dyn Trace);
}

/// Barrier for configurations without incremental marking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBarrier;

impl WriteBarrier for NoBarrier {
    #[inline]
    fn pre_write(&mut self, _holder: &dyn Trace) {}
}

// =============================================================================
// SATB Barrier
// =============================================================================

/// Barrier that feeds removed edges into the SATB queue while marking.
pub struct SatbBarrier {
    state: Arc<SatbMarkingState>,
    queue: Arc<SatbQueue>,
    buffer: SatbBuffer,
    holders_seen: u64,
}

impl SatbBarrier {
    /// Create a barrier bound to a marking state and queue.
    #[must_use]
    pub fn new(state: Arc<SatbMarkingState>, queue: Arc<SatbQueue>) -> Self {
        Self {
            state,
            queue,
            buffer: SatbBuffer::new(),
            holders_seen: 0,
        }
    }

    /// Push buffered cells to the queue.
    pub fn flush(&mut self) {
        self.buffer.flush(&self.queue);
    }

    /// Holders passed to `pre_write` so far, whether or not marking was on.
    #[must_use]
    pub fn holders_seen(&self) -> u64 {
        self.holders_seen
    }

    /// Cells waiting in the local buffer.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

struct SatbCapture<'a> {
    state: &'a SatbMarkingState,
    buffer: &'a mut SatbBuffer,
    queue: &'a SatbQueue,
}

impl Tracer for SatbCapture<'_> {
    fn trace_cell(&mut self, cell: CellRef, _name: &'static str) {
        satb_write_barrier(cell, self.state, self.buffer, self.queue);
    }
}

impl WriteBarrier for SatbBarrier {
    fn pre_write(&mut self, holder: &dyn Trace) {
        self.holders_seen += 1;
        if !self.state.is_active() {
            return;
        }
        let mut capture = SatbCapture {
            state: &self.state,
            buffer: &mut self.buffer,
            queue: &self.queue,
        };
        holder.trace(&mut capture);
    }
}

// =============================================================================
// Counting Barrier
// =============================================================================

/// Barrier that records every holder and edge it sees.
#[derive(Debug, Default)]
pub struct CountingBarrier {
    /// Number of `pre_write` calls.
    pub holders: usize,
    /// Every edge reported by those holders.
    pub edges: Vec<(CellRef, &'static str)>,
}

impl CountingBarrier {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tracer for CountingBarrier {
    fn trace_cell(&mut self, cell: CellRef, name: &'static str) {
        self.edges.push((cell, name));
    }
}

impl WriteBarrier for CountingBarrier {
    fn pre_write(&mut self, holder: &dyn Trace) {
        self.holders += 1;
        holder.trace(self);
    }
}
