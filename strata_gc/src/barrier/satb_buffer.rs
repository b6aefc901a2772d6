//! Snapshot-at-the-beginning (SATB) capture buffers.
//!
//! While an incremental mark is in progress, removing an edge from the heap
//! graph could hide a cell the marker has not reached yet. The SATB barrier
//! records the **old** target of every removed edge so the marker still sees
//! everything that was reachable when marking started.
//!
//! # Architecture
//!
//! ```text
//!  mutator                                       marker
//!  ───────                                       ──────
//!  unlink stub ─► pre_write(stub)
//!                   │ trace stub edges
//!                   ▼
//!              ┌───────────┐  full   ┌───────────┐  drain  ┌──────────┐
//!              │ SatbBuffer│ ──────► │ SatbQueue │ ──────► │ re-gray  │
//!              │ [cells]   │  flush  │ [buffers] │         │  cells   │
//!              └───────────┘         └───────────┘         └──────────┘
//!
//!  SatbMarkingState: Idle ──► Marking ──► Remarking ──► Idle
//! ```
//!
//! When the state is `Idle` the barrier is one atomic load and a branch.

use crate::trace::CellRef;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

// =============================================================================
// Constants
// =============================================================================

/// Entries per mutator buffer before it is flushed to the queue.
const BUFFER_CAPACITY: usize = 256;

// =============================================================================
// SatbMarkingState
// =============================================================================

/// Marking phase identifiers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingPhase {
    /// No incremental mark in progress. Barrier inactive.
    Idle = 0,
    /// Marking in progress. Barrier captures removed edges.
    Marking = 1,
    /// Final remark. Barrier still active while buffers drain.
    Remarking = 2,
}

impl MarkingPhase {
    /// Convert from raw u8 value.
    #[inline]
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Marking,
            2 => Self::Remarking,
            _ => Self::Idle,
        }
    }
}

/// Shared marking phase that gates the barrier.
///
/// ```text
/// Idle ──start_marking──► Marking ──start_remark──► Remarking ──finish──► Idle
/// ```
pub struct SatbMarkingState {
    state: AtomicU8,
}

impl SatbMarkingState {
    /// Create a new state (Idle).
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(MarkingPhase::Idle as u8),
        }
    }

    /// Check whether the barrier should capture.
    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::Relaxed) != MarkingPhase::Idle as u8
    }

    /// Current phase.
    #[inline]
    pub fn phase(&self) -> MarkingPhase {
        MarkingPhase::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Enter the marking phase.
    ///
    /// # Panics
    ///
    /// Panics if not currently Idle.
    pub fn start_marking(&self) {
        let prev = self.state.compare_exchange(
            MarkingPhase::Idle as u8,
            MarkingPhase::Marking as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        assert_eq!(
            prev,
            Ok(MarkingPhase::Idle as u8),
            "Can only start marking from Idle state"
        );
    }

    /// Enter the remark phase.
    ///
    /// # Panics
    ///
    /// Panics if not currently Marking.
    pub fn start_remark(&self) {
        let prev = self.state.compare_exchange(
            MarkingPhase::Marking as u8,
            MarkingPhase::Remarking as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        assert_eq!(
            prev,
            Ok(MarkingPhase::Marking as u8),
            "Can only start remark from Marking state"
        );
    }

    /// Return to Idle from either active phase.
    pub fn finish(&self) {
        self.state.store(MarkingPhase::Idle as u8, Ordering::Release);
    }
}

impl Default for SatbMarkingState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SatbBuffer
// =============================================================================

/// Mutator-local buffer of captured cells.
pub struct SatbBuffer {
    entries: Vec<CellRef>,
}

impl SatbBuffer {
    /// Create an empty buffer with preallocated capacity.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(BUFFER_CAPACITY),
        }
    }

    /// Record a captured cell. Returns `true` once the buffer is full.
    #[inline]
    pub fn push(&mut self, cell: CellRef) -> bool {
        self.entries.push(cell);
        self.entries.len() >= BUFFER_CAPACITY
    }

    /// Check whether the buffer is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= BUFFER_CAPACITY
    }

    /// Check whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buffered cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move all entries into `queue`.
    pub fn flush(&mut self, queue: &SatbQueue) {
        if !self.entries.is_empty() {
            let entries = std::mem::replace(&mut self.entries, Vec::with_capacity(BUFFER_CAPACITY));
            queue.push_buffer(entries);
        }
    }

    /// Iterate buffered cells.
    pub fn iter(&self) -> impl Iterator<Item = &CellRef> {
        self.entries.iter()
    }

    /// Buffer capacity.
    #[inline]
    #[must_use]
    pub const fn capacity() -> usize {
        BUFFER_CAPACITY
    }
}

impl Default for SatbBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SatbQueue
// =============================================================================

/// Shared queue of flushed buffers, drained by the marker.
pub struct SatbQueue {
    buffers: Mutex<Vec<Vec<CellRef>>>,
}

impl SatbQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue a flushed buffer.
    pub fn push_buffer(&self, buffer: Vec<CellRef>) {
        if !buffer.is_empty() {
            self.buffers.lock().push(buffer);
        }
    }

    /// Drain every queued cell into one list.
    pub fn drain_all(&self) -> Vec<CellRef> {
        let mut guard = self.buffers.lock();
        let total = guard.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for buffer in guard.drain(..) {
            out.extend(buffer);
        }
        out
    }

    /// Check whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }

    /// Total queued cells across buffers.
    pub fn total_entries(&self) -> usize {
        self.buffers.lock().iter().map(Vec::len).sum()
    }

    /// Number of queued buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl Default for SatbQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Barrier Function
// =============================================================================

/// Capture `old` if marking is active.
///
/// Call **before** the edge to `old` is removed.
#[inline(always)]
pub fn satb_write_barrier(
    old: CellRef,
    state: &SatbMarkingState,
    buffer: &mut SatbBuffer,
    queue: &SatbQueue,
) {
    if !state.is_active() {
        return;
    }
    if buffer.push(old) {
        buffer.flush(queue);
    }
}
