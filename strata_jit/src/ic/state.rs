//! Attachment state machine.
//!
//! Every fallback stub carries an [`IcState`]. It decides whether the
//! dispatcher may still try to attach specialized stubs, and when the entry
//! gives up on specialization.
//!
//! ```text
//!   Specialized ──(too many stubs)──► Megamorphic ──(any limit)──► Generic
//!        │                                                            ▲
//!        └───────────────────(too many failures)──────────────────────┘
//! ```
//!
//! Transitions only move right. Each one resets the failure counter and
//! requires the caller to discard every attached stub.

use super::IcConfig;
use std::fmt;

// =============================================================================
// Mode
// =============================================================================

/// Specialization mode of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum IcMode {
    /// Attach shape-specific stubs.
    #[default]
    Specialized = 0,
    /// Attach megamorphic stubs only.
    Megamorphic = 1,
    /// Never attach again.
    Generic = 2,
}

impl fmt::Display for IcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Specialized => "Specialized",
            Self::Megamorphic => "Megamorphic",
            Self::Generic => "Generic",
        })
    }
}

// =============================================================================
// State
// =============================================================================

/// Per-entry attachment bookkeeping.
///
/// Small and `Copy` so it can live in a `Cell`: the dispatcher reads it,
/// updates a copy and writes it back, never holding a borrow across a call
/// that may re-enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcState {
    mode: IcMode,
    num_optimized_stubs: u8,
    num_failures: u8,
    used_by_transpiler: bool,
    max_optimized_stubs: u8,
    base_max_failures: u8,
    failures_per_stub: u8,
}

impl IcState {
    /// Fresh state with the limits of `config`.
    pub fn new(config: &IcConfig) -> Self {
        Self {
            mode: IcMode::Specialized,
            num_optimized_stubs: 0,
            num_failures: 0,
            used_by_transpiler: false,
            max_optimized_stubs: config.max_optimized_stubs,
            base_max_failures: config.base_max_failures,
            failures_per_stub: config.failures_per_stub,
        }
    }

    /// Current mode.
    #[inline]
    pub fn mode(&self) -> IcMode {
        self.mode
    }

    /// Specialized stubs currently attached.
    #[inline]
    pub fn num_optimized_stubs(&self) -> u8 {
        self.num_optimized_stubs
    }

    /// Consecutive failed attach attempts.
    #[inline]
    pub fn num_failures(&self) -> u8 {
        self.num_failures
    }

    /// Failure budget at the current stub count.
    #[inline]
    pub fn max_failures(&self) -> u32 {
        u32::from(self.base_max_failures)
            + u32::from(self.failures_per_stub) * u32::from(self.num_optimized_stubs)
    }

    /// Move forward if a limit was reached.
    ///
    /// Returns `true` on a transition; the caller must then discard every
    /// specialized stub of the entry.
    pub fn maybe_transition(&mut self) -> bool {
        if self.mode == IcMode::Generic {
            return false;
        }
        let too_many_failures = u32::from(self.num_failures) >= self.max_failures();
        if self.num_optimized_stubs < self.max_optimized_stubs && !too_many_failures {
            return false;
        }
        self.mode = if too_many_failures || self.mode == IcMode::Megamorphic {
            IcMode::Generic
        } else {
            IcMode::Megamorphic
        };
        self.num_failures = 0;
        true
    }

    /// Check whether attaching is still allowed.
    #[inline]
    pub fn can_attach_stub(&self) -> bool {
        self.mode != IcMode::Generic
    }

    /// Record a linked stub.
    #[inline]
    pub fn track_attached(&mut self) {
        self.num_optimized_stubs = self.num_optimized_stubs.saturating_add(1);
        self.num_failures = 0;
    }

    /// Record an attempt that linked nothing.
    #[inline]
    pub fn track_not_attached(&mut self) {
        self.num_failures = self.num_failures.saturating_add(1);
    }

    /// Record an unlinked stub.
    #[inline]
    pub fn track_unlinked_stub(&mut self) {
        debug_assert!(self.num_optimized_stubs > 0, "unlink with no attached stubs");
        self.num_optimized_stubs = self.num_optimized_stubs.saturating_sub(1);
    }

    /// Check for recorded failures.
    #[inline]
    pub fn has_failures(&self) -> bool {
        self.num_failures != 0
    }

    /// Check whether a new stub would be the first specialization.
    #[inline]
    pub fn new_stub_is_first_stub(&self) -> bool {
        self.mode == IcMode::Specialized && self.num_optimized_stubs == 0
    }

    /// Whether the optimizing tier consumed this entry's stubs.
    #[inline]
    pub fn used_by_transpiler(&self) -> bool {
        self.used_by_transpiler
    }

    /// Mark the entry as consumed by the optimizing tier.
    #[inline]
    pub fn set_used_by_transpiler(&mut self) {
        self.used_by_transpiler = true;
    }

    /// Back to a fresh Specialized state. Only for rebuilding a script.
    pub fn reset(&mut self) {
        self.mode = IcMode::Specialized;
        self.num_optimized_stubs = 0;
        self.num_failures = 0;
        self.used_by_transpiler = false;
    }
}
