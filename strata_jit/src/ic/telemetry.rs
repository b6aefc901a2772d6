//! Process-wide IC counters.
//!
//! Counters are relaxed atomics: they are diagnostics and never feed back
//! into attach decisions. Per-entry decisions live in [`IcState`](super::IcState).

use std::sync::atomic::{AtomicU64, Ordering};

/// Attach, unlink and dispatch counters.
#[derive(Debug)]
pub struct IcTelemetry {
    attached: AtomicU64,
    not_attached: AtomicU64,
    deferred_attached: AtomicU64,
    duplicates: AtomicU64,
    unlinked: AtomicU64,
    to_megamorphic: AtomicU64,
    to_generic: AtomicU64,
    chain_hits: AtomicU64,
    chain_misses: AtomicU64,
    fallback_hits: AtomicU64,
}

impl IcTelemetry {
    /// Zeroed counters.
    pub const fn new() -> Self {
        Self {
            attached: AtomicU64::new(0),
            not_attached: AtomicU64::new(0),
            deferred_attached: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            unlinked: AtomicU64::new(0),
            to_megamorphic: AtomicU64::new(0),
            to_generic: AtomicU64::new(0),
            chain_hits: AtomicU64::new(0),
            chain_misses: AtomicU64::new(0),
            fallback_hits: AtomicU64::new(0),
        }
    }

    /// Record a linked stub.
    #[inline]
    pub fn record_attached(&self) {
        self.attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an attempt that linked nothing.
    #[inline]
    pub fn record_not_attached(&self) {
        self.not_attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an add-slot stub linked after a deferred write.
    #[inline]
    pub fn record_deferred_attached(&self) {
        self.deferred_attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a suppressed duplicate.
    #[inline]
    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an unlinked stub.
    #[inline]
    pub fn record_unlinked(&self) {
        self.unlinked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a Specialized → Megamorphic transition.
    #[inline]
    pub fn record_to_megamorphic(&self) {
        self.to_megamorphic.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a transition into Generic.
    #[inline]
    pub fn record_to_generic(&self) {
        self.to_generic.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a specialized stub hit.
    #[inline]
    pub fn record_chain_hit(&self) {
        self.chain_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a specialized stub miss.
    #[inline]
    pub fn record_chain_miss(&self) {
        self.chain_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fallback entry.
    #[inline]
    pub fn record_fallback_hit(&self) {
        self.fallback_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    pub fn snapshot(&self) -> IcTelemetrySnapshot {
        IcTelemetrySnapshot {
            attached: self.attached.load(Ordering::Relaxed),
            not_attached: self.not_attached.load(Ordering::Relaxed),
            deferred_attached: self.deferred_attached.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            unlinked: self.unlinked.load(Ordering::Relaxed),
            to_megamorphic: self.to_megamorphic.load(Ordering::Relaxed),
            to_generic: self.to_generic.load(Ordering::Relaxed),
            chain_hits: self.chain_hits.load(Ordering::Relaxed),
            chain_misses: self.chain_misses.load(Ordering::Relaxed),
            fallback_hits: self.fallback_hits.load(Ordering::Relaxed),
        }
    }
}

impl Default for IcTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcTelemetrySnapshot {
    /// Stubs linked.
    pub attached: u64,
    /// Attempts that linked nothing.
    pub not_attached: u64,
    /// Add-slot stubs linked after a deferred write.
    pub deferred_attached: u64,
    /// Suppressed duplicates.
    pub duplicates: u64,
    /// Stubs unlinked.
    pub unlinked: u64,
    /// Transitions into Megamorphic.
    pub to_megamorphic: u64,
    /// Transitions into Generic.
    pub to_generic: u64,
    /// Specialized stub hits.
    pub chain_hits: u64,
    /// Specialized stub misses.
    pub chain_misses: u64,
    /// Fallback entries.
    pub fallback_hits: u64,
}

impl IcTelemetrySnapshot {
    /// Counter growth since `earlier`.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            attached: self.attached.saturating_sub(earlier.attached),
            not_attached: self.not_attached.saturating_sub(earlier.not_attached),
            deferred_attached: self.deferred_attached.saturating_sub(earlier.deferred_attached),
            duplicates: self.duplicates.saturating_sub(earlier.duplicates),
            unlinked: self.unlinked.saturating_sub(earlier.unlinked),
            to_megamorphic: self.to_megamorphic.saturating_sub(earlier.to_megamorphic),
            to_generic: self.to_generic.saturating_sub(earlier.to_generic),
            chain_hits: self.chain_hits.saturating_sub(earlier.chain_hits),
            chain_misses: self.chain_misses.saturating_sub(earlier.chain_misses),
            fallback_hits: self.fallback_hits.saturating_sub(earlier.fallback_hits),
        }
    }
}

static GLOBAL_IC_TELEMETRY: IcTelemetry = IcTelemetry::new();

/// Process-wide counters.
#[inline]
pub fn global_ic_telemetry() -> &'static IcTelemetry {
    &GLOBAL_IC_TELEMETRY
}
