//! Cache entries and the per-script IC table.
//!
//! An [`IcScript`] owns one [`IcEntry`] per IC-bearing bytecode location,
//! in bytecode order, plus the [`StubSpace`] all of their specialized stubs
//! are allocated from. Entries are looked up by offset with a binary search.
//!
//! The script is used through `&IcScript`: a fallback handler may run user
//! code that re-enters another (or the same) entry of the script, so every
//! mutable part sits behind `Cell` / `RefCell`, and no borrow is held across
//! a call into the runtime.

use super::IcConfig;
use super::chain;
use super::kind::FallbackKind;
use super::op::{IcSite, Op, Operand};
use super::space::StubSpace;
use super::state::{IcMode, IcState};
use super::stub::{FallbackPayload, FallbackStub, StubId, StubRef};
use super::trampoline::trampolines;
use std::cell::{Cell, Ref, RefCell, RefMut};
use strata_core::{StrataError, StrataResult};
use strata_gc::WriteBarrier;
use strata_runtime::{InitialHeap, ObjectOps};

// =============================================================================
// Entry
// =============================================================================

/// One IC-bearing bytecode location.
#[derive(Debug)]
pub struct IcEntry {
    offset: u32,
    op: Op,
    operand: Operand,
    first: Cell<StubRef>,
    fallback: FallbackStub,
}

impl IcEntry {
    /// Bytecode offset.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Operation at the offset.
    #[inline]
    pub fn op(&self) -> Op {
        self.op
    }

    /// Immediate operand.
    #[inline]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Fallback kind.
    #[inline]
    pub fn kind(&self) -> FallbackKind {
        self.fallback.kind()
    }

    /// Head of the chain; the fallback itself when nothing is attached.
    #[inline]
    pub fn first_stub(&self) -> StubRef {
        self.first.get()
    }

    pub(crate) fn set_first_stub(&self, stub: StubRef) {
        self.first.set(stub);
    }

    /// The chain's terminal stub.
    #[inline]
    pub fn fallback_stub(&self) -> &FallbackStub {
        &self.fallback
    }

    /// Copy of the attachment state.
    #[inline]
    pub fn state(&self) -> IcState {
        self.fallback.state()
    }

    /// Current mode.
    #[inline]
    pub fn mode(&self) -> IcMode {
        self.fallback.state().mode()
    }
}

// =============================================================================
// Script
// =============================================================================

/// Per-script summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcScriptStats {
    /// Number of entries.
    pub entries: usize,
    /// Entries still Specialized.
    pub specialized: usize,
    /// Entries in Megamorphic mode.
    pub megamorphic: usize,
    /// Entries in Generic mode.
    pub generic: usize,
    /// Specialized stubs linked across all chains.
    pub attached_stubs: usize,
    /// Unlinked stubs awaiting purge.
    pub retired_stubs: usize,
}

/// The IC table of one compiled script.
#[derive(Debug)]
pub struct IcScript {
    entries: Vec<IcEntry>,
    space: RefCell<StubSpace>,
    config: IcConfig,
    has_optimized_code: Cell<bool>,
    baseline_fallbacks: Cell<u32>,
}

impl IcScript {
    /// Build the table for `sites` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the trampoline table has not been initialized.
    pub fn new(sites: &[IcSite], rt: &mut dyn ObjectOps) -> StrataResult<Self> {
        Self::with_config(sites, IcConfig::default(), rt)
    }

    /// Build the table for `sites` with `config`.
    ///
    /// `rt` allocates the payload templates that must exist from the start
    /// (the `Rest` array template).
    ///
    /// # Panics
    ///
    /// Panics if the trampoline table has not been initialized.
    pub fn with_config(
        sites: &[IcSite],
        config: IcConfig,
        rt: &mut dyn ObjectOps,
    ) -> StrataResult<Self> {
        let entries = Self::init_ic_entries(sites, &config, rt)?;
        log::debug!(
            target: super::IC_LOG_TARGET,
            "Created IC script with {} entries from {} sites",
            entries.len(),
            sites.len()
        );
        Ok(Self {
            entries,
            space: RefCell::new(StubSpace::new()),
            config,
            has_optimized_code: Cell::new(false),
            baseline_fallbacks: Cell::new(0),
        })
    }

    fn init_ic_entries(
        sites: &[IcSite],
        config: &IcConfig,
        rt: &mut dyn ObjectOps,
    ) -> StrataResult<Vec<IcEntry>> {
        let table = trampolines();
        let mut entries = Vec::with_capacity(sites.len());
        let mut last_offset: Option<u32> = None;

        for site in sites {
            if last_offset.is_some_and(|last| site.offset <= last) {
                return Err(StrataError::internal(format!(
                    "IC site offsets must increase: {} after {}",
                    site.offset,
                    last_offset.unwrap_or_default()
                )));
            }
            last_offset = Some(site.offset);

            let Some(kind) = site.op.fallback_kind() else {
                continue;
            };
            if site.operand.kind() != site.op.operand_kind() {
                return Err(StrataError::internal(format!(
                    "{} at offset {} expects a {:?} operand, got {:?}",
                    site.op,
                    site.offset,
                    site.op.operand_kind(),
                    site.operand
                )));
            }

            let payload = match kind {
                FallbackKind::NewArray => FallbackPayload::NewArray { template: None },
                FallbackKind::NewObject => FallbackPayload::NewObject { template: None },
                FallbackKind::Rest => FallbackPayload::Rest {
                    template: rt.new_array(0, InitialHeap::Tenured)?,
                },
                _ => FallbackPayload::None,
            };

            let index = entries.len() as u32;
            entries.push(IcEntry {
                offset: site.offset,
                op: site.op,
                operand: site.operand.clone(),
                first: Cell::new(StubRef::Fallback),
                fallback: FallbackStub::new(
                    kind,
                    index,
                    table.get(kind),
                    IcState::new(config),
                    payload,
                ),
            });
        }
        Ok(entries)
    }

    /// Configuration the script was built with.
    #[inline]
    pub fn config(&self) -> &IcConfig {
        &self.config
    }

    /// All entries in bytecode order.
    #[inline]
    pub fn entries(&self) -> &[IcEntry] {
        &self.entries
    }

    /// Entry `index`.
    #[inline]
    pub fn entry(&self, index: usize) -> Option<&IcEntry> {
        self.entries.get(index)
    }

    /// Entry at bytecode `offset`.
    pub fn entry_for_offset(&self, offset: u32) -> Option<&IcEntry> {
        self.entries
            .binary_search_by_key(&offset, IcEntry::offset)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared view of the stub arena.
    ///
    /// Do not hold the returned guard across a call that may re-enter.
    pub fn space(&self) -> Ref<'_, StubSpace> {
        self.space.borrow()
    }

    pub(crate) fn space_mut(&self) -> RefMut<'_, StubSpace> {
        self.space.borrow_mut()
    }

    /// Specialized stubs of `entry`, head first.
    pub fn stub_ids(&self, entry: &IcEntry) -> Vec<StubId> {
        let space = self.space();
        let mut ids = Vec::new();
        let mut cursor = entry.first_stub();
        while let StubRef::Specialized(id) = cursor {
            ids.push(id);
            cursor = space.get(id).map_or(StubRef::Fallback, |stub| stub.next());
        }
        ids
    }

    /// Number of specialized stubs in `entry`'s chain.
    pub fn chain_len(&self, entry: &IcEntry) -> usize {
        self.stub_ids(entry).len()
    }

    // -------------------------------------------------------------------------
    // Optimized tier
    // -------------------------------------------------------------------------

    /// Whether optimized code exists for the script.
    #[inline]
    pub fn has_optimized_code(&self) -> bool {
        self.has_optimized_code.get()
    }

    /// Record whether optimized code exists.
    pub fn set_has_optimized_code(&self, value: bool) {
        self.has_optimized_code.set(value);
    }

    /// Fallback hits on entries consumed by the optimizing tier.
    #[inline]
    pub fn baseline_fallbacks(&self) -> u32 {
        self.baseline_fallbacks.get()
    }

    /// Count one such hit.
    pub fn note_baseline_fallback(&self) {
        self.baseline_fallbacks
            .set(self.baseline_fallbacks.get().saturating_add(1));
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Summary of entry modes and stub counts.
    pub fn stats(&self) -> IcScriptStats {
        let space = self.space();
        let mut stats = IcScriptStats {
            entries: self.entries.len(),
            attached_stubs: space.linked_count(),
            retired_stubs: space.retired_count(),
            ..IcScriptStats::default()
        };
        for entry in &self.entries {
            match entry.mode() {
                IcMode::Specialized => stats.specialized += 1,
                IcMode::Megamorphic => stats.megamorphic += 1,
                IcMode::Generic => stats.generic += 1,
            }
        }
        stats
    }

    /// Reclaim retired stubs. Only call at a collector safe point, when no
    /// frame can still be running their code.
    pub fn purge_retired_stubs(&self) -> usize {
        let reclaimed = self.space_mut().purge();
        if reclaimed > 0 {
            log::debug!(target: super::IC_LOG_TARGET, "Purged {reclaimed} retired stubs");
        }
        reclaimed
    }

    /// Drop every stub and return all entries to a fresh state. Used when
    /// the script is rebuilt.
    pub fn reset(&self, barrier: &mut dyn WriteBarrier) {
        for entry in &self.entries {
            chain::discard_stubs(self, entry, barrier);
            entry.fallback_stub().update_state(IcState::reset);
            entry.fallback_stub().reset_entered_count();
        }
        self.baseline_fallbacks.set(0);
    }
}
