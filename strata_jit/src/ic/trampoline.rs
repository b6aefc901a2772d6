//! Shared fallback trampolines.
//!
//! Every fallback stub of a given kind enters the dispatcher through the
//! same code. The table is built once at startup by [`init_trampolines`] and
//! is read-only afterwards. Trampoline code is process-wide, so fallback
//! stubs never report it as an owned edge.

use super::kind::FallbackKind;
use std::sync::OnceLock;
use strata_gc::CodeId;

/// First code id handed to trampolines. Stub compilers allocate below it.
pub const TRAMPOLINE_CODE_BASE: u64 = 1 << 48;

const TRAMPOLINE_SIZE: u32 = 64;
const BAILOUT_RETURN_DELTA: u32 = 40;

/// Resume points used by bailouts that re-enter a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BailoutReturn {
    /// Named read.
    GetProp,
    /// `super.name` read.
    GetPropSuper,
    /// Named or keyed write.
    SetProp,
    /// Keyed read.
    GetElem,
    /// `super[key]` read.
    GetElemSuper,
    /// Non-constructing call.
    Call,
    /// Constructing call.
    New,
}

impl BailoutReturn {
    /// Resume kind for a fallback, if bailouts can land in it.
    pub const fn for_kind(kind: FallbackKind) -> Option<Self> {
        Some(match kind {
            FallbackKind::GetProp => Self::GetProp,
            FallbackKind::GetPropSuper => Self::GetPropSuper,
            FallbackKind::SetProp | FallbackKind::SetElem => Self::SetProp,
            FallbackKind::GetElem => Self::GetElem,
            FallbackKind::GetElemSuper => Self::GetElemSuper,
            FallbackKind::Call | FallbackKind::SpreadCall => Self::Call,
            FallbackKind::CallConstructing | FallbackKind::SpreadCallConstructing => Self::New,
            _ => return None,
        })
    }
}

/// Fallback entry code for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trampoline {
    kind: FallbackKind,
    code: CodeId,
    name: &'static str,
    code_offset: u32,
    bailout_return: Option<(BailoutReturn, u32)>,
}

impl Trampoline {
    fn build(kind: FallbackKind) -> Self {
        let code_offset = kind.index() as u32 * TRAMPOLINE_SIZE;
        Self {
            kind,
            code: CodeId(TRAMPOLINE_CODE_BASE + kind.index() as u64),
            name: kind.name(),
            code_offset,
            bailout_return: BailoutReturn::for_kind(kind)
                .map(|ret| (ret, code_offset + BAILOUT_RETURN_DELTA)),
        }
    }

    /// Kind served by this trampoline.
    #[inline]
    pub fn kind(&self) -> FallbackKind {
        self.kind
    }

    /// Shared code identity.
    #[inline]
    pub fn code(&self) -> CodeId {
        self.code
    }

    /// Symbolic name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Offset of the trampoline in the shared code block.
    #[inline]
    pub fn code_offset(&self) -> u32 {
        self.code_offset
    }

    /// Bailout resume kind and offset.
    #[inline]
    pub fn bailout_return(&self) -> Option<(BailoutReturn, u32)> {
        self.bailout_return
    }
}

/// One trampoline per fallback kind.
#[derive(Debug)]
pub struct TrampolineTable {
    entries: [Trampoline; FallbackKind::COUNT],
}

impl TrampolineTable {
    fn build() -> Self {
        Self {
            entries: std::array::from_fn(|i| Trampoline::build(FallbackKind::ALL[i])),
        }
    }

    /// Trampoline for `kind`.
    #[inline]
    pub fn get(&self, kind: FallbackKind) -> &Trampoline {
        &self.entries[kind.index()]
    }

    /// Bailout resume offset for `kind`.
    pub fn bailout_return_offset(&self, kind: FallbackKind) -> Option<u32> {
        self.get(kind).bailout_return.map(|(_, offset)| offset)
    }

    /// Every trampoline, in kind order.
    pub fn iter(&self) -> impl Iterator<Item = &Trampoline> {
        self.entries.iter()
    }
}

static TRAMPOLINES: OnceLock<TrampolineTable> = OnceLock::new();

/// Build the table. Later calls return the existing one.
pub fn init_trampolines() -> &'static TrampolineTable {
    TRAMPOLINES.get_or_init(|| {
        log::debug!(target: super::IC_LOG_TARGET, "Initialized {} fallback trampolines", FallbackKind::COUNT);
        TrampolineTable::build()
    })
}

/// The table, if initialized.
#[inline]
pub fn try_trampolines() -> Option<&'static TrampolineTable> {
    TRAMPOLINES.get()
}

/// The table.
///
/// # Panics
///
/// Panics if [`init_trampolines`] has not run.
pub fn trampolines() -> &'static TrampolineTable {
    match TRAMPOLINES.get() {
        Some(table) => table,
        None => panic!("fallback trampolines used before init_trampolines()"),
    }
}
