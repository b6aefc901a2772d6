//! Stub records.
//!
//! A chain is a sequence of [`SpecializedStub`]s terminated by the entry's
//! [`FallbackStub`]. Specialized stubs live in the script's
//! [`StubSpace`](super::space::StubSpace) and are linked by [`StubRef`];
//! the fallback is stored inline in its entry, so a chain can never lose its
//! terminator.
//!
//! ```text
//!  IcEntry.first ──► Stub#4 ──► Stub#1 ──► Fallback(GetProp)
//!                    (newest)   (oldest)
//! ```

use super::generator::IcInputs;
use super::kind::{CacheKind, FallbackKind};
use super::runtime::IcRuntime;
use super::state::IcState;
use super::trampoline::Trampoline;
use smallvec::SmallVec;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use strata_core::{ObjectRef, PropertyKey, ShapeId, StrataResult, Value};
use strata_gc::{CellRef, CodeId, Trace, Tracer};

// =============================================================================
// Links
// =============================================================================

/// Index of a specialized stub in its script's stub space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StubId(pub(crate) u32);

impl StubId {
    /// Arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A chain link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubRef {
    /// The entry's terminal fallback stub.
    Fallback,
    /// A specialized stub.
    Specialized(StubId),
}

impl StubRef {
    /// Check for the terminal fallback.
    #[inline]
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::Fallback)
    }

    /// Specialized stub id, if any.
    #[inline]
    pub fn specialized(self) -> Option<StubId> {
        match self {
            Self::Specialized(id) => Some(id),
            Self::Fallback => None,
        }
    }
}

// =============================================================================
// Stub Data
// =============================================================================

/// One field of a stub's embedded guard data.
#[derive(Debug, Clone, PartialEq)]
pub enum StubField {
    /// Shape guard.
    Shape(ShapeId),
    /// Object identity guard or holder.
    Object(ObjectRef),
    /// Constant value.
    Value(Value),
    /// Property key.
    Key(PropertyKey),
    /// Slot index.
    Slot(u32),
    /// Raw word (operator tags, counts).
    Word(u64),
}

/// Opaque guard/operation data a stub was compiled against.
///
/// Only the generator that produced it and the code compiled from it read
/// the fields; the IC layer compares, traces and stores it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StubData {
    fields: SmallVec<[StubField; 4]>,
}

impl StubData {
    /// Empty data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder style.
    #[must_use]
    pub fn with(mut self, field: StubField) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a field.
    pub fn push(&mut self, field: StubField) {
        self.fields.push(field);
    }

    /// Field `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&StubField> {
        self.fields.get(index)
    }

    /// Shape stored at `index`.
    pub fn shape(&self, index: usize) -> Option<ShapeId> {
        match self.get(index)? {
            StubField::Shape(shape) => Some(*shape),
            _ => None,
        }
    }

    /// Object stored at `index`.
    pub fn object(&self, index: usize) -> Option<ObjectRef> {
        match self.get(index)? {
            StubField::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Value stored at `index`.
    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.get(index)? {
            StubField::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Key stored at `index`.
    pub fn key(&self, index: usize) -> Option<&PropertyKey> {
        match self.get(index)? {
            StubField::Key(key) => Some(key),
            _ => None,
        }
    }

    /// Slot stored at `index`.
    pub fn slot(&self, index: usize) -> Option<u32> {
        match self.get(index)? {
            StubField::Slot(slot) => Some(*slot),
            _ => None,
        }
    }

    /// Word stored at `index`.
    pub fn word(&self, index: usize) -> Option<u64> {
        match self.get(index)? {
            StubField::Word(word) => Some(*word),
            _ => None,
        }
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check for no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields.
    pub fn iter(&self) -> impl Iterator<Item = &StubField> {
        self.fields.iter()
    }
}

/// Safety: shapes, objects and values embedded as guards are reported;
/// slots and words hold no references.
unsafe impl Trace for StubData {
    fn trace(&self, tracer: &mut dyn Tracer) {
        for field in &self.fields {
            match field {
                StubField::Shape(shape) => tracer.trace_cell(CellRef::Shape(*shape), "stub-shape"),
                StubField::Object(obj) => tracer.trace_cell(CellRef::Object(*obj), "stub-object"),
                StubField::Value(value) => tracer.trace_value(value, "stub-value"),
                StubField::Key(_) | StubField::Slot(_) | StubField::Word(_) => {}
            }
        }
    }
}

// =============================================================================
// Code
// =============================================================================

/// Result of running a compiled stub.
#[derive(Debug, Clone, PartialEq)]
pub enum StubOutcome {
    /// Guards passed; the operation's result.
    Hit(Value),
    /// A guard failed. Nothing was observed or mutated.
    Miss,
}

/// Executable body of a compiled stub.
pub type StubEntry = Rc<dyn Fn(&StubData, &IcInputs, &mut dyn IcRuntime) -> StrataResult<StubOutcome>>;

/// Specialized executable code.
#[derive(Clone)]
pub struct JitCode {
    id: CodeId,
    cache_kind: CacheKind,
    name: &'static str,
    makes_gc_calls: bool,
    entry: StubEntry,
}

impl JitCode {
    /// Wrap a compiled body.
    pub fn new(
        id: CodeId,
        cache_kind: CacheKind,
        name: &'static str,
        makes_gc_calls: bool,
        entry: StubEntry,
    ) -> Self {
        Self {
            id,
            cache_kind,
            name,
            makes_gc_calls,
            entry,
        }
    }

    /// Code identity.
    #[inline]
    pub fn id(&self) -> CodeId {
        self.id
    }

    /// Cache kind the code was compiled for.
    #[inline]
    pub fn cache_kind(&self) -> CacheKind {
        self.cache_kind
    }

    /// Template name the code was compiled from.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the code may call into the runtime.
    #[inline]
    pub fn makes_gc_calls(&self) -> bool {
        self.makes_gc_calls
    }

    /// Run the code.
    pub fn invoke(
        &self,
        data: &StubData,
        inputs: &IcInputs,
        rt: &mut dyn IcRuntime,
    ) -> StrataResult<StubOutcome> {
        (self.entry)(data, inputs, rt)
    }
}

impl fmt::Debug for JitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JitCode")
            .field("id", &self.id)
            .field("cache_kind", &self.cache_kind)
            .field("name", &self.name)
            .field("makes_gc_calls", &self.makes_gc_calls)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Specialized Stub
// =============================================================================

/// Code reference held by a specialized stub.
#[derive(Debug, Clone)]
pub enum StubCode {
    /// Runnable code.
    Live(Rc<JitCode>),
    /// Cleared after unlink; running it is a bug.
    Poisoned(CodeId),
}

/// A specialized stub.
#[derive(Debug, Clone)]
pub struct SpecializedStub {
    pub(crate) code: StubCode,
    pub(crate) data: Rc<StubData>,
    pub(crate) cache_kind: CacheKind,
    pub(crate) template: &'static str,
    pub(crate) makes_gc_calls: bool,
    pub(crate) next: StubRef,
}

impl SpecializedStub {
    /// Live code, `None` once poisoned.
    #[inline]
    pub fn code(&self) -> Option<&Rc<JitCode>> {
        match &self.code {
            StubCode::Live(code) => Some(code),
            StubCode::Poisoned(_) => None,
        }
    }

    /// Code identity, also after poisoning.
    #[inline]
    pub fn code_id(&self) -> CodeId {
        match &self.code {
            StubCode::Live(code) => code.id(),
            StubCode::Poisoned(id) => *id,
        }
    }

    /// Check whether the code reference was poisoned.
    #[inline]
    pub fn is_poisoned(&self) -> bool {
        matches!(self.code, StubCode::Poisoned(_))
    }

    /// Guard data.
    #[inline]
    pub fn data(&self) -> &StubData {
        &self.data
    }

    /// Classification key.
    #[inline]
    pub fn cache_kind(&self) -> CacheKind {
        self.cache_kind
    }

    /// Template the stub was compiled from.
    #[inline]
    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Whether the stub may sit on an in-flight call stack.
    #[inline]
    pub fn makes_gc_calls(&self) -> bool {
        self.makes_gc_calls
    }

    /// Next link.
    #[inline]
    pub fn next(&self) -> StubRef {
        self.next
    }

    /// Same cache kind, template and data as another stub.
    pub fn same_stub_as(&self, cache_kind: CacheKind, template: &str, data: &StubData) -> bool {
        self.cache_kind == cache_kind && self.template == template && *self.data == *data
    }

    pub(crate) fn poison(&mut self) {
        self.code = StubCode::Poisoned(self.code_id());
    }
}

/// Safety: the owned code object and every reference in the guard data are
/// reported. Poisoned stubs no longer own code.
unsafe impl Trace for SpecializedStub {
    fn trace(&self, tracer: &mut dyn Tracer) {
        if let StubCode::Live(code) = &self.code {
            tracer.trace_cell(CellRef::Code(code.id()), "stub-code");
        }
        self.data.trace(tracer);
    }
}

// =============================================================================
// Fallback Stub
// =============================================================================

/// Kind-specific payload of a fallback stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPayload {
    /// No payload.
    None,
    /// Array literal template, created on first execution.
    NewArray {
        /// Tenured template.
        template: Option<ObjectRef>,
    },
    /// Object literal template, created on first execution.
    NewObject {
        /// Tenured template.
        template: Option<ObjectRef>,
    },
    /// Rest array template, created with the entry.
    Rest {
        /// Tenured template.
        template: ObjectRef,
    },
}

impl FallbackPayload {
    /// Template object, if one exists.
    pub fn template(&self) -> Option<ObjectRef> {
        match *self {
            Self::None => None,
            Self::NewArray { template } | Self::NewObject { template } => template,
            Self::Rest { template } => Some(template),
        }
    }
}

/// The terminal, always-correct stub of an entry.
#[derive(Debug)]
pub struct FallbackStub {
    kind: FallbackKind,
    entry_index: u32,
    trampoline: &'static Trampoline,
    entered_count: Cell<u32>,
    state: Cell<IcState>,
    payload: Cell<FallbackPayload>,
}

impl FallbackStub {
    pub(crate) fn new(
        kind: FallbackKind,
        entry_index: u32,
        trampoline: &'static Trampoline,
        state: IcState,
        payload: FallbackPayload,
    ) -> Self {
        Self {
            kind,
            entry_index,
            trampoline,
            entered_count: Cell::new(0),
            state: Cell::new(state),
            payload: Cell::new(payload),
        }
    }

    /// Operation kind.
    #[inline]
    pub fn kind(&self) -> FallbackKind {
        self.kind
    }

    /// Index of the owning entry.
    #[inline]
    pub fn entry_index(&self) -> usize {
        self.entry_index as usize
    }

    /// Shared trampoline code.
    #[inline]
    pub fn trampoline(&self) -> &'static Trampoline {
        self.trampoline
    }

    /// Times the fallback was entered.
    #[inline]
    pub fn entered_count(&self) -> u32 {
        self.entered_count.get()
    }

    pub(crate) fn increment_entered_count(&self) {
        self.entered_count
            .set(self.entered_count.get().saturating_add(1));
    }

    /// Clear the entered counter (optimizing tier).
    pub fn reset_entered_count(&self) {
        self.entered_count.set(0);
    }

    /// Copy of the attachment state.
    #[inline]
    pub fn state(&self) -> IcState {
        self.state.get()
    }

    /// Update the attachment state and return the closure's result.
    pub(crate) fn update_state<R>(&self, f: impl FnOnce(&mut IcState) -> R) -> R {
        let mut state = self.state.get();
        let result = f(&mut state);
        self.state.set(state);
        result
    }

    /// Mark the entry as consumed by the optimizing tier.
    pub fn set_used_by_transpiler(&self) {
        self.update_state(IcState::set_used_by_transpiler);
    }

    /// Kind-specific payload.
    #[inline]
    pub fn payload(&self) -> FallbackPayload {
        self.payload.get()
    }

    pub(crate) fn set_payload(&self, payload: FallbackPayload) {
        self.payload.set(payload);
    }
}

/// Safety: only the payload is owned; trampoline code is process-wide and
/// is not traced per entry.
unsafe impl Trace for FallbackStub {
    fn trace(&self, tracer: &mut dyn Tracer) {
        match self.payload.get() {
            FallbackPayload::NewArray {
                template: Some(obj),
            }
            | FallbackPayload::NewObject {
                template: Some(obj),
            } => tracer.trace_cell(CellRef::Object(obj), "fallback-template"),
            FallbackPayload::Rest { template } => {
                tracer.trace_cell(CellRef::Object(template), "fallback-rest-template");
            }
            _ => {}
        }
    }
}
