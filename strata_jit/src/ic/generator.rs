//! Collaborator seams: description generators and the stub compiler.
//!
//! The dispatcher asks a [`StubGenerator`] whether the observed inputs can
//! be specialized. On [`AttachDecision::Attach`] the returned
//! [`StubDescription`] is handed to a [`StubCompiler`], and the resulting
//! [`JitCode`](super::stub::JitCode) is linked at the head of the chain.

use super::kind::{CacheKind, FallbackKind};
use super::op::{Op, Operand};
use super::runtime::IcRuntime;
use super::state::IcMode;
use super::stub::{JitCode, StubData};
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};
use std::fmt;
use std::rc::Rc;
use strata_core::{ShapeId, StrataError, StrataResult, Value};

// =============================================================================
// Decisions
// =============================================================================

/// What a generator makes of the observed inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachDecision {
    /// Install a stub built from this description.
    Attach(StubDescription),
    /// Nothing applies.
    NoAction,
    /// Cannot specialize right now; not counted as a failure.
    TemporarilyUnoptimizable,
    /// Decide after the generic operation ran. Property writes only.
    Deferred,
}

impl AttachDecision {
    /// Check for `Attach`.
    #[inline]
    pub fn is_attach(&self) -> bool {
        matches!(self, Self::Attach(_))
    }
}

/// A guard/operation sequence ready to be compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct StubDescription {
    /// Classification key.
    pub cache_kind: CacheKind,
    /// Code shape: which compiled body the data feeds.
    pub template: &'static str,
    /// Guard data embedded in the stub.
    pub data: StubData,
    /// Whether the compiled code may call into the runtime.
    pub makes_gc_calls: bool,
}

impl StubDescription {
    /// Description of a stub that never calls out.
    pub fn new(cache_kind: CacheKind, template: &'static str, data: StubData) -> Self {
        Self {
            cache_kind,
            template,
            data,
            makes_gc_calls: false,
        }
    }

    /// Mark the stub as calling into the runtime.
    #[must_use]
    pub fn with_gc_calls(mut self) -> Self {
        self.makes_gc_calls = true;
        self
    }
}

// =============================================================================
// Inputs
// =============================================================================

/// Runtime inputs of one IC execution.
///
/// `operands` hold the fixed stack inputs in the layout of the entry's
/// kind; `args` hold call arguments (or the actual arguments for `Rest`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcInputs {
    operands: SmallVec<[Value; 4]>,
    args: Vec<Value>,
}

impl IcInputs {
    /// No inputs.
    pub fn none() -> Self {
        Self::default()
    }

    /// One input.
    pub fn unary(value: Value) -> Self {
        Self {
            operands: smallvec![value],
            args: Vec::new(),
        }
    }

    /// Two inputs.
    pub fn binary(a: Value, b: Value) -> Self {
        Self {
            operands: smallvec![a, b],
            args: Vec::new(),
        }
    }

    /// Three inputs.
    pub fn ternary(a: Value, b: Value, c: Value) -> Self {
        Self {
            operands: smallvec![a, b, c],
            args: Vec::new(),
        }
    }

    /// Non-constructing call: `[callee, this, undefined]` + args.
    pub fn call(callee: Value, this: Value, args: Vec<Value>) -> Self {
        Self {
            operands: smallvec![callee, this, Value::Undefined],
            args,
        }
    }

    /// Constructing call: `[callee, undefined, new_target]` + args.
    pub fn construct(callee: Value, args: Vec<Value>, new_target: Value) -> Self {
        Self {
            operands: smallvec![callee, Value::Undefined, new_target],
            args,
        }
    }

    /// Spread call: `[callee, this, array, new_target]`.
    pub fn spread(callee: Value, this: Value, array: Value, new_target: Value) -> Self {
        Self {
            operands: smallvec![callee, this, array, new_target],
            args: Vec::new(),
        }
    }

    /// Argument list only (`Rest`).
    pub fn with_args(args: Vec<Value>) -> Self {
        Self {
            operands: SmallVec::new(),
            args,
        }
    }

    /// Operand `index`, or an internal error when the caller pushed too few.
    pub fn operand(&self, index: usize) -> StrataResult<&Value> {
        self.operands.get(index).ok_or_else(|| {
            StrataError::internal(format!(
                "IC input {index} missing ({} supplied)",
                self.operands.len()
            ))
        })
    }

    /// Fixed operands.
    #[inline]
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// Call arguments.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// Everything a generator sees about one fallback execution.
///
/// Inputs are copies taken before the generic operation runs.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    /// Fallback kind of the entry.
    pub kind: FallbackKind,
    /// Classification key stubs are generated under.
    pub cache_kind: CacheKind,
    /// Bytecode op at the site.
    pub op: Op,
    /// Bytecode offset of the site.
    pub offset: u32,
    /// Entry mode at request time.
    pub mode: IcMode,
    /// No stub attached yet and still Specialized.
    pub is_first_stub: bool,
    /// Static operand of the site.
    pub operand: Operand,
    /// Copied inputs.
    pub inputs: IcInputs,
    /// Result of the generic operation, for kinds that attach after it.
    pub result: Option<Value>,
}

// =============================================================================
// Generator / Compiler Traits
// =============================================================================

/// Produces attach decisions for one cache kind.
pub trait StubGenerator {
    /// Decide for the observed inputs.
    fn try_attach(&self, request: &AttachRequest, rt: &dyn IcRuntime) -> AttachDecision;

    /// Second phase of a deferred property write. `old_shape` is the
    /// target's shape before the write.
    fn try_attach_add_slot(
        &self,
        _request: &AttachRequest,
        _old_shape: ShapeId,
        _rt: &dyn IcRuntime,
    ) -> AttachDecision {
        AttachDecision::NoAction
    }
}

/// Turns descriptions into executable code.
pub trait StubCompiler {
    /// Compile `description`. `None` means resources are exhausted.
    fn compile(&mut self, description: &StubDescription) -> Option<JitCode>;
}

/// Generators keyed by cache kind.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: FxHashMap<CacheKind, Rc<dyn StubGenerator>>,
}

impl GeneratorRegistry {
    /// Empty registry: every kind answers `NoAction`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `generator` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: CacheKind, generator: impl StubGenerator + 'static) {
        self.generators.insert(kind, Rc::new(generator));
    }

    /// Generator for `kind`.
    ///
    /// Returned as an owned handle so no borrow of the runtime outlives the
    /// call that looked it up.
    pub fn get(&self, kind: CacheKind) -> Option<Rc<dyn StubGenerator>> {
        self.generators.get(&kind).cloned()
    }

    /// Check whether `kind` has a generator.
    pub fn contains(&self, kind: CacheKind) -> bool {
        self.generators.contains_key(&kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Check for no generators.
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.generators.keys().map(|k| k.to_string()).collect();
        kinds.sort_unstable();
        f.debug_struct("GeneratorRegistry").field("kinds", &kinds).finish()
    }
}
