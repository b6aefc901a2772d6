//! Fallback dispatch.
//!
//! When no specialized stub matches, the entry's fallback handler runs. Each
//! handler follows the same protocol:
//!
//! 1. [`enter`]: bump the entered counter, notify the optimizing tier,
//!    evaluate state transitions.
//! 2. Ask the generator for a decision on *copies* of the inputs and
//!    compile any stub it describes.
//! 3. Run the generic operation. Its result is the handler's result.
//! 4. Link the compiled stub only if step 3 succeeded, re-validating the
//!    state first since step 3 may have re-entered the entry.
//!
//! Arithmetic, comparison, `GetIntrinsic`, `instanceof` and object literal
//! allocation run the generic operation before step 2, since the generator
//! needs the observed result.

mod alloc;
mod arith;
mod call;
mod misc;
mod name;
mod property;

use super::chain::{discard_stubs, has_same_stub, link_stub};
use super::entry::{IcEntry, IcScript};
use super::generator::{AttachDecision, AttachRequest, IcInputs, StubDescription};
use super::kind::FallbackKind;
use super::runtime::IcRuntime;
use super::state::{IcMode, IcState};
use super::stub::JitCode;
use super::telemetry::global_ic_telemetry;
use super::{FALLBACK_LOG_TARGET, IC_LOG_TARGET};
use log::{debug, trace};
use strata_core::{InternedString, ObjectRef, ShapeId, StrataError, StrataResult, Value};

/// Run the fallback handler of `entry`.
pub fn dispatch(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    match entry.kind() {
        FallbackKind::ToBool => misc::do_to_bool(script, entry, inputs, rt),
        FallbackKind::UnaryArith => arith::do_unary_arith(script, entry, inputs, rt),
        FallbackKind::BinaryArith => arith::do_binary_arith(script, entry, inputs, rt),
        FallbackKind::Compare => arith::do_compare(script, entry, inputs, rt),
        FallbackKind::NewArray => alloc::do_new_array(script, entry, inputs, rt),
        FallbackKind::NewObject => alloc::do_new_object(script, entry, inputs, rt),
        FallbackKind::SetElem => property::do_set_elem(script, entry, inputs, rt),
        FallbackKind::SetProp => property::do_set_prop(script, entry, inputs, rt),
        FallbackKind::GetProp => property::do_get_prop(script, entry, inputs, rt),
        FallbackKind::GetPropSuper => property::do_get_prop_super(script, entry, inputs, rt),
        FallbackKind::GetElem => property::do_get_elem(script, entry, inputs, rt),
        FallbackKind::GetElemSuper => property::do_get_elem_super(script, entry, inputs, rt),
        FallbackKind::In => property::do_in(script, entry, inputs, rt),
        FallbackKind::HasOwn => property::do_has_own(script, entry, inputs, rt),
        FallbackKind::CheckPrivateField => {
            property::do_check_private_field(script, entry, inputs, rt)
        }
        FallbackKind::GetName => name::do_get_name(script, entry, inputs, rt),
        FallbackKind::BindName => name::do_bind_name(script, entry, inputs, rt),
        FallbackKind::GetIntrinsic => name::do_get_intrinsic(script, entry, inputs, rt),
        FallbackKind::Call | FallbackKind::CallConstructing => {
            call::do_call(script, entry, inputs, rt)
        }
        FallbackKind::SpreadCall | FallbackKind::SpreadCallConstructing => {
            call::do_spread_call(script, entry, inputs, rt)
        }
        FallbackKind::InstanceOf => misc::do_instance_of(script, entry, inputs, rt),
        FallbackKind::TypeOf => misc::do_type_of(script, entry, inputs, rt),
        FallbackKind::ToPropertyKey => misc::do_to_property_key(script, entry, inputs, rt),
        FallbackKind::GetIterator => misc::do_get_iterator(script, entry, inputs, rt),
        FallbackKind::OptimizeSpreadCall => {
            misc::do_optimize_spread_call(script, entry, inputs, rt)
        }
        FallbackKind::Rest => alloc::do_rest(script, entry, inputs, rt),
    }
}

// =============================================================================
// Entry / Transition
// =============================================================================

fn expect_kind(entry: &IcEntry, kinds: &[FallbackKind]) {
    if !kinds.contains(&entry.kind()) {
        panic!(
            "{} fallback invoked for {:?} entry at offset {}",
            kinds.first().map_or("unknown", |k| k.name()),
            entry.kind(),
            entry.offset()
        );
    }
}

/// Common prologue of every handler.
fn enter(script: &IcScript, entry: &IcEntry, rt: &mut dyn IcRuntime) {
    let fallback = entry.fallback_stub();
    fallback.increment_entered_count();
    let state = fallback.state();
    if state.used_by_transpiler() && script.has_optimized_code() {
        script.note_baseline_fallback();
    }
    global_ic_telemetry().record_fallback_hit();
    trace!(
        target: FALLBACK_LOG_TARGET,
        "{}({}) at offset {}: entered {}, {} stubs, {}",
        entry.kind(),
        entry.op(),
        entry.offset(),
        fallback.entered_count(),
        state.num_optimized_stubs(),
        state.mode()
    );
    maybe_transition(script, entry, rt);
}

/// Apply a pending state transition, discarding every stub if one happens.
fn maybe_transition(script: &IcScript, entry: &IcEntry, rt: &mut dyn IcRuntime) {
    if !entry.fallback_stub().update_state(IcState::maybe_transition) {
        return;
    }
    let removed = discard_stubs(script, entry, rt.write_barrier());
    let mode = entry.mode();
    match mode {
        IcMode::Megamorphic => global_ic_telemetry().record_to_megamorphic(),
        IcMode::Generic => global_ic_telemetry().record_to_generic(),
        IcMode::Specialized => {}
    }
    debug!(
        target: IC_LOG_TARGET,
        "{} IC at offset {} went {mode}, discarded {removed} stubs",
        entry.kind(),
        entry.offset()
    );
}

fn track_not_attached(entry: &IcEntry) {
    entry.fallback_stub().update_state(IcState::track_not_attached);
    global_ic_telemetry().record_not_attached();
}

// =============================================================================
// Attach
// =============================================================================

/// A compiled stub waiting for the generic operation to succeed.
struct PendingStub {
    code: JitCode,
    description: StubDescription,
    mode: IcMode,
}

/// Outcome of the pre-operation attach attempt.
enum Prepared {
    /// Attaching is not allowed.
    Skipped,
    /// Counts as attached: duplicate or temporarily unoptimizable.
    Handled,
    /// Decide after the write (property writes only).
    Deferred(Box<AttachRequest>),
    /// Link once the operation succeeds.
    Pending(Box<PendingStub>),
    /// Generator or compiler declined.
    Declined,
}

fn request(entry: &IcEntry, inputs: &IcInputs, result: Option<Value>) -> Option<AttachRequest> {
    let cache_kind = entry.kind().cache_kind()?;
    let state = entry.state();
    Some(AttachRequest {
        kind: entry.kind(),
        cache_kind,
        op: entry.op(),
        offset: entry.offset(),
        mode: state.mode(),
        is_first_stub: state.new_stub_is_first_stub(),
        operand: entry.operand().clone(),
        inputs: inputs.clone(),
        result,
    })
}

fn prepare_attach(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    result: Option<Value>,
    rt: &mut dyn IcRuntime,
) -> Prepared {
    maybe_transition(script, entry, rt);
    if !entry.state().can_attach_stub() {
        return Prepared::Skipped;
    }
    let Some(request) = request(entry, inputs, result) else {
        return Prepared::Declined;
    };
    let decision = match rt.generators().get(request.cache_kind) {
        Some(generator) => generator.try_attach(&request, &*rt),
        None => AttachDecision::NoAction,
    };
    match decision {
        AttachDecision::Attach(description) => {
            if has_same_stub(script, entry, &description) {
                note_duplicate(entry, &description);
                return Prepared::Handled;
            }
            match rt.compiler().compile(&description) {
                Some(code) => Prepared::Pending(Box::new(PendingStub {
                    code,
                    description,
                    mode: request.mode,
                })),
                None => Prepared::Declined,
            }
        }
        AttachDecision::NoAction => Prepared::Declined,
        AttachDecision::TemporarilyUnoptimizable => Prepared::Handled,
        AttachDecision::Deferred => {
            if !entry.kind().is_property_write() {
                unreachable!("{} generator returned a deferred decision", entry.kind());
            }
            Prepared::Deferred(Box::new(request))
        }
    }
}

/// Link a pending stub if the entry still accepts it. Returns whether the
/// attempt counts as attached.
fn finish_attach(
    script: &IcScript,
    entry: &IcEntry,
    pending: PendingStub,
    rt: &mut dyn IcRuntime,
) -> bool {
    maybe_transition(script, entry, rt);
    let state = entry.state();
    if !state.can_attach_stub() || state.mode() != pending.mode {
        return false;
    }
    if has_same_stub(script, entry, &pending.description) {
        note_duplicate(entry, &pending.description);
        return true;
    }
    let cache_kind = pending.description.cache_kind;
    link_stub(script, entry, pending.code, pending.description);
    global_ic_telemetry().record_attached();
    debug!(target: IC_LOG_TARGET, "Attached {cache_kind} CacheIR stub");
    true
}

fn note_duplicate(entry: &IcEntry, description: &StubDescription) {
    global_ic_telemetry().record_duplicate();
    debug!(
        target: IC_LOG_TARGET,
        "Skipped duplicate {} stub {} at offset {}",
        description.cache_kind,
        description.template,
        entry.offset()
    );
}

/// Attach attempt ahead of the generic operation. The returned stub must
/// be passed to [`link_pending`] once the operation succeeded.
fn attach_before(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> Option<Box<PendingStub>> {
    match prepare_attach(script, entry, inputs, None, rt) {
        Prepared::Pending(pending) => Some(pending),
        Prepared::Declined => {
            track_not_attached(entry);
            None
        }
        Prepared::Skipped | Prepared::Handled => None,
        Prepared::Deferred(_) => {
            unreachable!("{} entry cannot defer outside a property write", entry.kind())
        }
    }
}

fn link_pending(
    script: &IcScript,
    entry: &IcEntry,
    pending: Option<Box<PendingStub>>,
    rt: &mut dyn IcRuntime,
) {
    if let Some(pending) = pending {
        finish_attach(script, entry, *pending, rt);
    }
}

/// Attach attempt after the generic operation produced `result`.
fn attach_after(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    result: &Value,
    rt: &mut dyn IcRuntime,
) {
    match prepare_attach(script, entry, inputs, Some(result.clone()), rt) {
        Prepared::Pending(pending) => {
            finish_attach(script, entry, *pending, rt);
        }
        Prepared::Declined => track_not_attached(entry),
        Prepared::Skipped | Prepared::Handled => {}
        Prepared::Deferred(_) => {
            unreachable!("{} entry cannot defer outside a property write", entry.kind())
        }
    }
}

/// Second phase of a deferred property write. Returns whether a stub was
/// linked.
fn attach_add_slot(
    script: &IcScript,
    entry: &IcEntry,
    mut request: AttachRequest,
    obj: ObjectRef,
    old_shape: ShapeId,
    rt: &mut dyn IcRuntime,
) -> bool {
    let new_shape = rt.shape_of(obj);
    if new_shape == old_shape {
        return false;
    }
    request.mode = entry.mode();
    request.is_first_stub = entry.state().new_stub_is_first_stub();
    let decision = match rt.generators().get(request.cache_kind) {
        Some(generator) => generator.try_attach_add_slot(&request, old_shape, &*rt),
        None => AttachDecision::NoAction,
    };
    match decision {
        AttachDecision::Attach(description) => {
            if has_same_stub(script, entry, &description) {
                note_duplicate(entry, &description);
                return true;
            }
            let Some(code) = rt.compiler().compile(&description) else {
                return false;
            };
            let cache_kind = description.cache_kind;
            link_stub(script, entry, code, description);
            let telemetry = global_ic_telemetry();
            telemetry.record_attached();
            telemetry.record_deferred_attached();
            debug!(
                target: IC_LOG_TARGET,
                "Attached {cache_kind} CacheIR stub (add slot {old_shape:?} -> {new_shape:?})"
            );
            true
        }
        AttachDecision::NoAction => false,
        AttachDecision::Deferred | AttachDecision::TemporarilyUnoptimizable => {
            unreachable!("{} generator returned an invalid add-slot decision", entry.kind())
        }
    }
}

// =============================================================================
// Operand helpers
// =============================================================================

fn name_operand(entry: &IcEntry) -> StrataResult<InternedString> {
    entry.operand().name().cloned().ok_or_else(|| {
        StrataError::internal(format!(
            "{} at offset {} has no name operand",
            entry.op(),
            entry.offset()
        ))
    })
}

fn object_operand(value: &Value, what: &str) -> StrataResult<ObjectRef> {
    value
        .as_object()
        .ok_or_else(|| StrataError::internal(format!("{what} must be an object, got {}", value.tag_name())))
}
