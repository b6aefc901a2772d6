//! Property access handlers.
//!
//! Input layouts:
//!
//! | Kind              | Operands                         |
//! |-------------------|----------------------------------|
//! | GetProp           | `[receiver]` (env for GetBoundName) |
//! | GetPropSuper      | `[receiver, home]`               |
//! | GetElem           | `[lhs, key]`                     |
//! | GetElemSuper      | `[receiver, key, home]`          |
//! | SetProp           | `[target, rhs]`                  |
//! | SetElem           | `[target, key, rhs]`             |
//! | In                | `[key, obj]`                     |
//! | HasOwn            | `[key, obj]`                     |
//! | CheckPrivateField | `[obj, key]`                     |

use super::{
    Prepared, attach_add_slot, attach_before, enter, expect_kind, finish_attach, link_pending,
    maybe_transition, name_operand, object_operand, prepare_attach, track_not_attached,
};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::op::{Op, Operand};
use crate::ic::runtime::IcRuntime;
use strata_core::{ObjectRef, PropertyKey, ShapeId, StrataError, StrataResult, Value};
use strata_runtime::PropertyFlags;

// =============================================================================
// Reads
// =============================================================================

pub(super) fn do_get_prop(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetProp]);
    enter(script, entry, rt);

    let key = PropertyKey::from_atom(name_operand(entry)?);
    let receiver = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);

    let result = match entry.op() {
        Op::GetProp => rt.get_property(&receiver, &key)?,
        Op::GetBoundName => {
            let env = object_operand(&receiver, "bound name environment")?;
            rt.get_property(&Value::Object(env), &key)?
        }
        op => unreachable!("{op} is not a GetProp op"),
    };

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_get_prop_super(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetPropSuper]);
    enter(script, entry, rt);

    let key = PropertyKey::from_atom(name_operand(entry)?);
    let receiver = inputs.operand(0)?.clone();
    let home = object_operand(inputs.operand(1)?, "super home object")?;
    let pending = attach_before(script, entry, inputs, rt);

    let result = rt.get_property_super(home, &receiver, &key)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_get_elem(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetElem]);
    enter(script, entry, rt);

    let lhs = inputs.operand(0)?.clone();
    let raw_key = inputs.operand(1)?.clone();
    let pending = attach_before(script, entry, inputs, rt);

    let key = rt.to_key(&raw_key)?;
    let result = rt.get_property(&lhs, &key)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_get_elem_super(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetElemSuper]);
    enter(script, entry, rt);

    let receiver = inputs.operand(0)?.clone();
    let raw_key = inputs.operand(1)?.clone();
    let home = object_operand(inputs.operand(2)?, "super home object")?;
    let pending = attach_before(script, entry, inputs, rt);

    let key = rt.to_key(&raw_key)?;
    let result = rt.get_property_super(home, &receiver, &key)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

// =============================================================================
// Presence Checks
// =============================================================================

pub(super) fn do_in(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::In]);
    enter(script, entry, rt);

    let raw_key = inputs.operand(0)?.clone();
    let Value::Object(obj) = *inputs.operand(1)? else {
        return Err(StrataError::type_error("invalid 'in' operand"));
    };
    let pending = attach_before(script, entry, inputs, rt);

    let key = rt.to_key(&raw_key)?;
    let result = rt.has_property(obj, &key)?;

    link_pending(script, entry, pending, rt);
    Ok(Value::Bool(result))
}

pub(super) fn do_has_own(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::HasOwn]);
    enter(script, entry, rt);

    let key = inputs.operand(0)?.clone();
    let obj = inputs.operand(1)?.clone();
    let pending = attach_before(script, entry, inputs, rt);

    let result = rt.has_own_property(&obj, &key)?;

    link_pending(script, entry, pending, rt);
    Ok(Value::Bool(result))
}

pub(super) fn do_check_private_field(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::CheckPrivateField]);
    enter(script, entry, rt);

    let Operand::PrivateCheck(check) = *entry.operand() else {
        return Err(StrataError::internal(format!(
            "CheckPrivateField at offset {} has no check operand",
            entry.offset()
        )));
    };
    let obj = inputs.operand(0)?.clone();
    let key = inputs.operand(1)?.clone();
    match &key {
        Value::Symbol(sym) if sym.is_private() => {}
        other => {
            return Err(StrataError::internal(format!(
                "private field key must be a private name, got {}",
                other.tag_name()
            )));
        }
    }
    let pending = attach_before(script, entry, inputs, rt);

    let result = rt.check_private_field(&obj, &key, check)?;

    link_pending(script, entry, pending, rt);
    Ok(Value::Bool(result))
}

// =============================================================================
// Writes
// =============================================================================

/// What a property write does once the target object is known.
enum WriteKind {
    Define(PropertyFlags),
    Set { strict: bool },
    SetName { strict: bool },
    InitGlobalLexical,
    ElementInc,
}

fn write_kind(op: Op) -> WriteKind {
    match op {
        Op::InitProp | Op::InitElem => WriteKind::Define(PropertyFlags::default()),
        Op::InitLockedProp | Op::InitLockedElem => WriteKind::Define(PropertyFlags::locked()),
        Op::InitHiddenProp | Op::InitHiddenElem => WriteKind::Define(PropertyFlags::hidden()),
        Op::SetProp | Op::StrictSetProp | Op::SetElem | Op::StrictSetElem => WriteKind::Set {
            strict: op.is_strict(),
        },
        Op::SetName | Op::StrictSetName | Op::SetGName | Op::StrictSetGName => {
            WriteKind::SetName {
                strict: op.is_strict(),
            }
        }
        Op::InitGLexical => WriteKind::InitGlobalLexical,
        Op::InitElemInc => WriteKind::ElementInc,
        op => unreachable!("{op} is not a property write"),
    }
}

pub(super) fn do_set_elem(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::SetElem]);
    enter(script, entry, rt);

    let target = inputs.operand(0)?.clone();
    let raw_key = inputs.operand(1)?.clone();
    let rhs = inputs.operand(2)?.clone();
    let kind = write_kind(entry.op());

    let (key, next_index) = match kind {
        WriteKind::ElementInc => {
            let Some(index) = raw_key.as_int32() else {
                return Err(StrataError::internal(format!(
                    "array initializer index must be an int32, got {}",
                    raw_key.tag_name()
                )));
            };
            if !target.is_object() {
                return Err(StrataError::internal("array initializer on a non-object"));
            }
            let next = index
                .checked_add(1)
                .ok_or_else(|| StrataError::range("array initializer index overflow"))?;
            let slot = u32::try_from(index)
                .map_err(|_| StrataError::range("negative array initializer index"))?;
            (PropertyKey::Index(slot), Some(next))
        }
        _ => (rt.to_key(&raw_key)?, None),
    };
    let obj = rt.to_object_for_property_access(&target, &key)?;
    let old_shape = rt.shape_of(obj);

    // Hidden element initializers never attach.
    if entry.op() == Op::InitHiddenElem {
        write(rt, &kind, obj, &key, &target, &rhs, &raw_key)?;
        return Ok(rhs);
    }

    let prepared = prepare_attach(script, entry, inputs, None, rt);
    write(rt, &kind, obj, &key, &target, &rhs, &raw_key)?;
    complete_write(script, entry, prepared, obj, old_shape, rt);

    Ok(next_index.map_or(rhs, Value::Int32))
}

pub(super) fn do_set_prop(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::SetProp]);
    enter(script, entry, rt);

    let name = name_operand(entry)?;
    let key = PropertyKey::from_atom(name);
    let rhs = inputs.operand(1)?.clone();
    let kind = write_kind(entry.op());

    // The global lexical scope replaces whatever target the frame supplied.
    let (target, attach_inputs) = match kind {
        WriteKind::InitGlobalLexical => {
            let lexical = Value::Object(rt.global_lexical());
            let replaced = IcInputs::binary(lexical.clone(), rhs.clone());
            (lexical, Some(replaced))
        }
        _ => (inputs.operand(0)?.clone(), None),
    };
    let obj = rt.to_object_for_property_access(&target, &key)?;
    let old_shape = rt.shape_of(obj);

    let prepared = prepare_attach(script, entry, attach_inputs.as_ref().unwrap_or(inputs), None, rt);
    write(rt, &kind, obj, &key, &target, &rhs, &Value::Undefined)?;
    complete_write(script, entry, prepared, obj, old_shape, rt);

    Ok(rhs)
}

fn write(
    rt: &mut dyn IcRuntime,
    kind: &WriteKind,
    obj: ObjectRef,
    key: &PropertyKey,
    target: &Value,
    rhs: &Value,
    raw_key: &Value,
) -> StrataResult<()> {
    match *kind {
        WriteKind::Define(flags) => rt.define_property(obj, key, rhs, flags),
        WriteKind::Set { strict } => rt.set_property(obj, key, rhs, target, strict),
        WriteKind::SetName { strict } => {
            let Some(name) = key.as_atom() else {
                return Err(StrataError::internal("name write with a non-atom key"));
            };
            rt.set_name(obj, name, rhs, strict)
        }
        WriteKind::InitGlobalLexical => {
            let Some(name) = key.as_atom() else {
                return Err(StrataError::internal("global lexical with a non-atom key"));
            };
            rt.init_global_lexical(name, rhs)
        }
        WriteKind::ElementInc => {
            let index = raw_key
                .as_int32()
                .ok_or_else(|| StrataError::internal("array initializer index must be an int32"))?;
            rt.init_element_inc(obj, index, rhs)
        }
    }
}

/// Link or defer after a successful write, then charge a failure when
/// nothing was attached.
fn complete_write(
    script: &IcScript,
    entry: &IcEntry,
    prepared: Prepared,
    obj: ObjectRef,
    old_shape: ShapeId,
    rt: &mut dyn IcRuntime,
) {
    let deferred = match prepared {
        Prepared::Handled => return,
        Prepared::Pending(pending) => {
            if finish_attach(script, entry, *pending, rt) {
                return;
            }
            None
        }
        Prepared::Deferred(request) => Some(request),
        Prepared::Skipped | Prepared::Declined => None,
    };

    maybe_transition(script, entry, rt);
    if !entry.state().can_attach_stub() {
        return;
    }
    if let Some(request) = deferred {
        if attach_add_slot(script, entry, *request, obj, old_shape, rt) {
            return;
        }
    }
    track_not_attached(entry);
}
