//! Single-operand conversions and `instanceof`.

use super::{attach_after, attach_before, enter, expect_kind, link_pending, track_not_attached};
use crate::ic::entry::{IcEntry, IcScript};
use crate::ic::generator::IcInputs;
use crate::ic::kind::FallbackKind;
use crate::ic::runtime::IcRuntime;
use strata_core::{StrataError, StrataResult, Value};

pub(super) fn do_to_bool(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::ToBool]);
    enter(script, entry, rt);

    let value = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);
    let result = Value::Bool(rt.to_boolean(&value));

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_type_of(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::TypeOf]);
    enter(script, entry, rt);

    let value = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);
    let result = Value::string(rt.type_of(&value).name());

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_to_property_key(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::ToPropertyKey]);
    enter(script, entry, rt);

    let value = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);
    let result = rt.to_property_key(&value)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_get_iterator(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::GetIterator]);
    enter(script, entry, rt);

    let value = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);
    let result = rt.get_iterator(&value)?;

    link_pending(script, entry, pending, rt);
    Ok(result)
}

pub(super) fn do_optimize_spread_call(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::OptimizeSpreadCall]);
    enter(script, entry, rt);

    let value = inputs.operand(0)?.clone();
    let pending = attach_before(script, entry, inputs, rt);
    let result = Value::Bool(rt.optimize_spread_call(&value)?);

    link_pending(script, entry, pending, rt);
    Ok(result)
}

/// `[lhs, rhs]`
pub(super) fn do_instance_of(
    script: &IcScript,
    entry: &IcEntry,
    inputs: &IcInputs,
    rt: &mut dyn IcRuntime,
) -> StrataResult<Value> {
    expect_kind(entry, &[FallbackKind::InstanceOf]);
    enter(script, entry, rt);

    let lhs = inputs.operand(0)?.clone();
    let Value::Object(rhs) = *inputs.operand(1)? else {
        return Err(StrataError::type_error(format!(
            "invalid 'instanceof' operand {}",
            inputs.operand(1)?.tag_name()
        )));
    };
    let result = Value::Bool(rt.instance_of(&lhs, rhs)?);

    if !rt.is_callable(&Value::Object(rhs)) {
        // Charge at most one failure for a non-callable right-hand side.
        if entry.state().can_attach_stub() && !entry.state().has_failures() {
            track_not_attached(entry);
        }
        return Ok(result);
    }

    attach_after(script, entry, inputs, &result, rt);
    Ok(result)
}
